// Engine Errors
// Everything the engine can refuse is one of these; nothing here is fatal.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A launch was requested while another impactor is still live.
    #[error("launch rejected: an impactor is already in flight")]
    RejectedBusy,

    /// Impactor parameters or the picked surface point are unusable.
    #[error("invalid impactor spec: {0}")]
    InvalidSpec(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("malformed catalog data: {0}")]
    Catalog(String),

    /// Raised by the external reverse-geocoding collaborator.
    #[error("geo lookup failed: {0}")]
    GeoLookup(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

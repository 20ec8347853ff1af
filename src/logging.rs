// Logging
// tracing subscriber setup for the library and the headless driver.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. `RUST_LOG` wins over `filter`, which wins
/// over [`DEFAULT_FILTER`]. Output goes to stderr so stdout stays usable for
/// results. Returns false when a subscriber was already installed.
pub fn init_logging(filter: Option<&str>) -> bool {
    let fallback = filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_FILTER);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .is_ok()
}

// Impact Sim - Impact trajectory & effects simulation engine
// Launches an impactor at a target sphere, detects the collision, scales the
// crater and drives the visual effects frame by frame.

pub mod catalog;
pub mod config;
pub mod crater;
pub mod effects;
pub mod error;
pub mod geo;
pub mod impact_physics;
pub mod logging;
pub mod state_manager;
pub mod trajectory;

pub use config::EngineConfig;
pub use crater::{project_crater, CraterDecal, CraterStyle};
pub use error::{EngineError, Result};
pub use geo::{to_cartesian, to_geo, GeoPoint, LonConvention};
pub use impact_physics::{calculate_impact, CraterLaw, ImpactModel, ImpactResult, ImpactorSpec};
pub use state_manager::{
    spawn_geo_dispatch, start_frame_loop, EngineHandle, GeoLookup, GeoRegion, LatitudeBandLookup,
};
pub use trajectory::{
    EngineEvent, FrameState, ImpactEvent, ImpactorState, PathStrategy, Phase, TrajectoryEngine,
};

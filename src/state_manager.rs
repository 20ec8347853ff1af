// State Manager - Thread-safe engine handling
// Shares the trajectory engine between the frame loop and callers, and hands
// impacts to the reverse-geocoding collaborator off the frame thread.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::geo::GeoPoint;
use crate::impact_physics::ImpactorSpec;
use crate::trajectory::{EngineEvent, FrameState, ImpactEvent, Phase, TrajectoryEngine};

// =============================================================================
// SHARED HANDLE
// =============================================================================

#[derive(Clone)]
pub struct EngineHandle {
    pub engine: Arc<RwLock<TrajectoryEngine>>,
    pub is_running: Arc<RwLock<bool>>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Ok(Self {
            engine: Arc::new(RwLock::new(TrajectoryEngine::new(config)?)),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Handle plus the receiving end of the impact hand-off.
    pub fn with_impact_channel(
        config: EngineConfig,
    ) -> Result<(Self, UnboundedReceiver<ImpactEvent>)> {
        let handle = Self::new(config)?;
        let (tx, rx) = mpsc::unbounded_channel();
        handle.engine.write().set_impact_sender(tx);
        Ok((handle, rx))
    }

    pub fn request_launch(&self, spec: ImpactorSpec, picked_point: glam::DVec3) -> Result<u64> {
        self.engine.write().request_launch(spec, picked_point)
    }

    pub fn advance(&self, dt: f64) -> Option<EngineEvent> {
        self.engine.write().advance(dt)
    }

    pub fn frame_state(&self) -> FrameState {
        self.engine.read().frame_state()
    }

    pub fn last_impact(&self) -> Option<ImpactEvent> {
        self.engine.read().last_impact().cloned()
    }

    pub fn phase(&self) -> Phase {
        self.engine.read().phase()
    }

    /// Spawn the background frame loop. Only one loop runs per handle.
    pub fn start_frame_loop(&self) -> Option<thread::JoinHandle<()>> {
        {
            let mut running = self.is_running.write();
            if *running {
                return None;
            }
            *running = true;
        }
        let interval = Duration::from_millis(self.engine.read().config().frame_interval_ms);
        Some(start_frame_loop(
            self.engine.clone(),
            self.is_running.clone(),
            interval,
        ))
    }

    pub fn stop(&self) {
        *self.is_running.write() = false;
    }
}

// =============================================================================
// FRAME LOOP (runs in background thread)
// =============================================================================

pub fn start_frame_loop(
    engine: Arc<RwLock<TrajectoryEngine>>,
    is_running: Arc<RwLock<bool>>,
    frame_interval: Duration,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut last_frame = Instant::now();

        loop {
            let start = Instant::now();

            if !*is_running.read() {
                break;
            }

            let dt = start.duration_since(last_frame).as_secs_f64();
            last_frame = start;

            if let Some(event) = engine.write().advance(dt) {
                debug!(?event, "frame event");
            }

            let elapsed = start.elapsed();
            if elapsed < frame_interval {
                thread::sleep(frame_interval - elapsed);
            }
        }
    })
}

// =============================================================================
// GEO LOOKUP
// =============================================================================

/// Descriptive region for an impact coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRegion {
    pub lat: f64,
    pub lon: f64,
    pub eco_name: String,
    pub biome: String,
    pub realm: String,
}

/// Reverse-geocoding collaborator.
pub trait GeoLookup: Send + Sync + 'static {
    fn lookup(&self, point: GeoPoint) -> impl Future<Output = Result<GeoRegion>> + Send;
}

/// Offline lookup by latitude band. No network I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatitudeBandLookup;

impl LatitudeBandLookup {
    pub fn classify(&self, point: GeoPoint) -> Result<GeoRegion> {
        if !point.lat.is_finite() || !point.lon.is_finite() || point.lat.abs() > 90.0 {
            return Err(EngineError::GeoLookup(format!(
                "no region for ({}, {})",
                point.lat, point.lon
            )));
        }

        let (eco_name, biome) = match point.lat.abs() {
            a if a >= 66.5 => ("Polar ice and tundra", "Tundra"),
            a if a >= 50.0 => ("Boreal forest", "Boreal Forests/Taiga"),
            a if a >= 35.0 => (
                "Temperate mixed forest",
                "Temperate Broadleaf & Mixed Forests",
            ),
            a if a >= 23.5 => ("Subtropical dryland", "Deserts & Xeric Shrublands"),
            _ => (
                "Tropical moist forest",
                "Tropical & Subtropical Moist Broadleaf Forests",
            ),
        };
        let realm = if point.lat >= 0.0 {
            "Northern Hemisphere"
        } else {
            "Southern Hemisphere"
        };

        Ok(GeoRegion {
            lat: point.lat,
            lon: point.lon,
            eco_name: eco_name.to_string(),
            biome: biome.to_string(),
            realm: realm.to_string(),
        })
    }
}

impl GeoLookup for LatitudeBandLookup {
    fn lookup(&self, point: GeoPoint) -> impl Future<Output = Result<GeoRegion>> + Send {
        let region = self.classify(point);
        async move { region }
    }
}

/// Resolve every impact on its own task and pass the outcome to `on_region`.
/// Runs until every sender of `rx` is dropped.
pub fn spawn_geo_dispatch<L, F>(
    mut rx: UnboundedReceiver<ImpactEvent>,
    lookup: Arc<L>,
    on_region: F,
) -> JoinHandle<()>
where
    L: GeoLookup,
    F: Fn(ImpactEvent, Result<GeoRegion>) + Send + Sync + 'static,
{
    let on_region = Arc::new(on_region);

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let lookup = lookup.clone();
            let on_region = on_region.clone();

            tokio::spawn(async move {
                let region = lookup.lookup(event.geo).await;
                if let Err(e) = &region {
                    warn!(launch_id = event.launch_id, error = %e, "geo lookup failed");
                }
                on_region(event, region);
            });
        }
        debug!("impact channel closed, geo dispatch stopped");
    })
}

// =============================================================================
// TESTS
// =============================================================================

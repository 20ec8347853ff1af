// Impact Sim - headless driver
// Runs one launch at a fixed frame step and prints the impact report as JSON.
//
// Usage: impact-sim [scenario.json]
//
// A scenario names either a custom `impactor` or a `catalog` record, plus the
// target `lat`/`lon`. Without one, a 100 m stony body at 17 km/s strikes 0/0.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

use impact_sim::catalog::CatalogRecord;
use impact_sim::impact_physics::format_mass;
use impact_sim::{
    geo, logging, spawn_geo_dispatch, EngineConfig, EngineEvent, EngineHandle, GeoPoint,
    GeoRegion, ImpactResult, ImpactorSpec, LatitudeBandLookup,
};

/// Frames before a launch that neither hits nor misses is abandoned
const MAX_FRAMES: u64 = 1_000_000;
const GEO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    impactor: Option<ImpactorSpec>,
    #[serde(default)]
    catalog: Option<CatalogRecord>,
    #[serde(default = "default_angle")]
    angle_deg: f64,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
}

fn default_angle() -> f64 {
    45.0
}

impl Scenario {
    fn impactor_spec(&self) -> impact_sim::Result<ImpactorSpec> {
        match (&self.impactor, &self.catalog) {
            (Some(spec), _) => Ok(*spec),
            (None, Some(record)) => record.to_impactor_spec(self.angle_deg),
            (None, None) => Ok(ImpactorSpec::with_density(100.0, 3000.0, 17.0, self.angle_deg)),
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    launch_id: u64,
    outcome: &'static str,
    result: Option<ImpactResult>,
    mass: Option<String>,
    geo: Option<GeoPoint>,
    region: Option<GeoRegion>,
    occurred_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "impact-sim failed");
        eprintln!("impact-sim: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = EngineConfig::from_env()?;
    logging::init_logging(std::env::var("IMPACT_SIM_LOG").ok().as_deref());

    let scenario = match std::env::args().nth(1) {
        Some(path) => {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str::<Scenario>(&data)?
        }
        None => Scenario {
            impactor: None,
            catalog: None,
            angle_deg: default_angle(),
            lat: 0.0,
            lon: 0.0,
        },
    };
    let spec = scenario.impactor_spec()?;

    let dt = config.frame_interval_ms as f64 / 1000.0;
    let picked = geo::to_cartesian(scenario.lat, scenario.lon, config.target_radius);

    let (handle, impacts) = EngineHandle::with_impact_channel(config)?;
    let (region_tx, mut region_rx) = mpsc::unbounded_channel();
    let dispatcher = spawn_geo_dispatch(impacts, Arc::new(LatitudeBandLookup), move |_, region| {
        let _ = region_tx.send(region);
    });

    let launch_id = handle.request_launch(spec, picked)?;
    info!(launch_id, lat = scenario.lat, lon = scenario.lon, "running scenario");

    let mut outcome = None;
    for _ in 0..MAX_FRAMES {
        match handle.advance(dt) {
            Some(EngineEvent::Finished { .. }) => {
                outcome = Some("impact");
                break;
            }
            Some(EngineEvent::Missed { .. }) => {
                outcome = Some("missed");
                break;
            }
            _ => {}
        }
    }
    let outcome = outcome.ok_or("launch never completed")?;

    let impact = handle.last_impact();
    let region = match &impact {
        Some(_) => match tokio::time::timeout(GEO_TIMEOUT, region_rx.recv()).await {
            Ok(Some(Ok(region))) => Some(region),
            Ok(Some(Err(e))) => {
                error!(error = %e, "no region for impact point");
                None
            }
            _ => None,
        },
        None => None,
    };

    drop(handle);
    dispatcher.await?;

    let report = Report {
        launch_id,
        outcome,
        result: impact.as_ref().map(|i| i.result),
        mass: impact.as_ref().map(|i| format_mass(i.result.mass_kg)),
        geo: impact.as_ref().map(|i| i.geo),
        region,
        occurred_at: impact.as_ref().map(|i| i.occurred_at),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

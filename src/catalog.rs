// Impactor Catalog
// Turns NeoWs-style near-Earth object records into launchable impactor specs.
// Fetching the records is the host application's job; this module only reads
// the JSON it hands over.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::impact_physics::{asteroid_density, ImpactorSpec};

/// Diameter used when a record carries no usable size estimate
pub const FALLBACK_DIAMETER_M: f64 = 100.0;

// =============================================================================
// FEED RESPONSE TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedResponse {
    pub element_count: Option<i32>,
    /// Keyed by close-approach date, YYYY-MM-DD
    pub near_earth_objects: BTreeMap<String, Vec<NeoObject>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeoObject {
    pub id: Option<String>,
    pub name: String,
    pub estimated_diameter: Option<EstimatedDiameter>,
    #[serde(default)]
    pub is_potentially_hazardous_asteroid: bool,
    #[serde(default)]
    pub close_approach_data: Vec<CloseApproachData>,
    pub orbital_data: Option<OrbitalData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatedDiameter {
    pub meters: Option<DiameterRange>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DiameterRange {
    pub estimated_diameter_min: f64,
    pub estimated_diameter_max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseApproachData {
    pub close_approach_date: Option<String>,
    pub relative_velocity: Option<RelativeVelocity>,
    pub miss_distance: Option<MissDistance>,
}

/// NeoWs encodes the numbers as strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelativeVelocity {
    pub kilometers_per_second: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissDistance {
    pub kilometers: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitalData {
    pub orbit_class: Option<OrbitClass>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitClass {
    pub orbit_class_type: Option<String>,
}

// =============================================================================
// CATALOG RECORD
// =============================================================================

/// Flattened catalog entry, one close approach per body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub name: String,
    #[serde(default)]
    pub date: Option<String>,
    pub hazardous: bool,
    pub velocity_km_s: f64,
    #[serde(default)]
    pub miss_distance_km: f64,
    pub estimated_diameter_m: f64,
    #[serde(default)]
    pub mass_kg: Option<f64>,
    #[serde(default)]
    pub orbit_class: Option<String>,
}

impl CatalogRecord {
    pub fn density(&self) -> f64 {
        estimate_density(self.orbit_class.as_deref())
    }

    /// Launch parameters for this body approaching at `angle_deg`. The
    /// catalog hazard flag is carried as the hazard override.
    pub fn to_impactor_spec(&self, angle_deg: f64) -> Result<ImpactorSpec> {
        let spec = match self.mass_kg {
            Some(mass) => {
                ImpactorSpec::with_mass(self.estimated_diameter_m, mass, self.velocity_km_s, angle_deg)
            }
            None => ImpactorSpec::with_density(
                self.estimated_diameter_m,
                self.density(),
                self.velocity_km_s,
                angle_deg,
            ),
        }
        .hazard_override(self.hazardous);

        spec.validate().map_err(|e| match e {
            EngineError::InvalidSpec(msg) => {
                EngineError::InvalidSpec(format!("catalog body {}: {}", self.name, msg))
            }
            other => other,
        })?;
        Ok(spec)
    }
}

/// Bulk density from a spectral class letter. Orbit classes (AMO, APO, ...)
/// and unknown classes fall back to the stony default.
pub fn estimate_density(class: Option<&str>) -> f64 {
    let Some(class) = class else {
        return asteroid_density::DEFAULT;
    };

    match class.trim().to_uppercase().as_str() {
        "AMO" | "APO" | "ATE" | "ATI" | "IEO" => asteroid_density::DEFAULT,
        s if s.starts_with('C') => asteroid_density::C_TYPE,
        s if s.starts_with('B') => 1500.0,
        s if s.starts_with('D') => 1200.0,
        s if s.starts_with('P') => 1300.0,
        s if s.starts_with('S') => asteroid_density::S_TYPE,
        s if s.starts_with('Q') => 2500.0,
        s if s.starts_with('V') => 3200.0,
        s if s.starts_with('M') => asteroid_density::M_TYPE,
        s if s.starts_with('X') => 3500.0,
        _ => asteroid_density::DEFAULT,
    }
}

fn parse_number(value: Option<&String>) -> Option<f64> {
    value.and_then(|s| s.trim().parse::<f64>().ok())
}

impl NeoObject {
    /// Flatten to a record using the first close approach.
    pub fn to_record(&self, date: Option<&str>) -> CatalogRecord {
        let approach = self.close_approach_data.first();

        let diameter = self
            .estimated_diameter
            .as_ref()
            .and_then(|d| d.meters)
            .map(|m| (m.estimated_diameter_min + m.estimated_diameter_max) / 2.0)
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(FALLBACK_DIAMETER_M);

        let velocity_km_s = approach
            .and_then(|a| a.relative_velocity.as_ref())
            .and_then(|v| parse_number(v.kilometers_per_second.as_ref()))
            .unwrap_or(0.0);

        let miss_distance_km = approach
            .and_then(|a| a.miss_distance.as_ref())
            .and_then(|m| parse_number(m.kilometers.as_ref()))
            .unwrap_or(0.0);

        let date = date
            .map(str::to_string)
            .or_else(|| approach.and_then(|a| a.close_approach_date.clone()));

        CatalogRecord {
            name: self.name.clone(),
            date,
            hazardous: self.is_potentially_hazardous_asteroid,
            velocity_km_s,
            miss_distance_km,
            estimated_diameter_m: diameter,
            mass_kg: None,
            orbit_class: self
                .orbital_data
                .as_ref()
                .and_then(|o| o.orbit_class.as_ref())
                .and_then(|c| c.orbit_class_type.clone()),
        }
    }
}

/// Flatten a NeoWs feed document into records ordered by approach date.
pub fn parse_feed(json: &str) -> Result<Vec<CatalogRecord>> {
    let feed: FeedResponse =
        serde_json::from_str(json).map_err(|e| EngineError::Catalog(e.to_string()))?;

    Ok(feed
        .near_earth_objects
        .iter()
        .flat_map(|(date, objects)| {
            objects
                .iter()
                .map(move |neo| neo.to_record(Some(date.as_str())))
        })
        .collect())
}

/// Read already-flattened records, e.g. a cached `asteroids.json`.
pub fn parse_records(json: &str) -> Result<Vec<CatalogRecord>> {
    serde_json::from_str(json).map_err(|e| EngineError::Catalog(e.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact_physics::{calculate_impact, ImpactModel, MassSource};

    const FEED: &str = r#"{
        "element_count": 2,
        "near_earth_objects": {
            "2015-09-08": [
                {
                    "id": "3726710",
                    "name": "(2015 RC)",
                    "estimated_diameter": {
                        "meters": {
                            "estimated_diameter_min": 36.55,
                            "estimated_diameter_max": 81.73
                        }
                    },
                    "is_potentially_hazardous_asteroid": false,
                    "close_approach_data": [
                        {
                            "close_approach_date": "2015-09-08",
                            "relative_velocity": { "kilometers_per_second": "19.4850295284" },
                            "miss_distance": { "kilometers": "4366643.8" }
                        }
                    ]
                }
            ],
            "2015-09-07": [
                {
                    "name": "465633 (2009 JR5)",
                    "is_potentially_hazardous_asteroid": true,
                    "close_approach_data": [],
                    "orbital_data": { "orbit_class": { "orbit_class_type": "APO" } }
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_feed_orders_by_date() {
        let records = parse_feed(FEED).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "465633 (2009 JR5)");
        assert_eq!(records[0].date.as_deref(), Some("2015-09-07"));
        assert_eq!(records[1].date.as_deref(), Some("2015-09-08"));
    }

    #[test]
    fn test_record_fields() {
        let records = parse_feed(FEED).unwrap();
        let rc = &records[1];
        assert!((rc.estimated_diameter_m - 59.14).abs() < 1e-9);
        assert!((rc.velocity_km_s - 19.4850295284).abs() < 1e-9);
        assert!((rc.miss_distance_km - 4366643.8).abs() < 1e-6);
        assert!(!rc.hazardous);

        // no size and no approach data
        let jr5 = &records[0];
        assert_eq!(jr5.estimated_diameter_m, FALLBACK_DIAMETER_M);
        assert_eq!(jr5.velocity_km_s, 0.0);
        assert_eq!(jr5.orbit_class.as_deref(), Some("APO"));
    }

    #[test]
    fn test_zero_velocity_record_not_launchable() {
        let records = parse_feed(FEED).unwrap();
        assert!(matches!(
            records[0].to_impactor_spec(45.0),
            Err(EngineError::InvalidSpec(_))
        ));
    }

    #[test]
    fn test_spec_uses_default_density_and_hazard_flag() {
        let record = CatalogRecord {
            name: "test".to_string(),
            date: None,
            hazardous: false,
            velocity_km_s: 17.0,
            miss_distance_km: 0.0,
            estimated_diameter_m: 10.0,
            mass_kg: None,
            orbit_class: None,
        };
        let spec = record.to_impactor_spec(30.0).unwrap();
        assert_eq!(spec.mass_source, MassSource::Density(3000.0));
        assert_eq!(spec.hazard_override, Some(false));
        assert_eq!(spec.angle_deg, 30.0);

        // above the energy threshold, but the catalog flag is not overwritten
        let result = calculate_impact(&spec, &ImpactModel::default()).unwrap();
        assert!(result.kinetic_energy_j > 1e12);
        assert!(!result.is_hazardous);
    }

    #[test]
    fn test_supplied_mass_wins() {
        let record = CatalogRecord {
            name: "heavy".to_string(),
            date: None,
            hazardous: false,
            velocity_km_s: 12.0,
            miss_distance_km: 0.0,
            estimated_diameter_m: 50.0,
            mass_kg: Some(2.5e8),
            orbit_class: Some("M".to_string()),
        };
        let spec = record.to_impactor_spec(45.0).unwrap();
        assert_eq!(spec.mass_kg(), 2.5e8);
    }

    #[test]
    fn test_density_by_class() {
        assert_eq!(estimate_density(None), 3000.0);
        assert_eq!(estimate_density(Some("APO")), 3000.0);
        assert_eq!(estimate_density(Some("c")), 1700.0);
        assert_eq!(estimate_density(Some("Sq")), 2700.0);
        assert_eq!(estimate_density(Some("M")), 4000.0);
        assert_eq!(estimate_density(Some("unknown")), 3000.0);
    }

    #[test]
    fn test_parse_flat_records() {
        let json = r#"[{
            "name": "(2015 RC)",
            "date": "2015-09-08",
            "hazardous": false,
            "velocity_km_s": 19.48,
            "miss_distance_km": 4366643.8,
            "estimated_diameter_m": 59.14
        }]"#;
        let records = parse_records(json).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].mass_kg.is_none());
        assert!(parse_records("{not json").is_err());
    }
}

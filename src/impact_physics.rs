// Impact Physics Calculator
// Derives mass, kinetic energy and crater/ejecta/dust scaling from the
// impactor's body parameters. Pure functions, no engine state.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

// =============================================================================
// PHYSICAL CONSTANTS (SI Units)
// =============================================================================

/// Energy of one megaton of TNT (J)
pub const JOULES_PER_MEGATON: f64 = 4.184e15;

/// Impactor speed at which the size/angle crater law is calibrated (km/s)
pub const REFERENCE_VELOCITY_KM_S: f64 = 17.0;

/// Impactor density at which the size/angle crater law is calibrated (kg/m³)
pub const REFERENCE_DENSITY: f64 = 3000.0;

/// Velocity exponent of the crater law, μ = 0.55 gravity-regime coupling:
/// 2μ / (2 + μ)
pub const VELOCITY_EXPONENT: f64 = 0.43;

/// Crater/ejecta/dust per unit of clamped impact force (legacy law, metres)
const LEGACY_CRATER_PER_FORCE: f64 = 500.0;
const LEGACY_EJECTA_PER_FORCE: f64 = 600.0;
const LEGACY_DUST_PER_FORCE: f64 = 50.0;

/// Ejecta radius and dust height as fractions of crater diameter
const EJECTA_RATIO: f64 = 1.2;
const DUST_RATIO: f64 = 0.1;

/// Asteroid density by spectral type (kg/m³)
/// References: Carry (2012), DeMeo & Carry (2013)
pub mod asteroid_density {
    pub const C_TYPE: f64 = 1700.0; // Carbonaceous
    pub const S_TYPE: f64 = 2700.0; // Silicaceous
    pub const M_TYPE: f64 = 4000.0; // Metallic
    pub const DEFAULT: f64 = 3000.0; // Stony average used for catalog bodies
}

// =============================================================================
// IMPACTOR SPEC
// =============================================================================

/// Which quantity the impactor's mass is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MassSource {
    /// kg/m³, mass derived as a uniform sphere
    Density(f64),
    /// kg, supplied directly (catalog bodies)
    Mass(f64),
}

/// Immutable per-launch impactor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactorSpec {
    #[serde(alias = "diameter")]
    pub diameter_m: f64,
    #[serde(flatten)]
    pub mass_source: MassSource,
    #[serde(alias = "velocity")]
    pub velocity_km_s: f64,
    /// Approach angle from the horizontal, (0, 90]
    #[serde(alias = "angle")]
    pub angle_deg: f64,
    /// Catalog-supplied hazard flag; authoritative when present
    #[serde(default)]
    pub hazard_override: Option<bool>,
}

impl ImpactorSpec {
    pub fn with_density(diameter_m: f64, density: f64, velocity_km_s: f64, angle_deg: f64) -> Self {
        Self {
            diameter_m,
            mass_source: MassSource::Density(density),
            velocity_km_s,
            angle_deg,
            hazard_override: None,
        }
    }

    pub fn with_mass(diameter_m: f64, mass_kg: f64, velocity_km_s: f64, angle_deg: f64) -> Self {
        Self {
            diameter_m,
            mass_source: MassSource::Mass(mass_kg),
            velocity_km_s,
            angle_deg,
            hazard_override: None,
        }
    }

    pub fn hazard_override(mut self, is_hazardous: bool) -> Self {
        self.hazard_override = Some(is_hazardous);
        self
    }

    pub fn radius_m(&self) -> f64 {
        self.diameter_m / 2.0
    }

    pub fn volume_m3(&self) -> f64 {
        (4.0 / 3.0) * PI * self.radius_m().powi(3)
    }

    pub fn mass_kg(&self) -> f64 {
        match self.mass_source {
            MassSource::Density(density) => density * self.volume_m3(),
            MassSource::Mass(mass) => mass,
        }
    }

    /// Bulk density, derived from mass when mass was supplied.
    pub fn density(&self) -> f64 {
        match self.mass_source {
            MassSource::Density(density) => density,
            MassSource::Mass(mass) => mass / self.volume_m3(),
        }
    }

    /// Reject anything that would make the physics meaningless.
    pub fn validate(&self) -> Result<()> {
        check_positive("diameter", self.diameter_m)?;
        check_positive("velocity", self.velocity_km_s)?;
        match self.mass_source {
            MassSource::Density(density) => check_positive("density", density)?,
            MassSource::Mass(mass) => check_positive("mass", mass)?,
        }
        if !self.angle_deg.is_finite() || self.angle_deg <= 0.0 || self.angle_deg > 90.0 {
            return Err(EngineError::InvalidSpec(format!(
                "approach angle must be in (0, 90] degrees, got {}",
                self.angle_deg
            )));
        }
        Ok(())
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidSpec(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}

// =============================================================================
// SCALING LAWS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CraterLaw {
    /// crater = diameter * k * sin(angle), corrected for velocity and density
    /// relative to the calibration body
    #[default]
    SizeAngle,
    /// Crater, ejecta and dust as fixed multiples of the clamped impact force
    ForceClamped,
}

/// Parameters of the scaling model, taken from [`EngineConfig`].
#[derive(Debug, Clone, Copy)]
pub struct ImpactModel {
    pub crater_law: CraterLaw,
    /// k of the size/angle law
    pub crater_scale: f64,
    pub force_cap: f64,
    pub hazard_threshold_j: f64,
}

impl Default for ImpactModel {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ImpactModel {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            crater_law: config.crater_law,
            crater_scale: config.crater_scale,
            force_cap: config.force_cap,
            hazard_threshold_j: config.hazard_threshold_j,
        }
    }
}

/// Derived, immutable impact metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactResult {
    pub mass_kg: f64,
    pub kinetic_energy_j: f64,
    pub tnt_megatons: f64,
    pub crater_diameter_m: f64,
    pub ejecta_radius_m: f64,
    pub dust_height_m: f64,
    /// Dimensionless visual scale, drives the crater footprint
    pub impact_force: f64,
    pub is_hazardous: bool,
}

/// Clamped coarse force scalar: (diameter / 100) * (velocity / 10), capped.
pub fn impact_force(diameter_m: f64, velocity_km_s: f64, cap: f64) -> f64 {
    ((diameter_m / 100.0) * (velocity_km_s / 10.0)).min(cap)
}

pub fn kinetic_energy(mass_kg: f64, velocity_km_s: f64) -> f64 {
    let v = velocity_km_s * 1000.0;
    0.5 * mass_kg * v * v
}

pub fn calculate_impact(spec: &ImpactorSpec, model: &ImpactModel) -> Result<ImpactResult> {
    spec.validate()?;

    let mass_kg = spec.mass_kg();
    let kinetic_energy_j = kinetic_energy(mass_kg, spec.velocity_km_s);
    let force = impact_force(spec.diameter_m, spec.velocity_km_s, model.force_cap);

    let (crater_diameter_m, ejecta_radius_m, dust_height_m) = match model.crater_law {
        CraterLaw::SizeAngle => {
            let angle_factor = spec.angle_deg.to_radians().sin();
            let velocity_factor =
                (spec.velocity_km_s / REFERENCE_VELOCITY_KM_S).powf(VELOCITY_EXPONENT);
            // mass-specified bodies take the reference density
            let density_factor = match spec.mass_source {
                MassSource::Density(density) => (density / REFERENCE_DENSITY).cbrt(),
                MassSource::Mass(_) => 1.0,
            };

            let crater = spec.diameter_m
                * model.crater_scale
                * angle_factor
                * velocity_factor
                * density_factor;
            (crater, crater * EJECTA_RATIO, crater * DUST_RATIO)
        }
        CraterLaw::ForceClamped => (
            force * LEGACY_CRATER_PER_FORCE,
            force * LEGACY_EJECTA_PER_FORCE,
            force * LEGACY_DUST_PER_FORCE,
        ),
    };

    if !kinetic_energy_j.is_finite() || !crater_diameter_m.is_finite() {
        return Err(EngineError::InvalidSpec(
            "impact metrics overflowed".to_string(),
        ));
    }

    let is_hazardous = spec
        .hazard_override
        .unwrap_or(kinetic_energy_j > model.hazard_threshold_j);

    Ok(ImpactResult {
        mass_kg,
        kinetic_energy_j,
        tnt_megatons: kinetic_energy_j / JOULES_PER_MEGATON,
        crater_diameter_m,
        ejecta_radius_m,
        dust_height_m,
        impact_force: force,
        is_hazardous,
    })
}

/// Mass as a short human-readable string.
pub fn format_mass(mass_kg: f64) -> String {
    if !mass_kg.is_finite() {
        return "Unknown".to_string();
    }
    if mass_kg >= 1e12 {
        format!("{:.2} billion tons", mass_kg / 1e12)
    } else if mass_kg >= 1e9 {
        format!("{:.2} million tons", mass_kg / 1e9)
    } else if mass_kg >= 1e6 {
        format!("{:.2} thousand tons", mass_kg / 1e6)
    } else if mass_kg >= 1e3 {
        format!("{:.2} tons", mass_kg / 1e3)
    } else {
        format!("{:.2} kg", mass_kg)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_spec() -> ImpactorSpec {
        ImpactorSpec::with_density(100.0, 3000.0, 17.0, 45.0)
    }

    #[test]
    fn test_reference_scenario() {
        let result = calculate_impact(&reference_spec(), &ImpactModel::default()).unwrap();
        assert!((result.mass_kg - 1.5708e9).abs() / 1.5708e9 < 1e-3);
        assert!((result.kinetic_energy_j - 2.27e17).abs() / 2.27e17 < 1e-2);
        assert!(result.is_hazardous);
        assert!((result.tnt_megatons - result.kinetic_energy_j / 4.184e15).abs() < 1e-9);
    }

    #[test]
    fn test_size_angle_law_matches_calibration() {
        // At the calibration velocity and density the law is diameter * k * sin(angle)
        let spec = ImpactorSpec::with_density(50.0, REFERENCE_DENSITY, 17.0, 30.0);
        let result = calculate_impact(&spec, &ImpactModel::default()).unwrap();
        assert!((result.crater_diameter_m - 50.0 * 20.0 * 0.5).abs() < 1e-9);
        assert!((result.ejecta_radius_m - 1.2 * result.crater_diameter_m).abs() < 1e-9);
        assert!((result.dust_height_m - 0.1 * result.crater_diameter_m).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_in_velocity_and_diameter() {
        let model = ImpactModel::default();
        let mut previous = calculate_impact(&reference_spec(), &model).unwrap();
        for step in 1..20 {
            let spec = ImpactorSpec {
                velocity_km_s: 17.0 + step as f64,
                ..reference_spec()
            };
            let next = calculate_impact(&spec, &model).unwrap();
            assert!(next.kinetic_energy_j > previous.kinetic_energy_j);
            assert!(next.crater_diameter_m > previous.crater_diameter_m);
            previous = next;
        }

        let mut previous = calculate_impact(&reference_spec(), &model).unwrap();
        for step in 1..20 {
            let spec = ImpactorSpec {
                diameter_m: 100.0 + 10.0 * step as f64,
                ..reference_spec()
            };
            let next = calculate_impact(&spec, &model).unwrap();
            assert!(next.kinetic_energy_j > previous.kinetic_energy_j);
            assert!(next.crater_diameter_m > previous.crater_diameter_m);
            previous = next;
        }
    }

    #[test]
    fn test_supplied_mass_crater_grows_with_size() {
        let model = ImpactModel::default();
        let small = calculate_impact(&ImpactorSpec::with_mass(100.0, 1e9, 17.0, 45.0), &model)
            .unwrap();
        let large = calculate_impact(&ImpactorSpec::with_mass(200.0, 1e9, 17.0, 45.0), &model)
            .unwrap();
        assert!(large.crater_diameter_m > small.crater_diameter_m);
        assert_eq!(large.kinetic_energy_j, small.kinetic_energy_j);

        let mut previous = small;
        for step in 1..20 {
            let spec = ImpactorSpec::with_mass(100.0, 1e9, 17.0 + step as f64, 45.0);
            let next = calculate_impact(&spec, &model).unwrap();
            assert!(next.kinetic_energy_j > previous.kinetic_energy_j);
            assert!(next.crater_diameter_m > previous.crater_diameter_m);
            previous = next;
        }
    }

    #[test]
    fn test_explicit_mass_is_authoritative() {
        let spec = ImpactorSpec::with_mass(100.0, 1.0e9, 10.0, 90.0);
        let result = calculate_impact(&spec, &ImpactModel::default()).unwrap();
        assert!((result.mass_kg - 1.0e9).abs() < 1e-3);
        assert!((result.kinetic_energy_j - 0.5 * 1.0e9 * 1.0e8).abs() < 1.0);
    }

    #[test]
    fn test_hazard_override_not_overwritten() {
        let model = ImpactModel::default();
        let safe = reference_spec().hazard_override(false);
        assert!(!calculate_impact(&safe, &model).unwrap().is_hazardous);

        let tiny = ImpactorSpec::with_density(0.5, 1000.0, 1.0, 45.0).hazard_override(true);
        assert!(calculate_impact(&tiny, &model).unwrap().is_hazardous);

        let tiny = ImpactorSpec::with_density(0.5, 1000.0, 1.0, 45.0);
        assert!(!calculate_impact(&tiny, &model).unwrap().is_hazardous);
    }

    #[test]
    fn test_legacy_force_law_is_clamped() {
        let model = ImpactModel {
            crater_law: CraterLaw::ForceClamped,
            ..ImpactModel::default()
        };
        let small = ImpactorSpec::with_density(50.0, 3000.0, 10.0, 45.0);
        let result = calculate_impact(&small, &model).unwrap();
        assert!((result.impact_force - 0.5).abs() < 1e-12);
        assert!((result.crater_diameter_m - 250.0).abs() < 1e-9);

        let huge = ImpactorSpec::with_density(5000.0, 3000.0, 30.0, 45.0);
        let result = calculate_impact(&huge, &model).unwrap();
        assert!((result.impact_force - model.force_cap).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_specs_rejected() {
        let model = ImpactModel::default();
        let bad = [
            ImpactorSpec::with_density(0.0, 3000.0, 17.0, 45.0),
            ImpactorSpec::with_density(100.0, -1.0, 17.0, 45.0),
            ImpactorSpec::with_density(100.0, 3000.0, 0.0, 45.0),
            ImpactorSpec::with_density(100.0, 3000.0, 17.0, 0.0),
            ImpactorSpec::with_density(100.0, 3000.0, 17.0, 90.5),
            ImpactorSpec::with_mass(100.0, f64::NAN, 17.0, 45.0),
        ];
        for spec in bad {
            assert!(matches!(
                calculate_impact(&spec, &model),
                Err(EngineError::InvalidSpec(_))
            ));
        }
        assert!(ImpactorSpec::with_density(100.0, 3000.0, 17.0, 90.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_custom_spec_json() {
        let json = r#"{ "diameter": 120, "density": 2500, "velocity": 20, "angle": 60 }"#;
        let spec: ImpactorSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.mass_source, MassSource::Density(2500.0));
        assert!((spec.diameter_m - 120.0).abs() < 1e-12);
        assert_eq!(spec.hazard_override, None);
    }

    #[test]
    fn test_format_mass() {
        assert_eq!(format_mass(1.5708e9), "1.57 million tons");
        assert_eq!(format_mass(2.0e12), "2.00 billion tons");
        assert_eq!(format_mass(500.0), "500.00 kg");
        assert_eq!(format_mass(2500.0), "2.50 tons");
        assert_eq!(format_mass(f64::NAN), "Unknown");
    }
}

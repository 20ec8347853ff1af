// Engine Configuration
// Named tunables for the impact engine. Loaded from JSON, or from the
// environment (with an optional .env file) for the headless driver.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::crater::CraterStyle;
use crate::error::{EngineError, Result};
use crate::geo::LonConvention;
use crate::impact_physics::CraterLaw;
use crate::trajectory::PathStrategy;

/// Prefix for environment overrides, e.g. `IMPACT_SIM_SPEED=0.02`.
pub const ENV_PREFIX: &str = "IMPACT_SIM_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- target and impactor geometry (scene units) ---
    #[serde(default = "default_target_radius")]
    pub target_radius: f64,
    #[serde(default = "default_impactor_radius")]
    pub impactor_radius: f64,
    #[serde(default = "default_launch_origin")]
    pub launch_origin: DVec3,
    /// Spin of the target about +Y, radians per frame
    #[serde(default)]
    pub target_spin: f64,
    /// Relative tolerance when checking that a picked point lies on the sphere
    #[serde(default = "default_surface_tolerance")]
    pub surface_tolerance: f64,

    // --- trajectory ---
    /// Normalized-time increment per frame (not wall-clock)
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Tumble about the launch's rotation axis, radians per frame
    #[serde(default = "default_rotation_speed")]
    pub rotation_speed: f64,
    #[serde(default)]
    pub path: PathStrategy,
    /// Seconds
    #[serde(default = "default_fade_duration")]
    pub fade_duration: f64,

    // --- effects ---
    #[serde(default = "default_trail_length")]
    pub trail_length: usize,
    #[serde(default = "default_heat_radius")]
    pub heat_radius: f64,
    #[serde(default = "default_heat_threshold")]
    pub heat_threshold: f64,
    #[serde(default = "default_glow_intensity")]
    pub glow_intensity: f64,
    #[serde(default = "default_base_color")]
    pub base_color: DVec3,
    #[serde(default = "default_hot_color")]
    pub hot_color: DVec3,
    #[serde(default = "default_glow_color")]
    pub glow_color: DVec3,
    #[serde(default = "default_dust_particle_count")]
    pub dust_particle_count: usize,
    #[serde(default = "default_dust_spread")]
    pub dust_spread: f64,
    #[serde(default = "default_dust_lift")]
    pub dust_lift: f64,
    /// Re-entry spray streamed behind the heated impactor
    #[serde(default = "default_spray_particle_count")]
    pub spray_particle_count: usize,
    /// Furthest a spray particle trails behind the body, scene units
    #[serde(default = "default_spray_length")]
    pub spray_length: f64,
    /// Dust gravity, scene units per frame²
    #[serde(default = "default_gravity")]
    pub gravity: f64,

    // --- physics ---
    #[serde(default)]
    pub crater_law: CraterLaw,
    /// Constant k of the size/angle crater law
    #[serde(default = "default_crater_scale")]
    pub crater_scale: f64,
    #[serde(default = "default_force_cap")]
    pub force_cap: f64,
    /// Joules
    #[serde(default = "default_hazard_threshold")]
    pub hazard_threshold_j: f64,

    // --- crater projection ---
    #[serde(default)]
    pub crater_style: CraterStyle,
    #[serde(default = "default_decal_scale")]
    pub decal_scale: f64,
    #[serde(default = "default_decal_depth_ratio")]
    pub decal_depth_ratio: f64,
    #[serde(default = "default_decal_segments")]
    pub decal_segments: usize,
    #[serde(default = "default_decal_offset")]
    pub decal_offset: f64,

    // --- geo / runtime ---
    #[serde(default)]
    pub lon_convention: LonConvention,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

fn default_target_radius() -> f64 {
    8.0
}
fn default_impactor_radius() -> f64 {
    0.3
}
fn default_launch_origin() -> DVec3 {
    DVec3::new(15.0, 15.0, 15.0)
}
fn default_surface_tolerance() -> f64 {
    1e-3
}
fn default_speed() -> f64 {
    0.01
}
fn default_rotation_speed() -> f64 {
    0.05
}
fn default_fade_duration() -> f64 {
    1.0
}
fn default_trail_length() -> usize {
    50
}
fn default_heat_radius() -> f64 {
    16.0
}
fn default_heat_threshold() -> f64 {
    0.3
}
fn default_glow_intensity() -> f64 {
    1.0
}
fn default_base_color() -> DVec3 {
    // light sky blue
    DVec3::new(135.0 / 255.0, 206.0 / 255.0, 250.0 / 255.0)
}
fn default_hot_color() -> DVec3 {
    // orange red
    DVec3::new(1.0, 69.0 / 255.0, 0.0)
}
fn default_glow_color() -> DVec3 {
    DVec3::new(1.0, 1.0, 0.0)
}
fn default_dust_particle_count() -> usize {
    180
}
fn default_dust_spread() -> f64 {
    0.04
}
fn default_dust_lift() -> f64 {
    0.06
}
fn default_spray_particle_count() -> usize {
    100
}
fn default_spray_length() -> f64 {
    2.0
}
fn default_gravity() -> f64 {
    0.002
}
fn default_crater_scale() -> f64 {
    20.0
}
fn default_force_cap() -> f64 {
    2.0
}
fn default_hazard_threshold() -> f64 {
    1e12
}
fn default_decal_scale() -> f64 {
    0.8
}
fn default_decal_depth_ratio() -> f64 {
    0.25
}
fn default_decal_segments() -> usize {
    8
}
fn default_decal_offset() -> f64 {
    0.01
}
fn default_frame_interval_ms() -> u64 {
    16
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_radius: default_target_radius(),
            impactor_radius: default_impactor_radius(),
            launch_origin: default_launch_origin(),
            target_spin: 0.0,
            surface_tolerance: default_surface_tolerance(),
            speed: default_speed(),
            rotation_speed: default_rotation_speed(),
            path: PathStrategy::default(),
            fade_duration: default_fade_duration(),
            trail_length: default_trail_length(),
            heat_radius: default_heat_radius(),
            heat_threshold: default_heat_threshold(),
            glow_intensity: default_glow_intensity(),
            base_color: default_base_color(),
            hot_color: default_hot_color(),
            glow_color: default_glow_color(),
            dust_particle_count: default_dust_particle_count(),
            dust_spread: default_dust_spread(),
            dust_lift: default_dust_lift(),
            spray_particle_count: default_spray_particle_count(),
            spray_length: default_spray_length(),
            gravity: default_gravity(),
            crater_law: CraterLaw::default(),
            crater_scale: default_crater_scale(),
            force_cap: default_force_cap(),
            hazard_threshold_j: default_hazard_threshold(),
            crater_style: CraterStyle::default(),
            decal_scale: default_decal_scale(),
            decal_depth_ratio: default_decal_depth_ratio(),
            decal_segments: default_decal_segments(),
            decal_offset: default_decal_offset(),
            lon_convention: LonConvention::default(),
            seed: None,
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&data)
    }

    /// Defaults overridden by `IMPACT_SIM_*` variables. A `.env` file in the
    /// working directory is loaded first if present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::default();
        env_override("TARGET_RADIUS", &mut config.target_radius)?;
        env_override("IMPACTOR_RADIUS", &mut config.impactor_radius)?;
        env_override("TARGET_SPIN", &mut config.target_spin)?;
        env_override("SPEED", &mut config.speed)?;
        env_override("ROTATION_SPEED", &mut config.rotation_speed)?;
        env_override("FADE_DURATION", &mut config.fade_duration)?;
        env_override("TRAIL_LENGTH", &mut config.trail_length)?;
        env_override("HEAT_RADIUS", &mut config.heat_radius)?;
        env_override("HEAT_THRESHOLD", &mut config.heat_threshold)?;
        env_override("GLOW_INTENSITY", &mut config.glow_intensity)?;
        env_override("DUST_PARTICLE_COUNT", &mut config.dust_particle_count)?;
        env_override("SPRAY_PARTICLE_COUNT", &mut config.spray_particle_count)?;
        env_override("GRAVITY", &mut config.gravity)?;
        env_override("CRATER_SCALE", &mut config.crater_scale)?;
        env_override("HAZARD_THRESHOLD_J", &mut config.hazard_threshold_j)?;
        env_override("FRAME_INTERVAL_MS", &mut config.frame_interval_ms)?;

        if let Ok(seed) = std::env::var(format!("{}SEED", ENV_PREFIX)) {
            let seed = seed
                .parse::<u64>()
                .map_err(|e| EngineError::InvalidConfig(format!("{}SEED: {}", ENV_PREFIX, e)))?;
            config.seed = Some(seed);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("target_radius", self.target_radius),
            ("impactor_radius", self.impactor_radius),
            ("speed", self.speed),
            ("fade_duration", self.fade_duration),
            ("heat_radius", self.heat_radius),
            ("crater_scale", self.crater_scale),
            ("force_cap", self.force_cap),
            ("surface_tolerance", self.surface_tolerance),
            ("spray_length", self.spray_length),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        if !(0.0..1.0).contains(&self.heat_threshold) {
            return Err(EngineError::InvalidConfig(format!(
                "heat_threshold must be in [0, 1), got {}",
                self.heat_threshold
            )));
        }
        if self.trail_length == 0 {
            return Err(EngineError::InvalidConfig(
                "trail_length must be at least 1".to_string(),
            ));
        }
        if self.dust_particle_count == 0 {
            return Err(EngineError::InvalidConfig(
                "dust_particle_count must be at least 1".to_string(),
            ));
        }
        if self.spray_particle_count == 0 {
            return Err(EngineError::InvalidConfig(
                "spray_particle_count must be at least 1".to_string(),
            ));
        }
        if self.decal_segments == 0 {
            return Err(EngineError::InvalidConfig(
                "decal_segments must be at least 1".to_string(),
            ));
        }
        if self.gravity < 0.0 || self.dust_spread < 0.0 || self.dust_lift < 0.0 {
            return Err(EngineError::InvalidConfig(
                "dust gravity, spread and lift must not be negative".to_string(),
            ));
        }
        if self.launch_origin.length() <= self.target_radius + self.impactor_radius {
            return Err(EngineError::InvalidConfig(
                "launch_origin lies inside the collision shell".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_override<T: FromStr>(key: &str, target: &mut T) -> Result<()>
where
    T::Err: std::fmt::Display,
{
    let name = format!("{}{}", ENV_PREFIX, key);
    if let Ok(raw) = std::env::var(&name) {
        *target = raw
            .trim()
            .parse::<T>()
            .map_err(|e| EngineError::InvalidConfig(format!("{}: {}", name, e)))?;
    }
    Ok(())
}

// Particle & Visual Effects
// Trail ring buffer, re-entry spray, post-impact dust field, atmospheric
// heating and the single fade timer that drives every visual channel.

use glam::DVec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

// =============================================================================
// TRAIL
// =============================================================================

/// Fixed-capacity ordered history of impactor positions, newest in slot 0.
#[derive(Debug, Clone)]
pub struct TrailBuffer {
    slots: Vec<DVec3>,
    filled: usize,
}

impl TrailBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![DVec3::ZERO; capacity.max(1)],
            filled: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Shift every entry one slot toward the tail and write `position` into
    /// slot 0. The oldest entry falls off once the buffer is full.
    pub fn push(&mut self, position: DVec3) {
        let n = self.slots.len();
        self.slots.copy_within(0..n - 1, 1);
        self.slots[0] = position;
        self.filled = (self.filled + 1).min(n);
    }

    pub fn clear(&mut self) {
        self.filled = 0;
    }

    pub fn newest(&self) -> Option<DVec3> {
        (self.filled > 0).then(|| self.slots[0])
    }

    /// Newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &DVec3> {
        self.slots[..self.filled].iter()
    }

    pub fn to_vec(&self) -> Vec<DVec3> {
        self.slots[..self.filled].to_vec()
    }
}

// =============================================================================
// DUST
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DustParticle {
    pub position: DVec3,
    pub velocity: DVec3,
}

/// Fixed-count particle cloud thrown up at the impact point. Never resized;
/// hidden as a whole when the fade completes.
#[derive(Debug, Clone)]
pub struct DustField {
    particles: Vec<DustParticle>,
    gravity: f64,
    spread: f64,
    lift: f64,
    active: bool,
}

impl DustField {
    pub fn new(count: usize, gravity: f64, spread: f64, lift: f64) -> Self {
        Self {
            particles: vec![
                DustParticle {
                    position: DVec3::ZERO,
                    velocity: DVec3::ZERO,
                };
                count
            ],
            gravity,
            spread,
            lift,
            active: false,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.dust_particle_count,
            config.gravity,
            config.dust_spread,
            config.dust_lift,
        )
    }

    /// Place every particle at `origin` with a small random horizontal
    /// velocity and an upward bias.
    pub fn activate<R: Rng>(&mut self, origin: DVec3, rng: &mut R) {
        for p in &mut self.particles {
            p.position = origin;
            p.velocity = DVec3::new(
                (rng.gen::<f64>() - 0.5) * 2.0 * self.spread,
                self.lift * (0.5 + rng.gen::<f64>()),
                (rng.gen::<f64>() - 0.5) * 2.0 * self.spread,
            );
        }
        self.active = true;
    }

    /// One gravity step. Inactive fields are left untouched.
    pub fn step(&mut self) {
        if !self.active {
            return;
        }
        for p in &mut self.particles {
            p.position += p.velocity;
            p.velocity.y -= self.gravity;
        }
    }

    pub fn hide(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[DustParticle] {
        &self.particles
    }

    pub fn positions(&self) -> Vec<DVec3> {
        self.particles.iter().map(|p| p.position).collect()
    }
}

// =============================================================================
// HEAT
// =============================================================================

/// Atmospheric heating of the impactor for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatState {
    /// max(0, 1 - distance / heat_radius)
    pub factor: f64,
    /// True only above the threshold; below it every heat effect is off
    pub active: bool,
    pub emissive_intensity: f64,
    pub body_color: DVec3,
    pub emissive_color: DVec3,
}

impl HeatState {
    pub fn cold(base_color: DVec3) -> Self {
        Self {
            factor: 0.0,
            active: false,
            emissive_intensity: 0.0,
            body_color: base_color,
            emissive_color: DVec3::ZERO,
        }
    }
}

pub fn heat_factor(distance_to_center: f64, heat_radius: f64) -> f64 {
    (1.0 - distance_to_center / heat_radius).max(0.0)
}

/// Heat for an impactor `distance_to_center` away from the target, with
/// `clock` (seconds) driving the glow flicker.
pub fn compute_heat(distance_to_center: f64, clock: f64, config: &EngineConfig) -> HeatState {
    let factor = heat_factor(distance_to_center, config.heat_radius);
    if factor <= config.heat_threshold {
        return HeatState {
            factor,
            ..HeatState::cold(config.base_color)
        };
    }

    // 0 at the threshold, 1 at the body center
    let progress = ((factor - config.heat_threshold) / (1.0 - config.heat_threshold)).min(1.0);
    let pulse = (clock * 10.0).sin() * 0.2 + 0.8;

    HeatState {
        factor,
        active: true,
        emissive_intensity: progress * config.glow_intensity * pulse,
        body_color: config.base_color.lerp(config.hot_color, progress),
        emissive_color: config.glow_color,
    }
}

// =============================================================================
// RE-ENTRY SPRAY
// =============================================================================

/// Point size of the spray at the body center
const SPRAY_POINT_SIZE: f64 = 4.0;

/// Fixed-count particles streaming behind the impactor while it is heated.
/// Re-scattered every frame; drawn with the glow channel's opacity.
#[derive(Debug, Clone)]
pub struct SprayField {
    positions: Vec<DVec3>,
    length: f64,
    point_size: f64,
    active: bool,
}

impl SprayField {
    pub fn new(count: usize, length: f64) -> Self {
        Self {
            positions: vec![DVec3::ZERO; count],
            length,
            point_size: 0.0,
            active: false,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.spray_particle_count, config.spray_length)
    }

    /// Scatter every particle on the segment trailing `length` behind
    /// `position` along `-direction`. Below the heat threshold the spray is
    /// hidden instead.
    pub fn emit<R: Rng>(
        &mut self,
        position: DVec3,
        direction: DVec3,
        heat: &HeatState,
        rng: &mut R,
    ) {
        if !heat.active {
            self.hide();
            return;
        }
        let back = direction.normalize_or_zero() * self.length;
        for p in &mut self.positions {
            *p = position - back * rng.gen::<f64>();
        }
        self.point_size = heat.factor * SPRAY_POINT_SIZE;
        self.active = true;
    }

    pub fn hide(&mut self) {
        self.active = false;
        self.point_size = 0.0;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn point_size(&self) -> f64 {
        self.point_size
    }

    pub fn positions(&self) -> &[DVec3] {
        &self.positions
    }
}

// =============================================================================
// FADE
// =============================================================================

/// Opacity of the four visual channels. All of them are the same fade
/// scalar multiplied by whether the channel is currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelOpacity {
    pub body: f64,
    pub trail: f64,
    pub glow: f64,
    pub dust: f64,
}

impl ChannelOpacity {
    pub fn from_fade(fade: f64, glow_on: bool, dust_on: bool) -> Self {
        let fade = fade.clamp(0.0, 1.0);
        Self {
            body: fade,
            trail: fade,
            glow: if glow_on { fade } else { 0.0 },
            dust: if dust_on { fade } else { 0.0 },
        }
    }

    pub fn hidden() -> Self {
        Self::default()
    }
}

/// Linear fade from 1 to 0 over `duration` seconds after `start`.
pub fn fade_opacity(now: f64, start: f64, duration: f64) -> f64 {
    (1.0 - (now - start) / duration).clamp(0.0, 1.0)
}

// =============================================================================
// APPEARANCE
// =============================================================================

const MIN_REAL_DIAMETER_M: f64 = 1.0;
const MAX_REAL_DIAMETER_M: f64 = 1000.0;

pub const MIN_DISPLAY_SIZE: f64 = 8.0;
pub const MAX_DISPLAY_SIZE: f64 = 120.0;

/// How an impactor is drawn in lists and on its launch marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub size: f64,
    pub color: DVec3,
}

impl Appearance {
    pub fn for_impactor(diameter_m: f64, is_hazardous: bool) -> Self {
        Self {
            size: display_size(diameter_m, MIN_DISPLAY_SIZE, MAX_DISPLAY_SIZE),
            color: hazard_color(diameter_m, is_hazardous),
        }
    }
}

/// Log-scaled display size for a body of `diameter_m`: 1 m maps to
/// `min_size`, 1 km and above to `max_size`.
pub fn display_size(diameter_m: f64, min_size: f64, max_size: f64) -> f64 {
    let log_min = MIN_REAL_DIAMETER_M.ln();
    let log_max = MAX_REAL_DIAMETER_M.ln();
    let log_value = diameter_m.clamp(MIN_REAL_DIAMETER_M, MAX_REAL_DIAMETER_M).ln();

    let normalized = (log_value - log_min) / (log_max - log_min);
    min_size + normalized * (max_size - min_size)
}

/// Body tint in 0..1 RGB: red shades for hazardous bodies, blue/green for
/// safe ones, deeper with size up to 500 m.
pub fn hazard_color(diameter_m: f64, is_hazardous: bool) -> DVec3 {
    let size = (diameter_m / 500.0).clamp(0.0, 1.0);
    let rgb = if is_hazardous {
        DVec3::new(200.0 + size * 55.0, 100.0 - size * 80.0, 100.0 - size * 80.0)
    } else {
        DVec3::new(100.0 + size * 50.0, 150.0 + size * 50.0, 200.0 - size * 50.0)
    };
    rgb / 255.0
}

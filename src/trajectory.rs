// Trajectory Controller
// Owns the single live impactor, moves it toward the picked surface point
// one frame at a time, detects the collision and drives the effects.
//
// Time base is normalized: t advances by a fixed `speed` per frame. Only the
// post-impact fade is measured in seconds.

use chrono::{DateTime, Utc};
use glam::{DQuat, DVec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::crater::{project_crater, CraterDecal, CraterParams};
use crate::effects::{
    compute_heat, fade_opacity, Appearance, ChannelOpacity, DustField, HeatState, SprayField,
    TrailBuffer,
};
use crate::error::{EngineError, Result};
use crate::geo::{self, GeoPoint};
use crate::impact_physics::{calculate_impact, ImpactModel, ImpactResult, ImpactorSpec};

/// Consecutive failed impact resolutions before a launch is abandoned
const MAX_IMPACT_RETRIES: u32 = 3;

/// Lift of the impactor above the surface once it has struck, as a fraction
/// of its radius
const SURFACE_REST_FRACTION: f64 = 0.1;

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Approaching,
    Impacted,
    Fading,
}

/// How the impactor travels from its start to the target.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStrategy {
    /// Straight line, t² eased
    #[default]
    Eased,
    /// Quadratic Bezier through the midpoint lifted by `height * 20` on +Y
    Arc { height: f64 },
}

impl PathStrategy {
    /// Point on the path at `progress` in [0, 1]. Both endpoints are exact.
    pub fn position(&self, start: DVec3, target: DVec3, progress: f64) -> DVec3 {
        match *self {
            PathStrategy::Eased => start * (1.0 - progress) + target * progress,
            PathStrategy::Arc { height } => {
                let control = (start + target) * 0.5 + DVec3::Y * (height * 20.0);
                let inv = 1.0 - progress;
                start * (inv * inv)
                    + control * (2.0 * inv * progress)
                    + target * (progress * progress)
            }
        }
    }
}

/// Quadratic ease-in: slow start, accelerating into the target.
pub fn eased_progress(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t
}

/// Mutable state of the one live impactor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactorState {
    pub launch_id: u64,
    pub spec: ImpactorSpec,
    pub appearance: Appearance,
    pub phase: Phase,
    /// Normalized time, not wall-clock
    pub t: f64,
    pub start_position: DVec3,
    pub target_point: DVec3,
    pub position: DVec3,
    pub orientation: DQuat,
    /// Unit axis, fixed for the life of the launch
    pub rotation_axis: DVec3,
    /// Engine clock (seconds) at the collision frame
    pub fade_start_time: f64,
    pub fade_opacity: f64,
    failed_resolutions: u32,
}

/// Everything produced at the collision instant. Also the payload handed to
/// the reverse-geocoding collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEvent {
    pub launch_id: u64,
    pub result: ImpactResult,
    pub geo: GeoPoint,
    /// Impact point on the reference sphere, target body frame
    pub impact_point: DVec3,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Impact(ImpactEvent),
    /// t ran past 1 without touching the target
    Missed { launch_id: u64 },
    /// Fade completed, engine is idle again
    Finished { launch_id: u64 },
}

/// Pull-based snapshot of everything the rendering layer draws.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameState {
    pub frame: u64,
    pub clock: f64,
    pub phase: Phase,
    pub launch_id: Option<u64>,
    pub appearance: Option<Appearance>,
    pub t: f64,
    pub position: Option<DVec3>,
    pub orientation: DQuat,
    pub fade_opacity: f64,
    pub channels: ChannelOpacity,
    pub heat: HeatState,
    pub trail: Vec<DVec3>,
    /// Re-entry spray, empty unless the impactor is heated
    pub spray: Vec<DVec3>,
    pub spray_size: f64,
    pub dust: Vec<DVec3>,
    pub crater: Option<CraterDecal>,
    pub target_rotation: f64,
}

// =============================================================================
// ENGINE
// =============================================================================

pub struct TrajectoryEngine {
    config: EngineConfig,
    model: ImpactModel,
    crater_params: CraterParams,
    rng: StdRng,
    /// Seconds accumulated from `advance`
    clock: f64,
    frame: u64,
    /// Spin of the target about +Y, radians
    target_rotation: f64,
    next_launch_id: u64,
    state: Option<ImpactorState>,
    trail: TrailBuffer,
    spray: SprayField,
    dust: DustField,
    heat: HeatState,
    crater: Option<CraterDecal>,
    last_impact: Option<ImpactEvent>,
    impact_tx: Option<UnboundedSender<ImpactEvent>>,
}

impl TrajectoryEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            model: ImpactModel::from_config(&config),
            crater_params: CraterParams::from_config(&config),
            rng,
            clock: 0.0,
            frame: 0,
            target_rotation: 0.0,
            next_launch_id: 1,
            state: None,
            trail: TrailBuffer::new(config.trail_length),
            spray: SprayField::from_config(&config),
            dust: DustField::from_config(&config),
            heat: HeatState::cold(config.base_color),
            crater: None,
            last_impact: None,
            impact_tx: None,
            config,
        })
    }

    /// Route every impact to an external collaborator. Sending never blocks.
    pub fn set_impact_sender(&mut self, tx: UnboundedSender<ImpactEvent>) {
        self.impact_tx = Some(tx);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.state.as_ref().map_or(Phase::Idle, |s| s.phase)
    }

    pub fn is_busy(&self) -> bool {
        self.phase() != Phase::Idle
    }

    pub fn state(&self) -> Option<&ImpactorState> {
        self.state.as_ref()
    }

    pub fn trail(&self) -> &TrailBuffer {
        &self.trail
    }

    pub fn spray(&self) -> &SprayField {
        &self.spray
    }

    pub fn dust(&self) -> &DustField {
        &self.dust
    }

    pub fn heat(&self) -> &HeatState {
        &self.heat
    }

    pub fn crater(&self) -> Option<&CraterDecal> {
        self.crater.as_ref()
    }

    pub fn last_impact(&self) -> Option<&ImpactEvent> {
        self.last_impact.as_ref()
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn target_rotation(&self) -> f64 {
        self.target_rotation
    }

    /// Launch from the configured origin toward a picked surface point.
    pub fn request_launch(&mut self, spec: ImpactorSpec, picked_point: DVec3) -> Result<u64> {
        let origin = self.config.launch_origin;
        self.launch(spec, origin, picked_point)
    }

    /// Start a new impactor. Rejected while another one is live; nothing is
    /// touched unless every check passes.
    pub fn launch(&mut self, spec: ImpactorSpec, start: DVec3, target: DVec3) -> Result<u64> {
        if let Some(active) = &self.state {
            warn!(
                active = active.launch_id,
                phase = ?active.phase,
                "launch rejected, impactor still in flight"
            );
            return Err(EngineError::RejectedBusy);
        }

        // Surfaces overflow and similar failures now rather than at the
        // collision frame
        let preview = calculate_impact(&spec, &self.model)?;
        self.validate_points(start, target)?;

        let launch_id = self.next_launch_id;
        self.next_launch_id += 1;

        let rotation_axis = random_unit_vector(&mut self.rng);

        self.trail = TrailBuffer::new(self.config.trail_length);
        self.trail.push(start);
        self.spray.hide();
        self.dust.hide();
        self.heat = compute_heat(start.length(), self.clock, &self.config);
        self.crater = None;

        self.state = Some(ImpactorState {
            launch_id,
            spec,
            appearance: Appearance::for_impactor(spec.diameter_m, preview.is_hazardous),
            phase: Phase::Approaching,
            t: 0.0,
            start_position: start,
            target_point: target,
            position: start,
            orientation: DQuat::IDENTITY,
            rotation_axis,
            fade_start_time: 0.0,
            fade_opacity: 1.0,
            failed_resolutions: 0,
        });

        debug!(
            launch_id,
            diameter_m = spec.diameter_m,
            velocity_km_s = spec.velocity_km_s,
            angle_deg = spec.angle_deg,
            "impactor launched"
        );
        Ok(launch_id)
    }

    fn validate_points(&self, start: DVec3, target: DVec3) -> Result<()> {
        let radius = self.config.target_radius;

        if !target.is_finite() {
            return Err(EngineError::InvalidSpec(
                "picked point is not finite".to_string(),
            ));
        }
        let off_surface = (target.length() - radius).abs();
        if off_surface > self.config.surface_tolerance * radius {
            return Err(EngineError::InvalidSpec(format!(
                "picked point lies {:.4} off the target surface",
                off_surface
            )));
        }
        // the path ends exactly on the pick, so it must lie inside the shell
        if target.length() >= radius + self.config.impactor_radius {
            return Err(EngineError::InvalidSpec(
                "picked point lies outside the collision shell".to_string(),
            ));
        }

        if !start.is_finite() {
            return Err(EngineError::InvalidSpec(
                "start position is not finite".to_string(),
            ));
        }
        if start.length() < radius + self.config.impactor_radius {
            return Err(EngineError::InvalidSpec(
                "start position lies inside the collision shell".to_string(),
            ));
        }

        Ok(())
    }

    /// Advance one frame. `dt` is the real frame time in seconds and only
    /// feeds the fade timer and glow flicker.
    pub fn advance(&mut self, dt: f64) -> Option<EngineEvent> {
        if dt.is_finite() && dt > 0.0 {
            self.clock += dt;
        }
        self.frame += 1;
        self.target_rotation = (self.target_rotation + self.config.target_spin) % (2.0 * PI);

        match self.phase() {
            Phase::Idle => None,
            Phase::Approaching => self.advance_approach(),
            Phase::Impacted | Phase::Fading => self.advance_fade(),
        }
    }

    fn advance_approach(&mut self) -> Option<EngineEvent> {
        let collision_radius = self.config.target_radius + self.config.impactor_radius;

        // 1. position
        let (position, t) = {
            let state = self.state.as_mut()?;
            state.t += self.config.speed;

            let progress = eased_progress(state.t);
            state.position =
                self.config
                    .path
                    .position(state.start_position, state.target_point, progress);

            let spin = DQuat::from_axis_angle(state.rotation_axis, self.config.rotation_speed);
            state.orientation = (spin * state.orientation).normalize();

            (state.position, state.t)
        };

        // 2. collision
        if position.length() < collision_radius {
            match self.resolve_impact(position) {
                Ok(event) => {
                    self.update_effects();
                    return Some(event);
                }
                Err(e) => return self.retry_impact(e),
            }
        }

        if t > 1.0 {
            return self.finish_missed();
        }

        // 3. effects
        self.update_effects();
        None
    }

    fn resolve_impact(&mut self, position: DVec3) -> Result<EngineEvent> {
        let (launch_id, spec) = match &self.state {
            Some(state) => (state.launch_id, state.spec),
            None => {
                return Err(EngineError::InvalidSpec(
                    "no impactor in flight".to_string(),
                ))
            }
        };
        let radius = self.config.target_radius;

        let result = calculate_impact(&spec, &self.model)?;
        let surface_point = position.normalize_or_zero() * radius;
        let body_point = geo::world_to_body(surface_point, self.target_rotation);
        let crater = project_crater(body_point, result.impact_force, &self.crater_params)?;
        let geo_point = geo::to_geo(body_point, radius, self.config.lon_convention)?;

        // Nothing below can fail
        let event = ImpactEvent {
            launch_id,
            result,
            geo: geo_point,
            impact_point: body_point,
            occurred_at: Utc::now(),
        };

        if let Some(state) = self.state.as_mut() {
            state.phase = Phase::Impacted;
            state.fade_start_time = self.clock;
            state.fade_opacity = 1.0;
            state.position = surface_point.normalize_or_zero()
                * (radius + self.config.impactor_radius * SURFACE_REST_FRACTION);
        }

        self.dust.activate(surface_point, &mut self.rng);
        self.crater = Some(crater);
        self.last_impact = Some(event.clone());

        if let Some(tx) = &self.impact_tx {
            if tx.send(event.clone()).is_err() {
                debug!(launch_id, "impact hand-off receiver dropped");
            }
        }

        info!(
            launch_id,
            lat = geo_point.lat,
            lon = geo_point.lon,
            kinetic_energy_j = result.kinetic_energy_j,
            crater_diameter_m = result.crater_diameter_m,
            hazardous = result.is_hazardous,
            "impact"
        );

        Ok(EngineEvent::Impact(event))
    }

    /// Stay one frame behind and try again next tick.
    fn retry_impact(&mut self, error: EngineError) -> Option<EngineEvent> {
        let state = self.state.as_mut()?;
        state.t -= self.config.speed;
        state.failed_resolutions += 1;

        warn!(
            launch_id = state.launch_id,
            attempt = state.failed_resolutions,
            %error,
            "impact resolution failed"
        );

        if state.failed_resolutions >= MAX_IMPACT_RETRIES {
            return self.finish_missed();
        }
        None
    }

    fn finish_missed(&mut self) -> Option<EngineEvent> {
        let state = self.state.take()?;
        self.hide_visuals();
        debug!(launch_id = state.launch_id, t = state.t, "impactor missed the target");
        Some(EngineEvent::Missed {
            launch_id: state.launch_id,
        })
    }

    fn update_effects(&mut self) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        let travel = self
            .trail
            .newest()
            .map_or(DVec3::ZERO, |previous| state.position - previous);
        self.trail.push(state.position);
        self.heat = compute_heat(state.position.length(), self.clock, &self.config);
        self.spray.emit(state.position, travel, &self.heat, &mut self.rng);
    }

    fn advance_fade(&mut self) -> Option<EngineEvent> {
        let opacity = {
            let state = self.state.as_mut()?;
            state.phase = Phase::Fading;
            state.fade_opacity =
                fade_opacity(self.clock, state.fade_start_time, self.config.fade_duration);
            state.fade_opacity
        };

        self.dust.step();

        if opacity <= 0.0 {
            let state = self.state.take()?;
            self.hide_visuals();
            debug!(launch_id = state.launch_id, "fade complete");
            return Some(EngineEvent::Finished {
                launch_id: state.launch_id,
            });
        }
        None
    }

    fn hide_visuals(&mut self) {
        self.trail.clear();
        self.spray.hide();
        self.dust.hide();
        self.heat = HeatState::cold(self.config.base_color);
    }

    pub fn frame_state(&self) -> FrameState {
        let (launch_id, appearance, t, position, orientation, fade, channels) = match &self.state
        {
            Some(state) => (
                Some(state.launch_id),
                Some(state.appearance),
                state.t,
                Some(state.position),
                state.orientation,
                state.fade_opacity,
                ChannelOpacity::from_fade(
                    state.fade_opacity,
                    self.heat.active,
                    self.dust.is_active(),
                ),
            ),
            None => (
                None,
                None,
                0.0,
                None,
                DQuat::IDENTITY,
                0.0,
                ChannelOpacity::hidden(),
            ),
        };

        FrameState {
            frame: self.frame,
            clock: self.clock,
            phase: self.phase(),
            launch_id,
            appearance,
            t,
            position,
            orientation,
            fade_opacity: fade,
            channels,
            heat: self.heat,
            trail: self.trail.to_vec(),
            spray: if self.spray.is_active() {
                self.spray.positions().to_vec()
            } else {
                Vec::new()
            },
            spray_size: self.spray.point_size(),
            dust: if self.dust.is_active() {
                self.dust.positions()
            } else {
                Vec::new()
            },
            crater: self.crater.clone(),
            target_rotation: self.target_rotation,
        }
    }
}

/// Uniformly distributed direction on the unit sphere.
fn random_unit_vector<R: Rng>(rng: &mut R) -> DVec3 {
    let z = rng.gen::<f64>() * 2.0 - 1.0;
    let azimuth = rng.gen::<f64>() * 2.0 * PI;
    let ring = (1.0 - z * z).max(0.0).sqrt();
    DVec3::new(ring * azimuth.cos(), ring * azimuth.sin(), z)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::LonConvention;

    fn seeded_config() -> EngineConfig {
        EngineConfig {
            seed: Some(42),
            ..EngineConfig::default()
        }
    }

    fn reference_spec() -> ImpactorSpec {
        ImpactorSpec::with_density(100.0, 3000.0, 17.0, 45.0)
    }

    fn surface_target() -> DVec3 {
        DVec3::new(1.0, 2.0, 2.0).normalize() * 8.0
    }

    #[test]
    fn test_path_endpoints_exact() {
        let start = DVec3::new(15.0, 15.0, 15.0);
        let target = DVec3::new(0.3, -7.1, 3.6888);
        for path in [PathStrategy::Eased, PathStrategy::Arc { height: 0.5 }] {
            assert_eq!(path.position(start, target, 0.0), start);
            assert_eq!(path.position(start, target, 1.0), target);
        }
    }

    #[test]
    fn test_progress_monotonic() {
        let mut previous = eased_progress(0.0);
        assert_eq!(previous, 0.0);
        for i in 1..=1000 {
            let p = eased_progress(i as f64 / 1000.0);
            assert!(p >= previous);
            previous = p;
        }
        assert_eq!(eased_progress(1.0), 1.0);
        assert_eq!(eased_progress(1.7), 1.0);
    }

    #[test]
    fn test_unit_rotation_axis() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert!((random_unit_vector(&mut rng).length() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_launch_sets_approaching() {
        let mut engine = TrajectoryEngine::new(seeded_config()).unwrap();
        assert_eq!(engine.phase(), Phase::Idle);
        let id = engine.request_launch(reference_spec(), surface_target()).unwrap();
        assert_eq!(id, 1);

        let state = engine.state().unwrap();
        assert_eq!(state.phase, Phase::Approaching);
        assert_eq!(state.t, 0.0);
        assert!((state.rotation_axis.length() - 1.0).abs() < 1e-12);
        assert_eq!(engine.trail().len(), 1);
        // 100 m hazardous body: two thirds of the way up the log scale
        assert!((state.appearance.size - 82.666_666_666_666_67).abs() < 1e-9);
        assert!(state.appearance.color.x > state.appearance.color.z);
    }

    #[test]
    fn test_busy_launch_rejected_and_t_untouched() {
        let mut engine = TrajectoryEngine::new(seeded_config()).unwrap();
        engine.request_launch(reference_spec(), surface_target()).unwrap();
        for _ in 0..10 {
            engine.advance(1.0 / 60.0);
        }
        let t_before = engine.state().unwrap().t;

        let err = engine
            .request_launch(reference_spec(), -surface_target())
            .unwrap_err();
        assert_eq!(err, EngineError::RejectedBusy);

        let state = engine.state().unwrap();
        assert_eq!(state.t, t_before);
        assert_eq!(state.launch_id, 1);
        assert_eq!(state.target_point, surface_target());
    }

    #[test]
    fn test_invalid_spec_leaves_engine_idle() {
        let mut engine = TrajectoryEngine::new(seeded_config()).unwrap();
        let bad = ImpactorSpec::with_density(100.0, 3000.0, 17.0, 120.0);
        assert!(matches!(
            engine.request_launch(bad, surface_target()),
            Err(EngineError::InvalidSpec(_))
        ));
        assert_eq!(engine.phase(), Phase::Idle);
        assert!(engine.trail().is_empty());

        // off-sphere pick
        assert!(matches!(
            engine.request_launch(reference_spec(), surface_target() * 1.5),
            Err(EngineError::InvalidSpec(_))
        ));
        // start inside the collision shell
        assert!(matches!(
            engine.launch(reference_spec(), DVec3::X * 8.1, surface_target()),
            Err(EngineError::InvalidSpec(_))
        ));
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn test_collision_iff_within_shell() {
        let mut engine = TrajectoryEngine::new(seeded_config()).unwrap();
        engine.request_launch(reference_spec(), surface_target()).unwrap();
        let shell = 8.0 + 0.3;

        let mut impacts = 0;
        for _ in 0..200 {
            let before = engine.phase();
            let event = engine.advance(1.0 / 60.0);
            if before != Phase::Approaching {
                break;
            }
            match event {
                Some(EngineEvent::Impact(_)) => {
                    impacts += 1;
                    assert!(engine.state().unwrap().t <= 1.0 + 1e-9);
                }
                None => {
                    let state = engine.state().unwrap();
                    assert!(state.position.length() >= shell);
                }
                Some(other) => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(impacts, 1);
        assert!(engine.crater().is_some());
        assert!(engine.dust().is_active());
    }

    #[test]
    fn test_fade_runs_exactly_fade_duration() {
        let config = EngineConfig {
            fade_duration: 1.0,
            ..seeded_config()
        };
        let mut engine = TrajectoryEngine::new(config).unwrap();
        engine.request_launch(reference_spec(), surface_target()).unwrap();

        let dt = 0.25;
        loop {
            if let Some(EngineEvent::Impact(_)) = engine.advance(dt) {
                break;
            }
        }
        assert_eq!(engine.phase(), Phase::Impacted);
        let start = engine.state().unwrap().fade_start_time;

        let mut previous = 1.0;
        let mut finished_at = None;
        for _ in 0..10 {
            let event = engine.advance(dt);
            let frame = engine.frame_state();
            if let Some(EngineEvent::Finished { .. }) = event {
                finished_at = Some(engine.clock());
                assert_eq!(frame.channels, ChannelOpacity::hidden());
                assert_eq!(frame.phase, Phase::Idle);
                assert!(frame.dust.is_empty() && frame.trail.is_empty());
                break;
            }
            assert_eq!(frame.phase, Phase::Fading);
            assert!(frame.fade_opacity < previous);
            assert_eq!(frame.channels.body, frame.fade_opacity);
            assert_eq!(frame.channels.trail, frame.fade_opacity);
            assert_eq!(frame.channels.dust, frame.fade_opacity);
            previous = frame.fade_opacity;
        }

        let finished_at = finished_at.expect("fade never completed");
        assert!((finished_at - start - 1.0).abs() < 1e-12);
        // crater stays until the next launch
        assert!(engine.crater().is_some());
        assert!(!engine.is_busy());
    }

    #[test]
    fn test_new_launch_after_idle_clears_crater() {
        let mut engine = TrajectoryEngine::new(seeded_config()).unwrap();
        engine.request_launch(reference_spec(), surface_target()).unwrap();
        while !matches!(engine.advance(0.5), Some(EngineEvent::Finished { .. })) {}
        assert!(engine.crater().is_some());

        let id = engine.request_launch(reference_spec(), -surface_target()).unwrap();
        assert_eq!(id, 2);
        assert!(engine.crater().is_none());
    }

    #[test]
    fn test_pick_outside_collision_shell_rejected() {
        // surface slack (0.008) wider than the impactor radius
        let config = EngineConfig {
            impactor_radius: 0.005,
            ..seeded_config()
        };
        let mut engine = TrajectoryEngine::new(config).unwrap();
        let direction = surface_target().normalize();

        assert!(matches!(
            engine.request_launch(reference_spec(), direction * 8.007),
            Err(EngineError::InvalidSpec(_))
        ));
        assert_eq!(engine.phase(), Phase::Idle);

        // inside the slack and the shell: still collides
        engine
            .request_launch(reference_spec(), direction * 8.004)
            .unwrap();
        let mut impacted = false;
        for _ in 0..200 {
            match engine.advance(1.0 / 60.0) {
                Some(EngineEvent::Impact(_)) => {
                    impacted = true;
                    break;
                }
                Some(other) => panic!("unexpected event {:?}", other),
                None => {}
            }
        }
        assert!(impacted);
    }

    #[test]
    fn test_abandoned_launch_returns_to_idle() {
        let mut engine = TrajectoryEngine::new(seeded_config()).unwrap();
        engine.request_launch(reference_spec(), surface_target()).unwrap();
        for _ in 0..10 {
            engine.advance(1.0 / 60.0);
        }

        let event = engine.finish_missed();
        assert_eq!(event, Some(EngineEvent::Missed { launch_id: 1 }));
        assert_eq!(engine.phase(), Phase::Idle);
        assert!(engine.crater().is_none());
        assert!(engine.last_impact().is_none());
        assert!(engine.trail().is_empty());
        assert!(engine.frame_state().spray.is_empty());
    }

    #[test]
    fn test_large_step_still_collides() {
        let config = EngineConfig {
            speed: 0.7,
            ..seeded_config()
        };
        let mut engine = TrajectoryEngine::new(config).unwrap();
        engine.request_launch(reference_spec(), surface_target()).unwrap();
        assert!(engine.advance(0.016).is_none());
        // t = 1.4 overshoots, position clamps to the target
        assert!(matches!(engine.advance(0.016), Some(EngineEvent::Impact(_))));
    }

    #[test]
    fn test_trail_and_heat_follow_impactor() {
        let mut engine = TrajectoryEngine::new(seeded_config()).unwrap();
        engine.request_launch(reference_spec(), surface_target()).unwrap();
        for _ in 0..60 {
            engine.advance(1.0 / 60.0);
        }
        let state = engine.state().unwrap();
        assert_eq!(engine.trail().newest(), Some(state.position));
        assert!(engine.trail().len() <= 50);

        let expected = 1.0 - state.position.length() / 16.0;
        assert!((engine.heat().factor - expected.max(0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_spray_only_while_heated() {
        let mut engine = TrajectoryEngine::new(seeded_config()).unwrap();
        engine.request_launch(reference_spec(), surface_target()).unwrap();

        let mut saw_spray = false;
        while engine.phase() == Phase::Approaching {
            engine.advance(1.0 / 60.0);
            let frame = engine.frame_state();
            if frame.heat.active {
                saw_spray = true;
                assert_eq!(frame.spray.len(), 100);
                assert!(frame.spray_size > 0.0);
                assert_eq!(frame.channels.glow, frame.fade_opacity);
            } else {
                assert!(frame.spray.is_empty());
                assert_eq!(frame.spray_size, 0.0);
            }
        }
        assert!(saw_spray);

        while engine.phase() != Phase::Idle {
            engine.advance(0.25);
        }
        let frame = engine.frame_state();
        assert!(frame.spray.is_empty());
        assert_eq!(frame.channels.glow, 0.0);
    }

    #[test]
    fn test_impact_geo_in_body_frame() {
        let config = EngineConfig {
            target_spin: 0.01,
            lon_convention: LonConvention::Signed,
            ..seeded_config()
        };
        let mut engine = TrajectoryEngine::new(config).unwrap();
        let target = geo::to_cartesian(0.0, 0.0, 8.0);
        engine.request_launch(reference_spec(), target).unwrap();

        let event = loop {
            if let Some(EngineEvent::Impact(event)) = engine.advance(1.0 / 60.0) {
                break event;
            }
        };
        let world = geo::body_to_world(event.impact_point, engine.target_rotation());
        let world_geo = geo::to_geo(world, 8.0, LonConvention::Signed).unwrap();
        let body_geo = event.geo;
        // spinning the body shifts longitude by the accumulated rotation
        let shift = geo::lon_delta(world_geo.lon, body_geo.lon);
        let expected = geo::lon_delta(engine.target_rotation().to_degrees(), 0.0);
        assert!((shift - expected).abs() < 1e-6);
        assert!((body_geo.lat - world_geo.lat).abs() < 1e-9);
    }

    #[test]
    fn test_impact_sent_to_collaborator() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut engine = TrajectoryEngine::new(seeded_config()).unwrap();
        engine.set_impact_sender(tx);
        engine.request_launch(reference_spec(), surface_target()).unwrap();
        while engine.phase() == Phase::Approaching {
            engine.advance(1.0 / 60.0);
        }
        let event = rx.try_recv().unwrap();
        assert_eq!(event.launch_id, 1);
        assert_eq!(Some(&event), engine.last_impact());
        assert!(rx.try_recv().is_err());
    }
}

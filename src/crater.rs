// Crater Projection
// Builds a surface-conforming crater patch at the impact point, oriented so
// its local +Y follows the outward surface normal.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::geo;

/// Normalized radius of the flat crater floor
const FLOOR_RADIUS: f64 = 0.6;
/// Rim height as a fraction of crater depth
const RIM_HEIGHT: f64 = 0.15;
/// Normalized radius where the ejecta rim has flattened back to the surface
const RIM_OUTER: f64 = 1.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CraterStyle {
    /// Flat marker lying on the curved surface
    #[default]
    Decal,
    /// Depressed floor, steep wall and a raised ejecta rim
    Bowl,
}

#[derive(Debug, Clone, Copy)]
pub struct CraterParams {
    pub target_radius: f64,
    /// Footprint width/height per unit of impact force
    pub scale: f64,
    pub depth_ratio: f64,
    pub segments: usize,
    /// Lift above the surface so the patch never z-fights the sphere
    pub offset: f64,
    pub style: CraterStyle,
}

impl CraterParams {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            target_radius: config.target_radius,
            scale: config.decal_scale,
            depth_ratio: config.decal_depth_ratio,
            segments: config.decal_segments,
            offset: config.decal_offset,
            style: config.crater_style,
        }
    }
}

/// Crater patch in the target body's local frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraterDecal {
    /// Impact point on the reference sphere
    pub center: DVec3,
    pub normal: DVec3,
    /// Shortest-arc rotation taking +Y onto `normal`
    pub orientation: DQuat,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub style: CraterStyle,
    pub segments: usize,
    /// (segments + 1)² grid, row-major
    pub vertices: Vec<DVec3>,
}

/// Build the crater for an impact at `point` with the given force scalar.
pub fn project_crater(point: DVec3, force: f64, params: &CraterParams) -> Result<CraterDecal> {
    let length = point.length();
    if !length.is_finite() || length < 1e-12 {
        return Err(EngineError::InvalidSpec(
            "crater point is degenerate".to_string(),
        ));
    }
    if !force.is_finite() || force <= 0.0 {
        return Err(EngineError::InvalidSpec(format!(
            "crater force must be positive, got {}",
            force
        )));
    }

    let normal = point / length;
    let center = normal * params.target_radius;
    let orientation = DQuat::from_rotation_arc(DVec3::Y, normal);

    // Keep the patch well inside one hemisphere
    let width = (force * params.scale).min(params.target_radius);
    let height = width;
    let depth = width * params.depth_ratio;
    let segments = params.segments.max(1);

    let mut vertices = Vec::with_capacity((segments + 1) * (segments + 1));
    for row in 0..=segments {
        let v = (row as f64 / segments as f64 - 0.5) * height;
        for col in 0..=segments {
            let u = (col as f64 / segments as f64 - 0.5) * width;

            let tangent = orientation * DVec3::new(u, 0.0, v);
            let direction = (center + tangent).normalize();

            let rho = ((2.0 * u / width).powi(2) + (2.0 * v / height).powi(2)).sqrt();
            let relief = match params.style {
                CraterStyle::Decal => 0.0,
                CraterStyle::Bowl => bowl_profile(rho, depth),
            };

            vertices.push(direction * (params.target_radius + params.offset + relief));
        }
    }

    Ok(CraterDecal {
        center,
        normal,
        orientation,
        width,
        height,
        depth,
        style: params.style,
        segments,
        vertices,
    })
}

/// Radial relief of a simple crater at normalized distance `rho` from its
/// center: flat floor, steep wall up to a raised rim at rho = 1, rim decaying
/// outward.
fn bowl_profile(rho: f64, depth: f64) -> f64 {
    let rim = depth * RIM_HEIGHT;
    if rho <= FLOOR_RADIUS {
        -depth
    } else if rho <= 1.0 {
        let s = (rho - FLOOR_RADIUS) / (1.0 - FLOOR_RADIUS);
        // smoothstep wall
        let s = s * s * (3.0 - 2.0 * s);
        -depth + s * (depth + rim)
    } else if rho <= RIM_OUTER {
        let s = (rho - 1.0) / (RIM_OUTER - 1.0);
        rim * (1.0 - s)
    } else {
        0.0
    }
}

impl CraterDecal {
    /// Two triangles per grid cell.
    pub fn triangle_indices(&self) -> Vec<u32> {
        let stride = (self.segments + 1) as u32;
        let mut indices = Vec::with_capacity(self.segments * self.segments * 6);
        for row in 0..self.segments as u32 {
            for col in 0..self.segments as u32 {
                let a = row * stride + col;
                let b = a + 1;
                let c = a + stride;
                let d = c + 1;
                indices.extend_from_slice(&[a, c, b, b, c, d]);
            }
        }
        indices
    }

    /// Vertices in world space for a target spun by `rotation` about +Y.
    pub fn world_vertices(&self, rotation: f64) -> Vec<DVec3> {
        self.vertices
            .iter()
            .map(|v| geo::body_to_world(*v, rotation))
            .collect()
    }

    pub fn world_center(&self, rotation: f64) -> DVec3 {
        geo::body_to_world(self.center, rotation)
    }
}

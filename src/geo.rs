// Coordinate Mapper
// Converts between points on the target sphere and geographic lat/lon.
//
// Axis convention matches the globe texture seam: +Y is the north pole,
// longitude is measured as atan2(z, -x).

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Longitude range produced by [`to_geo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LonConvention {
    /// (-180, 180]
    #[default]
    Signed,
    /// [0, 360)
    Positive,
}

/// Geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Map a point to latitude/longitude. The point need not lie exactly on the
/// sphere; it is projected radially first.
pub fn to_geo(point: DVec3, sphere_radius: f64, convention: LonConvention) -> Result<GeoPoint> {
    let length = point.length();
    if !length.is_finite() || length < 1e-12 {
        return Err(EngineError::InvalidSpec(format!(
            "cannot map degenerate point {:?} to geographic coordinates",
            point
        )));
    }
    if !sphere_radius.is_finite() || sphere_radius <= 0.0 {
        return Err(EngineError::InvalidSpec(format!(
            "sphere radius must be positive, got {}",
            sphere_radius
        )));
    }

    let on_sphere = point / length * sphere_radius;
    let cos_polar = (on_sphere.y / sphere_radius).clamp(-1.0, 1.0);

    let lat = 90.0 - cos_polar.acos().to_degrees();
    let lon = on_sphere.z.atan2(-on_sphere.x).to_degrees();

    let lon = match convention {
        LonConvention::Signed => lon,
        LonConvention::Positive => (lon + 360.0) % 360.0,
    };

    Ok(GeoPoint { lat, lon })
}

/// Inverse of [`to_geo`]; accepts longitude in either convention.
pub fn to_cartesian(lat: f64, lon: f64, radius: f64) -> DVec3 {
    let polar = (90.0 - lat).to_radians();
    let azimuth = lon.to_radians();

    let ring = radius * polar.sin();
    DVec3::new(-ring * azimuth.cos(), radius * polar.cos(), ring * azimuth.sin())
}

/// Express a world-space point in the frame of a body spun by `rotation`
/// radians about +Y.
pub fn world_to_body(point: DVec3, rotation: f64) -> DVec3 {
    glam::DQuat::from_rotation_y(-rotation) * point
}

pub fn body_to_world(point: DVec3, rotation: f64) -> DVec3 {
    glam::DQuat::from_rotation_y(rotation) * point
}

/// Smallest signed difference between two longitudes, degrees.
pub fn lon_delta(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

//! Shared geometry types.

use std::ops::Sub;

/// Earth's mean radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6_371.;

/// Point in tile-local space.
///
/// Both axes are normalized to the tile, so a vertex inside the tile lies
/// within `0..=1`. Vertices are stored as 32-bit floats on disk, which is why
/// comparisons should use [`Vertex::is_close`] rather than `==`.
#[derive(PartialEq, Copy, Clone, Default, Debug)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Check if both coordinates are within `tolerance` of another vertex.
    pub fn is_close(&self, other: Vertex, tolerance: f64) -> bool {
        let delta = *self - other;
        delta.x.abs() < tolerance && delta.y.abs() < tolerance
    }

    /// Vertex with the on-disk single precision.
    pub fn to_f32(self) -> (f32, f32) {
        (self.x as f32, self.y as f32)
    }
}

impl From<(f32, f32)> for Vertex {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x: x as f64, y: y as f64 }
    }
}

impl From<(f64, f64)> for Vertex {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl Sub<Vertex> for Vertex {
    type Output = Self;

    fn sub(mut self, other: Vertex) -> Self {
        self.x -= other.x;
        self.y -= other.y;
        self
    }
}

/// Point in geographical space.
#[derive(PartialEq, Default, Copy, Clone, Debug)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Calculate distance in kilometers between two points.
    ///
    /// This uses the haversine formula, which is inaccurate due to assuming the
    /// earth is round, but tiles are small enough for this not to matter.
    pub fn distance_km(&self, other: Self) -> f64 {
        let slat = self.lat.to_radians();
        let olat = other.lat.to_radians();
        let delta_lat = (self.lat - other.lat).to_radians();
        let delta_lon = (self.lon - other.lon).to_radians();

        let a = (delta_lat / 2.).sin().powi(2)
            + slat.cos() * olat.cos() * (delta_lon / 2.).sin().powi(2);
        let c = 2. * a.sqrt().atan2((1. - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

//! Geographic coordinate type.

use std::fmt;

/// A WGS-84 geographic coordinate.
///
/// Positions round-trip through the external simulator, so double precision
/// is kept end to end; truncating to f32 would introduce visible jitter when
/// mirrored vehicles are re-positioned every step.
#[derive(Copy, Clone, Debug, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[inline]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

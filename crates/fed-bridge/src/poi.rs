//! Point-of-interest facade: variable traffic signs.
//!
//! Signs are a visualization aid; callers treat failures as non-fatal and
//! log them instead of propagating.

use fed_core::GeoPoint;

use crate::error::BridgeResult;

/// Commands managing variable traffic signs rendered in the simulator GUI.
pub trait PoiControl {
    fn add_speed_sign(&mut self, sign_id: &str, position: GeoPoint, speed: f64)
        -> BridgeResult<()>;

    fn add_lane_assignment_sign(
        &mut self,
        sign_id: &str,
        position: GeoPoint,
        lanes: &[u32],
    ) -> BridgeResult<()>;

    fn set_variable_speed(&mut self, sign_id: &str, speed: f64) -> BridgeResult<()>;

    fn set_variable_lane_assignment(&mut self, sign_id: &str, lanes: &[u32]) -> BridgeResult<()>;
}

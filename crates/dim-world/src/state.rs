//! The collaborator contract consumed by the negotiation core.

use dim_core::{EdgeId, LaneId, Point, VehicleId};

use crate::WorldResult;

/// Everything the core reads from, and asks of, the traffic world.
///
/// Vehicle queries return `None` once the vehicle has left; callers keep their
/// last known values.  Actuation calls on departed vehicles return
/// [`WorldError::Departed`][crate::WorldError::Departed], which the core
/// treats as a no-op.
pub trait WorldState {
    // ── Per-vehicle queries ───────────────────────────────────────────────

    fn position(&self, vehicle: &VehicleId) -> Option<Point>;
    /// Current speed in m/s.
    fn speed(&self, vehicle: &VehicleId) -> Option<f64>;
    /// Maximum deceleration in m/s².
    fn max_deceleration(&self, vehicle: &VehicleId) -> Option<f64>;
    /// Metres travelled along the current lane.
    fn lane_position(&self, vehicle: &VehicleId) -> Option<f64>;

    // ── Actuation ─────────────────────────────────────────────────────────

    /// Ask the vehicle to stop at `position` metres along `edge` and hold.
    fn request_stop(&mut self, vehicle: &VehicleId, edge: &EdgeId, position: f64) -> WorldResult<()>;

    /// Replace the stop at `position` with one lasting `duration` seconds.
    /// A zero duration releases the vehicle.
    fn request_stop_duration(
        &mut self,
        vehicle:  &VehicleId,
        edge:     &EdgeId,
        position: f64,
        duration: f64,
    ) -> WorldResult<()>;

    /// Release a held vehicle.
    fn resume(&mut self, vehicle: &VehicleId) -> WorldResult<()>;

    // ── Topology and membership ───────────────────────────────────────────

    fn lane_ids(&self) -> Vec<LaneId>;
    fn lane_length(&self, lane: &LaneId) -> Option<f64>;
    fn lane_geometry(&self, lane: &LaneId) -> Option<Vec<Point>>;
    fn lane_edge_id(&self, lane: &LaneId) -> Option<EdgeId>;
    /// Vehicles currently on `lane`, in any order.
    fn lane_member_ids(&self, lane: &LaneId) -> Vec<VehicleId>;

    /// Exit lane reached by crossing the intersection at the end of `lane`.
    fn lane_successor(&self, _lane: &LaneId) -> Option<LaneId> {
        None
    }

    // ── Driving ───────────────────────────────────────────────────────────

    /// Advance the world by `dt_secs`.  Worlds stepped by an outside driver
    /// leave this as a no-op.
    fn advance(&mut self, _dt_secs: f64) {}
}

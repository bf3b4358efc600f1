//! In-memory reference world.
//!
//! Lanes are polylines; vehicles are points moving along them with a simple
//! accelerate / brake-to-limit rule:
//!
//! ```text
//! limit  = min(position of vehicle ahead − min_gap, held stop position)
//! target = min(max_speed, sqrt(2 · max_decel · (limit − position)))
//! speed  → target, changing by at most accel·dt up or max_decel·dt down
//! ```
//!
//! A vehicle that runs past its lane end moves onto the lane's successor, or
//! leaves the world when there is none.  Every actuation call is appended to
//! an [`Actuation`] log for assertions.

use std::collections::BTreeMap;

use tracing::debug;

use dim_core::geo::{point_along, polyline_length};
use dim_core::{EdgeId, LaneId, Point, VehicleId};

use crate::{WorldError, WorldResult, WorldState};

// ── Specs ─────────────────────────────────────────────────────────────────────

/// Static description of one lane.
#[derive(Clone, Debug)]
pub struct LaneSpec {
    pub id:        LaneId,
    pub edge:      EdgeId,
    /// Ordered from lane start to lane end (the intersection side).
    pub shape:     Vec<Point>,
    pub successor: Option<LaneId>,
}

impl LaneSpec {
    pub fn new(id: impl Into<LaneId>, edge: impl Into<EdgeId>, shape: Vec<Point>) -> Self {
        Self { id: id.into(), edge: edge.into(), shape, successor: None }
    }

    pub fn with_successor(mut self, lane: impl Into<LaneId>) -> Self {
        self.successor = Some(lane.into());
        self
    }
}

/// Initial state and capabilities of one vehicle.
#[derive(Clone, Debug)]
pub struct VehicleSpec {
    pub id:               VehicleId,
    pub lane:             LaneId,
    pub lane_position:    f64,
    pub speed:            f64,
    pub max_speed:        f64,
    pub acceleration:     f64,
    pub max_deceleration: f64,
}

impl VehicleSpec {
    /// A passenger car at rest, with common car-following defaults.
    pub fn new(id: impl Into<VehicleId>, lane: impl Into<LaneId>, lane_position: f64) -> Self {
        Self {
            id: id.into(),
            lane: lane.into(),
            lane_position,
            speed:            0.0,
            max_speed:        13.9,
            acceleration:     2.6,
            max_deceleration: 4.5,
        }
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn max_speed(mut self, max_speed: f64) -> Self {
        self.max_speed = max_speed;
        self
    }

    pub fn max_deceleration(mut self, max_deceleration: f64) -> Self {
        self.max_deceleration = max_deceleration;
        self
    }
}

/// One recorded actuation call.
#[derive(Clone, Debug, PartialEq)]
pub enum Actuation {
    Stop { vehicle: VehicleId, edge: EdgeId, position: f64 },
    StopDuration { vehicle: VehicleId, edge: EdgeId, position: f64, duration: f64 },
    Resume { vehicle: VehicleId },
}

impl Actuation {
    pub fn vehicle(&self) -> &VehicleId {
        match self {
            Actuation::Stop { vehicle, .. }
            | Actuation::StopDuration { vehicle, .. }
            | Actuation::Resume { vehicle } => vehicle,
        }
    }
}

// ── Internal state ────────────────────────────────────────────────────────────

struct Lane {
    spec:   LaneSpec,
    length: f64,
}

#[derive(Clone, Debug)]
struct Hold {
    edge:      EdgeId,
    position:  f64,
    /// `None` holds until resumed.
    remaining: Option<f64>,
}

struct Vehicle {
    spec: VehicleSpec,
    hold: Option<Hold>,
}

// ── MemoryWorld ───────────────────────────────────────────────────────────────

pub struct MemoryWorld {
    lanes:      Vec<Lane>,
    vehicles:   BTreeMap<VehicleId, Vehicle>,
    actuations: Vec<Actuation>,
    time_secs:  f64,
    min_gap:    f64,
}

impl Default for MemoryWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self {
            lanes:      Vec::new(),
            vehicles:   BTreeMap::new(),
            actuations: Vec::new(),
            time_secs:  0.0,
            min_gap:    2.5,
        }
    }

    /// Bumper-to-bumper gap kept behind the vehicle ahead.
    pub fn with_min_gap(mut self, min_gap: f64) -> Self {
        self.min_gap = min_gap;
        self
    }

    pub fn add_lane(&mut self, spec: LaneSpec) {
        let length = polyline_length(&spec.shape);
        self.lanes.push(Lane { spec, length });
    }

    pub fn add_vehicle(&mut self, spec: VehicleSpec) -> WorldResult<()> {
        if self.lane(&spec.lane).is_none() {
            return Err(WorldError::UnknownLane(spec.lane));
        }
        if self.vehicles.contains_key(&spec.id) {
            return Err(WorldError::DuplicateVehicle(spec.id));
        }
        self.vehicles.insert(spec.id.clone(), Vehicle { spec, hold: None });
        Ok(())
    }

    pub fn remove_vehicle(&mut self, vehicle: &VehicleId) -> bool {
        self.vehicles.remove(vehicle).is_some()
    }

    pub fn set_speed(&mut self, vehicle: &VehicleId, speed: f64) -> WorldResult<()> {
        self.vehicle_mut(vehicle)?.spec.speed = speed;
        Ok(())
    }

    pub fn set_lane_position(&mut self, vehicle: &VehicleId, lane_position: f64) -> WorldResult<()> {
        self.vehicle_mut(vehicle)?.spec.lane_position = lane_position;
        Ok(())
    }

    pub fn actuations(&self) -> &[Actuation] {
        &self.actuations
    }

    pub fn clear_actuations(&mut self) {
        self.actuations.clear();
    }

    /// `true` while the vehicle has an active stop order.
    pub fn is_held(&self, vehicle: &VehicleId) -> bool {
        self.vehicles.get(vehicle).is_some_and(|v| v.hold.is_some())
    }

    pub fn vehicle_lane(&self, vehicle: &VehicleId) -> Option<&LaneId> {
        self.vehicles.get(vehicle).map(|v| &v.spec.lane)
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn time_secs(&self) -> f64 {
        self.time_secs
    }

    fn lane(&self, id: &LaneId) -> Option<&Lane> {
        self.lanes.iter().find(|l| &l.spec.id == id)
    }

    fn vehicle_mut(&mut self, vehicle: &VehicleId) -> WorldResult<&mut Vehicle> {
        self.vehicles
            .get_mut(vehicle)
            .ok_or_else(|| WorldError::Departed(vehicle.clone()))
    }

    /// Move every vehicle on one lane, front to back.
    fn advance_lane(&mut self, lane: usize, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let lane_id = self.lanes[lane].spec.id.clone();
        let edge = self.lanes[lane].spec.edge.clone();

        let mut members: Vec<(f64, VehicleId)> = self
            .vehicles
            .iter()
            .filter(|(_, v)| v.spec.lane == lane_id)
            .map(|(id, v)| (v.spec.lane_position, id.clone()))
            .collect();
        members.sort_by(|a, b| b.0.total_cmp(&a.0));

        let min_gap = self.min_gap;
        let mut ahead: Option<f64> = None;
        for (_, id) in members {
            let Some(v) = self.vehicles.get_mut(&id) else { continue };
            let mut limit = ahead.map_or(f64::INFINITY, |front| front - min_gap);
            // A stop line already behind the vehicle cannot be honoured.
            let position = v.spec.lane_position;
            if let Some(hold) = v.hold.as_ref().filter(|h| h.edge == edge && h.position >= position) {
                limit = limit.min(hold.position);
            }

            let s = &mut v.spec;
            let room = (limit - s.lane_position).max(0.0);
            let target = s.max_speed.min((2.0 * s.max_deceleration * room).sqrt());
            let speed = if target >= s.speed {
                (s.speed + s.acceleration * dt).min(target)
            } else {
                (s.speed - s.max_deceleration * dt).max(target).max(0.0)
            };
            let moved = (speed * dt).min(room);
            if room - moved <= 1e-6 {
                s.lane_position += room;
                s.speed = 0.0;
            } else {
                s.lane_position += moved;
                s.speed = moved / dt;
            }

            if let Some(hold) = v.hold.as_mut() {
                if s.speed == 0.0 && s.lane_position >= hold.position - min_gap {
                    if let Some(rem) = hold.remaining.as_mut() {
                        *rem -= dt;
                    }
                }
                if hold.remaining.is_some_and(|r| r <= 0.0) {
                    v.hold = None;
                }
            }
            ahead = Some(v.spec.lane_position);
        }
    }

    /// Hand vehicles that passed their lane end to the successor lane.
    fn hand_over(&mut self) {
        let mut departed = Vec::new();
        for (id, v) in self.vehicles.iter_mut() {
            let Some(lane) = self.lanes.iter().find(|l| l.spec.id == v.spec.lane) else {
                continue;
            };
            if v.spec.lane_position < lane.length {
                continue;
            }
            match &lane.spec.successor {
                Some(next) => {
                    v.spec.lane_position -= lane.length;
                    v.spec.lane = next.clone();
                    v.hold = None;
                }
                None => departed.push(id.clone()),
            }
        }
        for id in departed {
            debug!(vehicle = %id, "vehicle left the world");
            self.vehicles.remove(&id);
        }
    }
}

impl WorldState for MemoryWorld {
    fn position(&self, vehicle: &VehicleId) -> Option<Point> {
        let v = self.vehicles.get(vehicle)?;
        let lane = self.lane(&v.spec.lane)?;
        point_along(&lane.spec.shape, v.spec.lane_position)
    }

    fn speed(&self, vehicle: &VehicleId) -> Option<f64> {
        self.vehicles.get(vehicle).map(|v| v.spec.speed)
    }

    fn max_deceleration(&self, vehicle: &VehicleId) -> Option<f64> {
        self.vehicles.get(vehicle).map(|v| v.spec.max_deceleration)
    }

    fn lane_position(&self, vehicle: &VehicleId) -> Option<f64> {
        self.vehicles.get(vehicle).map(|v| v.spec.lane_position)
    }

    fn request_stop(&mut self, vehicle: &VehicleId, edge: &EdgeId, position: f64) -> WorldResult<()> {
        self.vehicle_mut(vehicle)?.hold = Some(Hold { edge: edge.clone(), position, remaining: None });
        self.actuations.push(Actuation::Stop {
            vehicle: vehicle.clone(),
            edge: edge.clone(),
            position,
        });
        Ok(())
    }

    fn request_stop_duration(
        &mut self,
        vehicle:  &VehicleId,
        edge:     &EdgeId,
        position: f64,
        duration: f64,
    ) -> WorldResult<()> {
        let v = self.vehicle_mut(vehicle)?;
        v.hold = (duration > 0.0).then(|| Hold {
            edge: edge.clone(),
            position,
            remaining: Some(duration),
        });
        self.actuations.push(Actuation::StopDuration {
            vehicle: vehicle.clone(),
            edge: edge.clone(),
            position,
            duration,
        });
        Ok(())
    }

    fn resume(&mut self, vehicle: &VehicleId) -> WorldResult<()> {
        self.vehicle_mut(vehicle)?.hold = None;
        self.actuations.push(Actuation::Resume { vehicle: vehicle.clone() });
        Ok(())
    }

    fn lane_ids(&self) -> Vec<LaneId> {
        self.lanes.iter().map(|l| l.spec.id.clone()).collect()
    }

    fn lane_length(&self, lane: &LaneId) -> Option<f64> {
        self.lane(lane).map(|l| l.length)
    }

    fn lane_geometry(&self, lane: &LaneId) -> Option<Vec<Point>> {
        self.lane(lane).map(|l| l.spec.shape.clone())
    }

    fn lane_edge_id(&self, lane: &LaneId) -> Option<EdgeId> {
        self.lane(lane).map(|l| l.spec.edge.clone())
    }

    fn lane_member_ids(&self, lane: &LaneId) -> Vec<VehicleId> {
        self.vehicles
            .iter()
            .filter(|(_, v)| &v.spec.lane == lane)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn lane_successor(&self, lane: &LaneId) -> Option<LaneId> {
        self.lane(lane).and_then(|l| l.spec.successor.clone())
    }

    fn advance(&mut self, dt_secs: f64) {
        for lane in 0..self.lanes.len() {
            self.advance_lane(lane, dt_secs);
        }
        self.hand_over();
        self.time_secs += dt_secs;
    }
}

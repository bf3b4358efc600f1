//! One lane's agent queue.
//!
//! The queue is ordered by lane entry: index 0 is the leader (nearest the
//! intersection), the last entry is the tail.  Vehicles that appear in the
//! same tick are appended front-most first, so queue order follows physical
//! order on the lane.

use rustc_hash::FxHashSet;
use tracing::debug;

use dim_agent::{AgentRegistry, BehaviorProfile, StopSite};
use dim_core::{AgentKey, EdgeId, LaneId, LaneIdx, Point, SimTime, Tick, VehicleId};
use dim_core::geo::nearest_index;
use dim_world::WorldState;

/// Agents that entered or left a lane during one membership sync.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MembershipDelta {
    pub entered:  Vec<AgentKey>,
    /// Handles of removed agents, with the vehicle each one represented.
    pub departed: Vec<(AgentKey, VehicleId)>,
}

impl MembershipDelta {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.departed.is_empty()
    }
}

pub struct LaneChannel {
    pub idx:      LaneIdx,
    pub id:       LaneId,
    pub edge:     EdgeId,
    pub length:   f64,
    pub geometry: Vec<Point>,

    /// `adjacent[i]`: other lanes with a geometry point close to `geometry[i]`.
    pub adjacent:  Vec<Vec<LaneIdx>>,
    /// Exit lane across the intersection, if it has a channel.
    pub successor: Option<LaneIdx>,

    /// Trailing agent of the last convoy this lane completed.  May be stale.
    pub last_convoy_boundary: Option<AgentKey>,

    queue:        Vec<AgentKey>,
    refreshed_at: Option<Tick>,
}

impl LaneChannel {
    pub fn new(idx: LaneIdx, id: LaneId, edge: EdgeId, length: f64, geometry: Vec<Point>) -> Self {
        let points = geometry.len();
        Self {
            idx,
            id,
            edge,
            length,
            geometry,
            adjacent: vec![Vec::new(); points],
            successor: None,
            last_convoy_boundary: None,
            queue: Vec::new(),
            refreshed_at: None,
        }
    }

    // ── Queue ─────────────────────────────────────────────────────────────

    #[inline]
    pub fn queue(&self) -> &[AgentKey] {
        &self.queue
    }

    #[inline]
    pub fn leader(&self) -> Option<AgentKey> {
        self.queue.first().copied()
    }

    /// Most recently entered agent.
    #[inline]
    pub fn tail(&self) -> Option<AgentKey> {
        self.queue.last().copied()
    }

    pub fn position_of(&self, key: AgentKey) -> Option<usize> {
        self.queue.iter().position(|k| *k == key)
    }

    #[inline]
    pub fn contains(&self, key: AgentKey) -> bool {
        self.position_of(key).is_some()
    }

    /// The agent queued directly behind `key`.
    pub fn next_upstream(&self, key: AgentKey) -> Option<AgentKey> {
        let at = self.position_of(key)?;
        self.queue.get(at + 1).copied()
    }

    /// Queued agents other than `exclude` within `radius` of `origin`, in
    /// queue order.
    pub fn members_within(
        &self,
        agents:  &AgentRegistry,
        origin:  Point,
        radius:  f64,
        exclude: AgentKey,
    ) -> Vec<AgentKey> {
        self.queue
            .iter()
            .copied()
            .filter(|k| *k != exclude)
            .filter(|k| agents.get(*k).is_some_and(|a| a.position.distance(origin) <= radius))
            .collect()
    }

    // ── Geometry ──────────────────────────────────────────────────────────

    pub fn nearest_point_index(&self, p: Point) -> Option<usize> {
        nearest_index(&self.geometry, p)
    }

    pub fn adjacent_at(&self, point: usize) -> &[LaneIdx] {
        self.adjacent.get(point).map_or(&[], Vec::as_slice)
    }

    /// Lanes adjacent to the geometry point nearest `p`.
    pub fn adjacent_near(&self, p: Point) -> &[LaneIdx] {
        self.nearest_point_index(p).map_or(&[], |i| self.adjacent_at(i))
    }

    #[inline]
    pub fn stop_site(&self) -> StopSite<'_> {
        StopSite { edge: &self.edge, lane_length: self.length }
    }

    // ── Per-tick maintenance ──────────────────────────────────────────────

    /// Bring the queue in line with the world's member list.
    ///
    /// Agents whose vehicle is no longer on this lane are removed from the
    /// queue and destroyed.  New vehicles get an agent each, appended
    /// front-most first, and are refreshed at `now`.
    pub fn sync_membership<W: WorldState + ?Sized>(
        &mut self,
        world:  &W,
        agents: &mut AgentRegistry,
        now:    SimTime,
    ) -> MembershipDelta {
        let members: FxHashSet<VehicleId> = world.lane_member_ids(&self.id).into_iter().collect();
        let mut delta = MembershipDelta::default();

        let mut known: FxHashSet<VehicleId> = FxHashSet::default();
        self.queue.retain(|&key| match agents.get(key) {
            Some(agent) if members.contains(&agent.id) => {
                known.insert(agent.id.clone());
                true
            }
            Some(agent) => {
                delta.departed.push((key, agent.id.clone()));
                false
            }
            None => false,
        });
        for (key, vehicle) in &delta.departed {
            debug!(lane = %self.id, %vehicle, "agent left lane");
            agents.remove(*key);
        }

        let mut arrivals: Vec<(f64, VehicleId)> = members
            .into_iter()
            .filter(|v| !known.contains(v))
            .map(|v| (world.lane_position(&v).unwrap_or(0.0), v))
            .collect();
        arrivals.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        for (_, vehicle) in arrivals {
            let profile = BehaviorProfile::from_vehicle_id(vehicle.as_str());
            debug!(lane = %self.id, %vehicle, %profile, "agent entered lane");
            let key = agents.spawn(vehicle, profile, self.idx, self.length);
            if let Some(agent) = agents.get_mut(key) {
                agent.refresh(world, self.length, now);
            }
            self.queue.push(key);
            delta.entered.push(key);
        }
        delta
    }

    /// Refresh every queued agent from the world, at most once per tick.
    pub fn refresh_members<W: WorldState + ?Sized>(
        &mut self,
        world:  &W,
        agents: &mut AgentRegistry,
        now:    SimTime,
    ) {
        if self.refreshed_at.is_some_and(|t| t >= now.tick) {
            return;
        }
        for &key in &self.queue {
            if let Some(agent) = agents.get_mut(key) {
                agent.refresh(world, self.length, now);
            }
        }
        self.refreshed_at = Some(now.tick);
    }

    /// `true` when no earlier convoy boundary is still queued on this lane.
    /// A boundary that has left (or whose handle no longer resolves) is
    /// dropped.
    pub fn boundary_cleared(&mut self, agents: &AgentRegistry) -> bool {
        let Some(boundary) = self.last_convoy_boundary else {
            return true;
        };
        let present = agents.get(boundary).is_some_and(|a| a.lane == self.idx) && self.contains(boundary);
        if !present {
            self.last_convoy_boundary = None;
        }
        !present
    }
}

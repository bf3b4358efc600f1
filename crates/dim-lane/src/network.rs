//! Lane discovery and static topology.
//!
//! # Adjacency
//!
//! Every geometry point of every channel goes into an R-tree.  For each point
//! `p` of lane `L`, `adjacent[p]` is the sorted set of *other* lanes owning a
//! point strictly closer than `adjacency_distance`.  Opposite-leader requests
//! are routed through this table, so the lanes meeting at an intersection
//! find each other without any explicit junction model.
//!
//! Lanes no longer than `min_lane_length` are intersection internals and get
//! no channel.

use std::collections::BTreeSet;

use rstar::{AABB, PointDistance, RTree, RTreeObject};
use rustc_hash::FxHashMap;
use tracing::debug;

use dim_core::{LaneId, LaneIdx, ProtocolConfig};
use dim_world::WorldState;

use crate::{LaneChannel, LaneError, LaneResult};

// ── R-tree point entry ────────────────────────────────────────────────────────

struct LanePoint {
    point: [f64; 2],
    lane:  LaneIdx,
}

impl RTreeObject for LanePoint {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for LanePoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ── LaneNetwork ───────────────────────────────────────────────────────────────

/// All lane channels, in the fixed order they are stepped every tick.
pub struct LaneNetwork {
    lanes: Vec<LaneChannel>,
    by_id: FxHashMap<LaneId, LaneIdx>,
}

impl LaneNetwork {
    /// Build channels for every eligible lane the world reports, then link
    /// successors and adjacency.  Lanes are ordered by id.
    pub fn from_world<W: WorldState + ?Sized>(world: &W, config: &ProtocolConfig) -> LaneResult<Self> {
        let mut ids = world.lane_ids();
        ids.sort();
        ids.dedup();

        let mut lanes = Vec::new();
        for id in ids {
            let length = world
                .lane_length(&id)
                .ok_or_else(|| LaneError::UnknownLane(id.clone()))?;
            if length <= config.min_lane_length {
                debug!(lane = %id, length, "skipping intersection-internal lane");
                continue;
            }
            let geometry = match world.lane_geometry(&id) {
                Some(g) if g.len() >= 2 => g,
                _ => return Err(LaneError::MissingGeometry(id)),
            };
            let Some(edge) = world.lane_edge_id(&id) else {
                return Err(LaneError::MissingEdge(id));
            };
            let idx = LaneIdx::try_from(lanes.len()).map_err(|_| LaneError::TooManyLanes(id.clone()))?;
            lanes.push(LaneChannel::new(idx, id, edge, length, geometry));
        }

        let by_id: FxHashMap<LaneId, LaneIdx> =
            lanes.iter().map(|l| (l.id.clone(), l.idx)).collect();

        for lane in &mut lanes {
            lane.successor = world
                .lane_successor(&lane.id)
                .and_then(|next| by_id.get(&next).copied());
        }

        build_adjacency(&mut lanes, config.adjacency_distance);
        debug!(lanes = lanes.len(), "lane network built");
        Ok(Self { lanes, by_id })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: LaneIdx) -> Option<&LaneChannel> {
        self.lanes.get(idx.index())
    }

    #[inline]
    pub fn get_mut(&mut self, idx: LaneIdx) -> Option<&mut LaneChannel> {
        self.lanes.get_mut(idx.index())
    }

    pub fn index_of(&self, id: &LaneId) -> Option<LaneIdx> {
        self.by_id.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LaneChannel> {
        self.lanes.iter()
    }

    /// Lane indices in stepping order.
    pub fn indices(&self) -> impl Iterator<Item = LaneIdx> + '_ {
        self.lanes.iter().map(|l| l.idx)
    }
}

fn build_adjacency(lanes: &mut [LaneChannel], threshold: f64) {
    let entries: Vec<LanePoint> = lanes
        .iter()
        .flat_map(|l| l.geometry.iter().map(move |p| LanePoint { point: p.to_array(), lane: l.idx }))
        .collect();
    let tree = RTree::bulk_load(entries);
    let threshold_2 = threshold * threshold;

    for lane in lanes.iter_mut() {
        let own = lane.idx;
        lane.adjacent = lane
            .geometry
            .iter()
            .map(|p| {
                let q = p.to_array();
                tree.locate_within_distance(q, threshold_2)
                    .filter(|e| e.lane != own && e.distance_2(&q) < threshold_2)
                    .map(|e| e.lane)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .collect();
    }
}

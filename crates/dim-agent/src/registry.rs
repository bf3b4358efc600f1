//! Agent storage.
//!
//! Agents are created when a vehicle enters a lane channel and destroyed when
//! it leaves.  Everything that points at an agent from elsewhere (queues,
//! convoy boundaries, decision pairs, message senders) holds an [`AgentKey`];
//! the slot map's generation counter makes a key to a destroyed agent resolve
//! to `None` even after its slot is reused.

use slotmap::SlotMap;

use dim_core::{AgentKey, LaneIdx, VehicleId};

use crate::{Agent, AgentView, BehaviorProfile};

#[derive(Default)]
pub struct AgentRegistry {
    agents: SlotMap<AgentKey, Agent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an agent and return its handle.
    pub fn spawn(
        &mut self,
        id:          VehicleId,
        profile:     BehaviorProfile,
        lane:        LaneIdx,
        lane_length: f64,
    ) -> AgentKey {
        self.agents
            .insert_with_key(|key| Agent::new(key, id, profile, lane, lane_length))
    }

    #[inline]
    pub fn get(&self, key: AgentKey) -> Option<&Agent> {
        self.agents.get(key)
    }

    #[inline]
    pub fn get_mut(&mut self, key: AgentKey) -> Option<&mut Agent> {
        self.agents.get_mut(key)
    }

    pub fn remove(&mut self, key: AgentKey) -> Option<Agent> {
        self.agents.remove(key)
    }

    #[inline]
    pub fn contains(&self, key: AgentKey) -> bool {
        self.agents.contains_key(key)
    }

    /// Read-only summary of an agent as a peer sees it.
    pub fn view(&self, key: AgentKey) -> Option<AgentView> {
        self.agents.get(key).map(AgentView::of)
    }

    /// Handle of the agent currently representing `vehicle`, if any.
    pub fn find_by_vehicle(&self, vehicle: &VehicleId) -> Option<AgentKey> {
        self.agents
            .iter()
            .find(|(_, a)| &a.id == vehicle)
            .map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentKey, &Agent)> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

//! Moving messages between agents.
//!
//! Three routes exist:
//!
//! - **own lane**: to every queued agent within `upstream_radius` of the
//!   sender (follower count, emergency poll);
//! - **opposite leaders**: to the leader of every lane adjacent to the
//!   sender's nearest lane point, if that leader is close enough to its own
//!   stop line and within range (`leader_radius` on the radio,
//!   `perception_radius` by perception);
//! - **relay**: one hop upstream of a leader that refused `PriorityRequired`.
//!
//! Every delivery runs the receiver's handler synchronously; a state change it
//! causes is recorded as a transition.

use tracing::trace;

use dim_agent::{AgentView, Delivery, Handled};
use dim_core::{AgentKey, LaneIdx};
use dim_protocol::{Body, LeaderReport, Message};
use dim_world::WorldState;

use crate::negotiation::Negotiator;

/// The opposite leader a leader negotiates with this tick.
pub(crate) struct Contact {
    pub(crate) lane:     LaneIdx,
    pub(crate) peer:     AgentView,
    pub(crate) report:   LeaderReport,
    pub(crate) delivery: Delivery,
}

pub(crate) struct LeaderReply {
    pub(crate) lane:    LaneIdx,
    pub(crate) leader:  AgentKey,
    pub(crate) handled: Handled,
}

impl<W: WorldState + ?Sized> Negotiator<'_, W> {
    pub(crate) fn refresh_lane(&mut self, lane: LaneIdx) {
        if let Some(channel) = self.lanes.get_mut(lane) {
            channel.refresh_members(&*self.world, self.agents, self.now);
        }
    }

    /// Hand `message` to `target`, queued on `lane`.
    pub(crate) fn deliver(
        &mut self,
        lane:     LaneIdx,
        target:   AgentKey,
        message:  &Message,
        delivery: Delivery,
    ) -> Handled {
        let Some(channel) = self.lanes.get(lane) else {
            return Handled::default();
        };
        let site = channel.stop_site();
        let Some(agent) = self.agents.get_mut(target) else {
            return Handled::default();
        };
        let before = agent.state;
        let handled = agent.handle(message, delivery, &mut *self.world, site, self.config, self.now);
        self.note_transition(target, before);
        handled
    }

    /// Send `message` to the sender's own lane within `upstream_radius` and
    /// collect the replies in queue order.
    pub(crate) fn send_in_radius(&mut self, lane: LaneIdx, sender: AgentKey, message: &Message) -> Vec<Message> {
        self.refresh_lane(lane);
        let Some(origin) = self.agents.get(sender).map(|a| a.position) else {
            return Vec::new();
        };
        let Some(channel) = self.lanes.get(lane) else {
            return Vec::new();
        };
        let targets = channel.members_within(self.agents, origin, self.config.upstream_radius, sender);
        targets
            .into_iter()
            .filter_map(|target| self.deliver(lane, target, message, Delivery::Radio).reply)
            .collect()
    }

    /// Opposite leaders reachable from `sender` over `delivery`.
    fn opposite_leaders(&mut self, lane: LaneIdx, sender: AgentKey, delivery: Delivery) -> Vec<(LaneIdx, AgentKey)> {
        let Some(origin) = self.agents.get(sender).map(|a| a.position) else {
            return Vec::new();
        };
        let (radius, horizon) = match delivery {
            Delivery::Radio => (self.config.leader_radius, self.config.negotiation_distance),
            Delivery::Perception => (self.config.perception_radius, self.config.perception_distance),
        };
        let candidates: Vec<LaneIdx> = match self.lanes.get(lane) {
            Some(channel) => channel.adjacent_near(origin).to_vec(),
            None => return Vec::new(),
        };

        let mut leaders = Vec::new();
        for peer_lane in candidates {
            let Some(leader) = self.lanes.get(peer_lane).and_then(|c| c.leader()) else {
                continue;
            };
            self.refresh_lane(peer_lane);
            let Some(peer) = self.agents.get(leader) else { continue };
            if peer.distance_to_intersection < horizon && peer.position.distance(origin) <= radius {
                leaders.push((peer_lane, leader));
            }
        }
        leaders
    }

    pub(crate) fn send_to_opposite_leaders(
        &mut self,
        lane:     LaneIdx,
        sender:   AgentKey,
        message:  &Message,
        delivery: Delivery,
    ) -> Vec<LeaderReply> {
        self.opposite_leaders(lane, sender, delivery)
            .into_iter()
            .map(|(peer_lane, leader)| LeaderReply {
                lane: peer_lane,
                leader,
                handled: self.deliver(peer_lane, leader, message, delivery),
            })
            .collect()
    }

    /// First opposite leader to answer: radio first, then perception.
    pub(crate) fn find_opposite_leader(&mut self, lane: LaneIdx, me: AgentKey) -> Option<Contact> {
        let agent = self.agents.get(me)?;
        let request = Message::new(
            me,
            Body::RequestOppositeLeader {
                sender_distance:  agent.distance_to_intersection,
                sender_wait_time: agent.yield_time(self.now),
            },
        );
        let routes: &[Delivery] = if agent.can_transmit() {
            &[Delivery::Radio, Delivery::Perception]
        } else {
            &[Delivery::Perception]
        };

        for &delivery in routes {
            for reply in self.send_to_opposite_leaders(lane, me, &request, delivery) {
                let Some(Message { body: Body::ResponseOppositeLeader(report), .. }) = reply.handled.reply else {
                    continue;
                };
                let Some(peer) = self.agents.view(reply.leader) else { continue };
                return Some(Contact { lane: reply.lane, peer, report, delivery });
            }
        }
        None
    }

    /// Forward a refused request to the agent queued behind `from`, if it is
    /// within `upstream_radius`.  Single hop; the reply is dropped.
    pub(crate) fn relay_upstream(&mut self, lane: LaneIdx, from: AgentKey, message: &Message) {
        let Some(next) = self.lanes.get(lane).and_then(|c| c.next_upstream(from)) else {
            return;
        };
        let (Some(relay), Some(target)) = (self.agents.get(from), self.agents.get(next)) else {
            return;
        };
        if relay.position.distance(target.position) > self.config.upstream_radius {
            return;
        }
        trace!(from = %relay.id, to = %target.id, kind = message.body.kind(), "relaying upstream");
        self.deliver(lane, next, message, Delivery::Radio);
    }
}

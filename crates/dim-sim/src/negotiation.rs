//! One leader's negotiation step.
//!
//! [`Negotiator`] borrows the parts of a [`Sim`][crate::Sim] a leader step
//! touches, so message delivery can reach any agent on any lane while the
//! world is mutated in place.  Order of a step:
//!
//! 1. a Waiting hold that has not expired ends the step; an expired one is
//!    released and the step carries on from Auto;
//! 2. a leader outside `negotiation_distance` resumes and stops;
//! 3. exit backpressure (non-Flaw only);
//! 4. opposite-leader lookup, radio first, then perception; no peer resumes;
//! 5. flaw escalation against a perceived Flaw peer, otherwise the lane's
//!    flaw timers are reset;
//! 6. the handler for the current state.

use tracing::{debug, warn};

use dim_agent::{
    AgentRegistry, AgentState, ConvoyOutcome, DecisionBook, Delivery, YieldVerdict, resolve_priority,
    tally_convoy,
};
use dim_core::{AgentKey, LaneIdx, ProtocolConfig, SimRng, SimTime};
use dim_lane::LaneNetwork;
use dim_protocol::{Body, Message};
use dim_world::WorldState;

use crate::NegotiationEvent;
use crate::routing::Contact;

pub(crate) struct Negotiator<'a, W: WorldState + ?Sized> {
    pub(crate) config:    &'a ProtocolConfig,
    pub(crate) now:       SimTime,
    pub(crate) agents:    &'a mut AgentRegistry,
    pub(crate) lanes:     &'a mut LaneNetwork,
    pub(crate) world:     &'a mut W,
    pub(crate) decisions: &'a mut DecisionBook,
    pub(crate) rng:       &'a mut SimRng,
    pub(crate) events:    &'a mut Vec<NegotiationEvent>,
}

impl<W: WorldState + ?Sized> Negotiator<'_, W> {
    /// Run one step for `me`, the leader of `lane`.
    pub(crate) fn step_leader(&mut self, lane: LaneIdx, me: AgentKey) {
        self.refresh_lane(lane);
        let Some(agent) = self.agents.get(me) else { return };

        if agent.state == AgentState::Waiting {
            if agent.is_holding(self.config, self.now) {
                return;
            }
            self.release_hold(me);
        }

        let Some(agent) = self.agents.get(me) else { return };
        if agent.distance_to_intersection >= self.config.negotiation_distance {
            self.resume(lane, me);
            self.reset_flaw_timers(lane, me);
            return;
        }
        let is_flaw = agent.profile.is_flaw();

        if !is_flaw && self.exit_blocked(lane, me) {
            return;
        }

        let Some(contact) = self.find_opposite_leader(lane, me) else {
            self.resume(lane, me);
            self.reset_flaw_timers(lane, me);
            return;
        };
        if let Some(agent) = self.agents.get_mut(me) {
            agent.already_negotiated = true;
            if is_flaw {
                agent.is_flaw = true;
            }
        }
        if contact.delivery == Delivery::Perception && contact.peer.profile.is_flaw() {
            self.escalate_flaw(lane, me);
        } else {
            self.reset_flaw_timers(lane, me);
        }

        match self.agents.get(me).map(|a| a.state) {
            Some(AgentState::Auto) => self.process_auto(lane, me, &contact),
            Some(AgentState::Yielding) => self.process_yielding(lane, me, &contact),
            Some(AgentState::GainingPriority) => self.process_gaining(lane, me, &contact),
            Some(AgentState::Waiting) | None => {}
        }
    }

    // ── State handlers ────────────────────────────────────────────────────

    fn process_auto(&mut self, lane: LaneIdx, me: AgentKey, contact: &Contact) {
        self.poll_emergency(lane, me);
        let Some(verdict) = self.verdict(me, contact) else { return };
        if verdict.should_yield || contact.peer.profile.is_emergency() {
            self.yield_leader(lane, me);
        }
    }

    fn process_yielding(&mut self, lane: LaneIdx, me: AgentKey, contact: &Contact) {
        self.poll_emergency(lane, me);
        let Some(verdict) = self.verdict(me, contact) else { return };
        let is_emergency = self.agents.get(me).is_some_and(|a| a.is_emergency);

        if verdict.should_yield && !is_emergency {
            self.yield_leader(lane, me);
            let outcome = self.convoy_outcome(lane, me);
            if !outcome.complete {
                return;
            }
            if let Some(channel) = self.lanes.get_mut(lane) {
                channel.last_convoy_boundary = outcome.boundary;
            }
            let cleared = self
                .lanes
                .get_mut(contact.lane)
                .map_or(true, |peer_lane| peer_lane.boundary_cleared(&*self.agents));
            if cleared && !contact.peer.is_emergency {
                self.events.push(NegotiationEvent::ConvoyCompleted {
                    lane,
                    leader: me,
                    boundary: outcome.boundary,
                });
                self.gain_priority(me);
            }
            return;
        }

        match self.resolve(me, contact) {
            Some(false) => self.lose(me),
            _ => self.gain_priority(me),
        }
    }

    fn process_gaining(&mut self, lane: LaneIdx, me: AgentKey, contact: &Contact) {
        if self.resolve(me, contact) == Some(false) {
            self.lose(me);
            return;
        }
        let Some(verdict) = self.verdict(me, contact) else { return };
        if !verdict.should_yield {
            self.resume(lane, me);
            return;
        }
        if self.agents.get(me).is_some_and(|a| a.can_transmit()) {
            self.request_priority(lane, me);
        }
    }

    // ── Steps shared by the handlers ──────────────────────────────────────

    fn verdict(&mut self, me: AgentKey, contact: &Contact) -> Option<YieldVerdict> {
        let agent = self.agents.get(me)?;
        let verdict = agent.yield_verdict(&contact.report, &contact.peer, self.config);
        if verdict.is_safety_warning() {
            warn!(vehicle = %agent.id, peer = %contact.peer.id, "neither vehicle can stop before the intersection");
            self.events.push(NegotiationEvent::SafetyWarning {
                agent:   me,
                vehicle: agent.id.clone(),
                peer:    contact.peer.id.clone(),
            });
        }
        Some(verdict)
    }

    fn resolve(&mut self, me: AgentKey, contact: &Contact) -> Option<bool> {
        let mine = self.agents.view(me)?;
        resolve_priority(&mine, &contact.peer, self.decisions, self.rng)
    }

    /// Ask the own lane whether anyone declares an emergency.
    fn poll_emergency(&mut self, lane: LaneIdx, me: AgentKey) {
        let Some(agent) = self.agents.get(me) else { return };
        if !agent.can_transmit() {
            return;
        }
        let replies = self.send_in_radius(lane, me, &Message::new(me, Body::RequestEmergency));
        let declared = replies.iter().any(|m| m.body == Body::ResponseEmergency);
        if let Some(agent) = self.agents.get_mut(me) {
            agent.is_emergency = agent.profile.is_emergency() || declared;
        }
    }

    fn convoy_outcome(&mut self, lane: LaneIdx, me: AgentKey) -> ConvoyOutcome {
        let Some(agent) = self.agents.get(me) else {
            return ConvoyOutcome::default();
        };
        let yield_time = agent.yield_time(self.now);
        if agent.declares_convoy_complete(self.config, self.now) {
            debug!(vehicle = %agent.id, yield_time, "convoy declared complete");
            return ConvoyOutcome { complete: true, boundary: None };
        }
        let request = Message::new(me, Body::RequestFollower { sender_wait_time: yield_time });
        let responses: Vec<(AgentKey, u32)> = if agent.can_transmit() {
            self.send_in_radius(lane, me, &request)
                .into_iter()
                .filter_map(|m| match m.body {
                    Body::ResponseFollower { detected_count } => Some((m.sender, detected_count)),
                    _ => None,
                })
                .collect()
        } else {
            Vec::new()
        };
        tally_convoy(1, &responses, yield_time, self.config)
    }

    fn request_priority(&mut self, lane: LaneIdx, me: AgentKey) {
        let request = Message::new(me, Body::PriorityRequired);
        let mut refused = false;
        for reply in self.send_to_opposite_leaders(lane, me, &request, Delivery::Radio) {
            if reply.handled.relay_upstream {
                self.relay_upstream(reply.lane, reply.leader, &request);
            }
            refused |= matches!(reply.handled.reply, Some(Message { body: Body::YieldingNotPossible, .. }));
        }
        debug!(refused, "priority requested");
        self.events.push(NegotiationEvent::PriorityRequested { agent: me, refused });
    }

    /// Hold the leader back while its exit lane is backed up.  Returns `true`
    /// when the leader ends up yielding.
    ///
    /// A wait raised here is dropped as soon as the exit clears, together with
    /// the decisions it settled; a wait raised by flaw escalation is left
    /// alone.
    fn exit_blocked(&mut self, lane: LaneIdx, me: AgentKey) -> bool {
        if !self.exit_backed_up(lane, me) {
            if let Some(agent) = self.agents.get_mut(me).filter(|a| a.exit_hold) {
                debug!(vehicle = %agent.id, "exit lane clear");
                agent.exit_hold = false;
                agent.should_wait = false;
                self.decisions.forget(me);
            }
            return false;
        }

        let yielded = self.yield_leader(lane, me);
        if let Some(agent) = self.agents.get_mut(me) {
            if !agent.should_wait {
                debug!(vehicle = %agent.id, "exit lane blocked");
                self.events.push(NegotiationEvent::ExitBlocked { agent: me });
                agent.should_wait = true;
                agent.exit_hold = true;
            }
        }
        yielded
    }

    /// Ask the exit lane's tail whether it is stopped or slow.
    ///
    /// The tail is the agent that entered the exit lane last, so it is the one
    /// nearest the crossing and the one a leader would drive up behind.
    fn exit_backed_up(&mut self, lane: LaneIdx, me: AgentKey) -> bool {
        let Some(exit) = self.lanes.get(lane).and_then(|c| c.successor) else {
            return false;
        };
        self.refresh_lane(exit);
        let Some(tail) = self.lanes.get(exit).and_then(|c| c.tail()) else {
            return false;
        };
        let (Some(agent), Some(last)) = (self.agents.get(me), self.agents.get(tail)) else {
            return false;
        };
        if agent.position.distance(last.position) > self.config.next_lane_radius {
            return false;
        }
        let request = Message::new(
            me,
            Body::RequestNextLastFollower {
                sender_distance:  agent.distance_to_intersection,
                sender_wait_time: agent.yield_time(self.now),
            },
        );
        let reply = self.deliver(exit, tail, &request, Delivery::Radio).reply;
        matches!(
            reply,
            Some(Message { body: Body::ResponseNextLastFollower { is_stopped_or_slow: true, .. }, .. })
        )
    }

    /// Track how long this lane has faced a silent peer and tell the next
    /// follower to wait once that runs past `flaw_timeout_secs`, or once the
    /// follower is the boundary of the last convoy.
    fn escalate_flaw(&mut self, lane: LaneIdx, me: AgentKey) {
        let now = self.now.secs;
        let Some(agent) = self.agents.get_mut(me) else { return };
        let since = *agent.opposite_flaw_since.get_or_insert(now);

        let Some(channel) = self.lanes.get(lane) else { return };
        let boundary = channel.last_convoy_boundary;
        let Some(next) = channel.next_upstream(me) else { return };
        let Some(follower) = self.agents.get_mut(next) else { return };
        let since = *follower.opposite_flaw_since.get_or_insert(since);
        if follower.should_wait {
            return;
        }
        if now - since > self.config.flaw_timeout_secs || boundary == Some(next) {
            follower.should_wait = true;
            follower.exit_hold = false;
            debug!(vehicle = %follower.id, waited = now - since, "follower told to wait");
            self.events.push(NegotiationEvent::FlawEscalated {
                lane,
                follower: next,
                vehicle: follower.id.clone(),
            });
        }
    }

    /// The lane no longer faces a silent peer: restart the clock for the
    /// leader and the follower it would escalate to.
    fn reset_flaw_timers(&mut self, lane: LaneIdx, me: AgentKey) {
        let next = self.lanes.get(lane).and_then(|c| c.next_upstream(me));
        for key in std::iter::once(me).chain(next) {
            if let Some(agent) = self.agents.get_mut(key) {
                agent.opposite_flaw_since = None;
            }
        }
    }

    // ── Transitions ───────────────────────────────────────────────────────

    fn yield_leader(&mut self, lane: LaneIdx, me: AgentKey) -> bool {
        let Some(channel) = self.lanes.get(lane) else { return false };
        let site = channel.stop_site();
        let Some(agent) = self.agents.get_mut(me) else { return false };
        let before = agent.state;
        let yielded = agent.yield_now(&mut *self.world, site, self.config, self.now);
        self.note_transition(me, before);
        yielded
    }

    fn resume(&mut self, lane: LaneIdx, me: AgentKey) {
        let Some(channel) = self.lanes.get(lane) else { return };
        let site = channel.stop_site();
        let Some(agent) = self.agents.get_mut(me) else { return };
        let before = agent.state;
        if agent.resume(&mut *self.world, site, self.config) {
            self.decisions.forget(me);
            self.note_transition(me, before);
        }
    }

    fn release_hold(&mut self, me: AgentKey) {
        let Some(agent) = self.agents.get_mut(me) else { return };
        agent.release_hold(&mut *self.world);
        self.decisions.forget(me);
        self.note_transition(me, AgentState::Waiting);
    }

    fn gain_priority(&mut self, me: AgentKey) {
        let Some(agent) = self.agents.get_mut(me) else { return };
        let before = agent.state;
        agent.begin_gaining_priority();
        self.note_transition(me, before);
    }

    /// Lost a contested episode: Flaw agents enter the Waiting hold, others
    /// keep (or go back to) yielding.
    fn lose(&mut self, me: AgentKey) {
        let Some(agent) = self.agents.get_mut(me) else { return };
        let before = agent.state;
        if agent.profile.is_flaw() {
            agent.enter_waiting(self.now);
        } else {
            agent.fall_back_to_yielding(self.now);
        }
        self.note_transition(me, before);
    }

    pub(crate) fn note_transition(&mut self, key: AgentKey, from: AgentState) {
        let Some(agent) = self.agents.get(key) else { return };
        if agent.state == from {
            return;
        }
        debug!(vehicle = %agent.id, %from, to = %agent.state, "transition");
        self.events.push(NegotiationEvent::Transition {
            agent:   key,
            vehicle: agent.id.clone(),
            from,
            to: agent.state,
        });
    }
}

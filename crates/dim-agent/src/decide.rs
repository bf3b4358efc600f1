//! The yield decision.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! | # | Condition                                                  | Yield |
//! |---|------------------------------------------------------------|-------|
//! | 1 | self cannot stop before the line                           | no    |
//! | 2 | self `should_wait`                                         | yes   |
//! | 3 | self is Flaw and the peer is not forced to wait            | yes   |
//! | 4 | peer is Flaw (self not forced to wait)                     | no    |
//! | 5 | self Yielding and peer not stopped                         | yes   |
//! | 6 | self GainingPriority and peer cannot brake or not stopped  | yes   |
//! | 7 | peer stopped                                               | no    |
//! | 8 | peer closer to the intersection                            | yes   |
//! | 9 | equal distance and self id > peer id                       | yes   |
//! | - | otherwise                                                  | no    |
//!
//! The braking check comes first: an agent that cannot stop is never asked to.

use dim_core::{AgentKey, LaneIdx, ProtocolConfig, VehicleId};
use dim_protocol::LeaderReport;

use crate::{Agent, AgentState, BehaviorProfile};

/// What one agent can observe about another besides its report.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentView {
    pub key:          AgentKey,
    pub id:           VehicleId,
    pub lane:         LaneIdx,
    pub profile:      BehaviorProfile,
    pub state:        AgentState,
    pub should_wait:  bool,
    pub is_emergency: bool,
}

impl AgentView {
    pub fn of(agent: &Agent) -> Self {
        Self {
            key:          agent.key,
            id:           agent.id.clone(),
            lane:         agent.lane,
            profile:      agent.profile,
            state:        agent.state,
            should_wait:  agent.should_wait,
            is_emergency: agent.is_emergency,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum YieldReason {
    /// Too close or too fast to stop; the peer can.
    CannotStop,
    /// Neither side can stop.  Nobody yields; surfaced as a safety warning.
    NeitherCanStop,
    ForcedWait,
    FlawCaution,
    UntrustedFlawPeer,
    PeerStillMoving,
    PriorityUnconfirmed,
    PeerStopped,
    PeerCloser,
    TieBreak,
    Proceed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct YieldVerdict {
    pub should_yield: bool,
    pub reason:       YieldReason,
}

impl YieldVerdict {
    const fn new(should_yield: bool, reason: YieldReason) -> Self {
        Self { should_yield, reason }
    }

    #[inline]
    pub fn is_safety_warning(&self) -> bool {
        self.reason == YieldReason::NeitherCanStop
    }
}

impl Agent {
    /// Decide whether to yield to `peer`, whose latest report is `report`.
    pub fn yield_verdict(&self, report: &LeaderReport, peer: &AgentView, config: &ProtocolConfig) -> YieldVerdict {
        use YieldReason::*;

        if !self.can_stop(config) {
            let reason = if report.can_brake { CannotStop } else { NeitherCanStop };
            return YieldVerdict::new(false, reason);
        }
        if self.should_wait {
            return YieldVerdict::new(true, ForcedWait);
        }
        if self.profile.is_flaw() && !peer.should_wait {
            return YieldVerdict::new(true, FlawCaution);
        }
        if peer.profile.is_flaw() && !self.should_wait {
            return YieldVerdict::new(false, UntrustedFlawPeer);
        }
        match self.state {
            AgentState::Yielding if !report.is_stopped => {
                return YieldVerdict::new(true, PeerStillMoving);
            }
            AgentState::GainingPriority if !report.can_brake || !report.is_stopped => {
                return YieldVerdict::new(true, PriorityUnconfirmed);
            }
            _ => {}
        }
        if report.is_stopped {
            return YieldVerdict::new(false, PeerStopped);
        }
        if report.distance_to_intersection < self.distance_to_intersection {
            return YieldVerdict::new(true, PeerCloser);
        }
        if report.distance_to_intersection == self.distance_to_intersection && self.id > peer.id {
            return YieldVerdict::new(true, TieBreak);
        }
        YieldVerdict::new(false, Proceed)
    }

    #[inline]
    pub fn should_yield(&self, report: &LeaderReport, peer: &AgentView, config: &ProtocolConfig) -> bool {
        self.yield_verdict(report, peer, config).should_yield
    }
}

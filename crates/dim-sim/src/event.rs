//! What a tick produced, for observers.

use dim_agent::AgentState;
use dim_core::{AgentKey, LaneIdx, Tick, VehicleId};

#[derive(Clone, Debug, PartialEq)]
pub enum NegotiationEvent {
    /// An agent changed state.
    Transition {
        agent:   AgentKey,
        vehicle: VehicleId,
        from:    AgentState,
        to:      AgentState,
    },
    /// Neither the leader nor its opposite peer can stop in time.  Nobody
    /// yields; the simulation carries on.
    SafetyWarning {
        agent:   AgentKey,
        vehicle: VehicleId,
        peer:    VehicleId,
    },
    /// A yielding leader's convoy completed and it started gaining priority.
    /// `boundary` is `None` when completion came from the yield timeout.
    ConvoyCompleted {
        lane:     LaneIdx,
        leader:   AgentKey,
        boundary: Option<AgentKey>,
    },
    /// A follower was told to wait behind a leader facing a silent peer.
    FlawEscalated {
        lane:     LaneIdx,
        follower: AgentKey,
        vehicle:  VehicleId,
    },
    /// A gaining leader asked the opposite side to stop.  `refused` if any
    /// responder could not.
    PriorityRequested {
        agent:   AgentKey,
        refused: bool,
    },
    /// The exit lane is blocked; the leader was held back.
    ExitBlocked {
        agent: AgentKey,
    },
}

/// Per-tick counters handed to [`SimObserver::on_tick_end`][crate::SimObserver::on_tick_end].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickSummary {
    pub tick:       Tick,
    /// Agents spawned this tick.
    pub entered:    usize,
    /// Agents destroyed this tick.
    pub departed:   usize,
    /// Leaders that ran a negotiation step.
    pub negotiated: usize,
    pub events:     usize,
}

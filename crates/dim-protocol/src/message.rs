//! Message envelope and bodies.

use serde::{Deserialize, Serialize};

use dim_core::AgentKey;

/// What a leader tells an opposing leader about itself.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderReport {
    pub distance_to_intersection: f64,
    pub is_stopped:               bool,
    /// Seconds spent yielding so far (0 when not yielding).
    pub wait_time:                f64,
    pub can_brake:                bool,
}

/// A protocol message: who sent it and what it says.
///
/// Relayed messages keep their original `sender`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: AgentKey,
    pub body:   Body,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Body {
    /// Sent by a yielding leader; carries how long it has been yielding.
    RequestFollower {
        sender_wait_time: f64,
    },
    ResponseFollower {
        detected_count: u32,
    },
    RequestEmergency,
    ResponseEmergency,
    ResponseNotEmergency,
    RequestOppositeLeader {
        sender_distance:  f64,
        sender_wait_time: f64,
    },
    ResponseOppositeLeader(LeaderReport),
    RequestNextLastFollower {
        sender_distance:  f64,
        sender_wait_time: f64,
    },
    ResponseNextLastFollower {
        distance_to_intersection: f64,
        is_stopped_or_slow:       bool,
        wait_time:                f64,
        can_brake:                bool,
    },
    PriorityRequired,
    Yielding,
    YieldingNotPossible,
}

impl Message {
    #[inline]
    pub fn new(sender: AgentKey, body: Body) -> Self {
        Self { sender, body }
    }

    #[inline]
    pub fn is_request(&self) -> bool {
        self.body.is_request()
    }
}

impl Body {
    /// `true` for the variants that expect an answer.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Body::RequestFollower { .. }
                | Body::RequestEmergency
                | Body::RequestOppositeLeader { .. }
                | Body::RequestNextLastFollower { .. }
                | Body::PriorityRequired
        )
    }

    /// Stable name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Body::RequestFollower { .. } => "request_follower",
            Body::ResponseFollower { .. } => "response_follower",
            Body::RequestEmergency => "request_emergency",
            Body::ResponseEmergency => "response_emergency",
            Body::ResponseNotEmergency => "response_not_emergency",
            Body::RequestOppositeLeader { .. } => "request_opposite_leader",
            Body::ResponseOppositeLeader(_) => "response_opposite_leader",
            Body::RequestNextLastFollower { .. } => "request_next_last_follower",
            Body::ResponseNextLastFollower { .. } => "response_next_last_follower",
            Body::PriorityRequired => "priority_required",
            Body::Yielding => "yielding",
            Body::YieldingNotPossible => "yielding_not_possible",
        }
    }
}

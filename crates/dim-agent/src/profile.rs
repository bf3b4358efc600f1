//! Behavior profiles.
//!
//! A profile fixes what an agent *can* do for its whole life.  Whatever it
//! learns during negotiation (declared emergency, forced wait) lives in the
//! agent's flags instead.

use std::fmt;

/// What a profile is able to do on the protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Answers `RequestEmergency` with `ResponseEmergency`.
    pub reports_emergency:          bool,
    /// Inflates its `ResponseFollower` count once it has waited long enough.
    pub fabricates_convoy_response: bool,
    /// Sends and answers radio messages.  Non-communicating agents can still
    /// be perceived.
    pub can_communicate:            bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BehaviorProfile {
    #[default]
    Normal,
    Emergency,
    Deceiving,
    Flaw,
}

impl BehaviorProfile {
    pub const fn capabilities(self) -> Capabilities {
        match self {
            BehaviorProfile::Normal => Capabilities {
                reports_emergency:          false,
                fabricates_convoy_response: false,
                can_communicate:            true,
            },
            BehaviorProfile::Emergency => Capabilities {
                reports_emergency:          true,
                fabricates_convoy_response: false,
                can_communicate:            true,
            },
            BehaviorProfile::Deceiving => Capabilities {
                reports_emergency:          false,
                fabricates_convoy_response: true,
                can_communicate:            true,
            },
            BehaviorProfile::Flaw => Capabilities {
                reports_emergency:          false,
                fabricates_convoy_response: false,
                can_communicate:            false,
            },
        }
    }

    /// Classify a vehicle by its name tag: `_flaw`, `_emergency`, `_dec`.
    /// Checked in that order, so a `_flaw` tag wins.
    pub fn from_vehicle_id(id: &str) -> Self {
        if id.contains("_flaw") {
            BehaviorProfile::Flaw
        } else if id.contains("_emergency") {
            BehaviorProfile::Emergency
        } else if id.contains("_dec") {
            BehaviorProfile::Deceiving
        } else {
            BehaviorProfile::Normal
        }
    }

    #[inline]
    pub fn is_flaw(self) -> bool {
        matches!(self, BehaviorProfile::Flaw)
    }

    #[inline]
    pub fn is_emergency(self) -> bool {
        self.capabilities().reports_emergency
    }

    #[inline]
    pub fn can_communicate(self) -> bool {
        self.capabilities().can_communicate
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BehaviorProfile::Normal => "normal",
            BehaviorProfile::Emergency => "emergency",
            BehaviorProfile::Deceiving => "deceiving",
            BehaviorProfile::Flaw => "flaw",
        }
    }
}

impl fmt::Display for BehaviorProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

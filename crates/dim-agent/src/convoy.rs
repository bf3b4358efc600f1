//! Convoy completion.
//!
//! A yielding leader lets the opposing side through until enough vehicles
//! have queued behind it (a convoy), or until it has waited long enough.

use dim_core::{AgentKey, ProtocolConfig, SimTime};

use crate::Agent;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct ConvoyOutcome {
    pub complete: bool,
    /// Last follower counted; `None` when completion came from the timeout.
    pub boundary: Option<AgentKey>,
}

/// Decide convoy completion from follower reports.
///
/// `responses` are `(sender, detected_count)` in the order received.
pub fn tally_convoy(
    own_count:  u32,
    responses:  &[(AgentKey, u32)],
    yield_time: f64,
    config:     &ProtocolConfig,
) -> ConvoyOutcome {
    let detected = responses
        .iter()
        .fold(own_count, |sum, (_, count)| sum.saturating_add(*count));
    if detected >= config.min_convoy_size {
        return ConvoyOutcome {
            complete: true,
            boundary: responses.last().map(|(sender, _)| *sender),
        };
    }
    if yield_time >= config.min_yield_timeout_secs {
        return ConvoyOutcome { complete: true, boundary: None };
    }
    ConvoyOutcome::default()
}

impl Agent {
    /// How many vehicles this follower claims to represent when a leader
    /// that has yielded for `leader_wait_time` counts its convoy.
    ///
    /// Honest agents count themselves.  A queued follower is held for as long
    /// as its leader yields, so a deceiving one measures the half timeout
    /// against the longer of the two episodes and then claims the rest of
    /// the convoy on its own.
    pub fn convoy_report(&self, config: &ProtocolConfig, leader_wait_time: f64, now: SimTime) -> u32 {
        let held_for = leader_wait_time.max(self.yield_time(now));
        if self.fabricates_convoy() && held_for >= config.min_yield_timeout_secs / 2.0 {
            config.min_convoy_size.saturating_sub(1)
        } else {
            1
        }
    }

    /// A deceiving leader calls its own convoy complete after half the
    /// minimum yield timeout, followers or not.
    pub fn declares_convoy_complete(&self, config: &ProtocolConfig, now: SimTime) -> bool {
        self.fabricates_convoy() && self.yield_time(now) >= config.min_yield_timeout_secs / 2.0
    }

    #[inline]
    fn fabricates_convoy(&self) -> bool {
        self.profile.capabilities().fabricates_convoy_response
    }
}

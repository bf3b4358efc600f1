//! Run and protocol configuration.
//!
//! Both structs deserialize from TOML with every field optional:
//!
//! ```toml
//! step_secs   = 0.5
//! total_ticks = 7200
//! seed        = 7
//!
//! [protocol]
//! min_convoy_size   = 6
//! flaw_timeout_secs = 10.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DimError, DimResult, SimClock, Tick};

// ── ProtocolConfig ────────────────────────────────────────────────────────────

/// Distances (metres), timeouts (seconds) and thresholds of the negotiation
/// protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Two lanes are adjacent at a shape point if any point of the other lane
    /// lies strictly closer than this.
    pub adjacency_distance: f64,
    /// Lanes of this length or shorter are intersection internals.
    pub min_lane_length: f64,
    /// Leaders farther than this from the intersection do not negotiate.
    pub negotiation_distance: f64,
    /// Leaders closer than this can be perceived without communicating.
    pub perception_distance: f64,
    /// Leader-to-leader communication radius.
    pub leader_radius: f64,
    /// Leader-to-leader perception radius.
    pub perception_radius: f64,
    /// Radius for follower, emergency and relay messages within a lane.
    pub upstream_radius: f64,
    /// Radius for the exit-lane backpressure query.
    pub next_lane_radius: f64,
    /// At or below this speed (m/s) an exit-lane agent counts as slow.
    pub slow_speed: f64,
    pub min_yield_timeout_secs: f64,
    pub min_convoy_size: u32,
    /// Reaction delay added to the braking time.
    pub stopping_time_delay_secs: f64,
    /// Stop line sits this far before the lane end.
    pub min_braking_margin: f64,
    pub flaw_timeout_secs: f64,
    pub waiting_hold_secs: f64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            adjacency_distance:       20.0,
            min_lane_length:          40.0,
            negotiation_distance:     50.0,
            perception_distance:      10.0,
            leader_radius:            150.0,
            perception_radius:        10.0,
            upstream_radius:          60.0,
            next_lane_radius:         30.0,
            slow_speed:               1.0,
            min_yield_timeout_secs:   20.0,
            min_convoy_size:          8,
            stopping_time_delay_secs: 1.0,
            min_braking_margin:       1.0,
            flaw_timeout_secs:        15.0,
            waiting_hold_secs:        12.0,
        }
    }
}

impl ProtocolConfig {
    /// Reject values the state machine cannot work with.
    pub fn validate(&self) -> DimResult<()> {
        let non_negative = [
            ("adjacency_distance", self.adjacency_distance),
            ("min_lane_length", self.min_lane_length),
            ("negotiation_distance", self.negotiation_distance),
            ("perception_distance", self.perception_distance),
            ("leader_radius", self.leader_radius),
            ("perception_radius", self.perception_radius),
            ("upstream_radius", self.upstream_radius),
            ("next_lane_radius", self.next_lane_radius),
            ("slow_speed", self.slow_speed),
            ("min_yield_timeout_secs", self.min_yield_timeout_secs),
            ("stopping_time_delay_secs", self.stopping_time_delay_secs),
            ("min_braking_margin", self.min_braking_margin),
            ("flaw_timeout_secs", self.flaw_timeout_secs),
            ("waiting_hold_secs", self.waiting_hold_secs),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(DimError::Config(format!("{name} must be finite and >= 0, got {value}")));
            }
        }
        if self.min_convoy_size == 0 {
            return Err(DimError::Config("min_convoy_size must be at least 1".into()));
        }
        if self.perception_distance > self.negotiation_distance {
            return Err(DimError::Config(format!(
                "perception_distance ({}) exceeds negotiation_distance ({})",
                self.perception_distance, self.negotiation_distance,
            )));
        }
        Ok(())
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Top-level run configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulated seconds per tick.
    pub step_secs: f64,
    /// Ticks simulated by `Sim::run`.
    pub total_ticks: u64,
    /// Seed for the tie-break coin.  The same seed always produces identical
    /// results.
    pub seed: u64,
    pub protocol: ProtocolConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            step_secs:   1.0,
            total_ticks: 3_600,
            seed:        0,
            protocol:    ProtocolConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn from_toml_str(text: &str) -> DimResult<Self> {
        let config: SimConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> DimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> DimResult<()> {
        if !self.step_secs.is_finite() || self.step_secs <= 0.0 {
            return Err(DimError::Config(format!("step_secs must be > 0, got {}", self.step_secs)));
        }
        self.protocol.validate()
    }

    /// The tick at which `Sim::run` stops (exclusive upper bound).
    #[inline]
    pub fn end_tick(&self) -> Tick {
        Tick(self.total_ticks)
    }

    pub fn make_clock(&self) -> SimClock {
        SimClock::new(self.step_secs)
    }
}

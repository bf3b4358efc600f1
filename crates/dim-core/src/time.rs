//! Simulation time model.
//!
//! Time advances in integer `Tick`s.  Protocol timers (yield time, Waiting
//! hold, flaw timeout) are expressed in seconds, so every negotiation call
//! receives a [`SimTime`] carrying both:
//!
//!   secs = tick * step_secs
//!
//! The clock is passed explicitly into the state machine; nothing reads an
//! ambient "current time".

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation tick counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── SimTime ───────────────────────────────────────────────────────────────────

/// "Now" as seen by one negotiation step.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct SimTime {
    pub tick: Tick,
    /// Simulated seconds since tick 0.
    pub secs: f64,
}

impl SimTime {
    pub fn new(tick: Tick, secs: f64) -> Self {
        Self { tick, secs }
    }

    /// Seconds elapsed since the timestamp `since`, or zero if unset.
    #[inline]
    pub fn elapsed_since(self, since: Option<f64>) -> f64 {
        since.map_or(0.0, |t| self.secs - t)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.1}s)", self.tick, self.secs)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Maps ticks to simulated seconds.
#[derive(Clone, Debug)]
pub struct SimClock {
    /// Simulated seconds per tick.
    pub step_secs: f64,
    /// Advanced once per driver iteration.
    pub current_tick: Tick,
}

impl SimClock {
    pub fn new(step_secs: f64) -> Self {
        Self { step_secs, current_tick: Tick::ZERO }
    }

    /// Advance the clock by one tick.
    #[inline]
    pub fn advance(&mut self) {
        self.current_tick = self.current_tick + 1;
    }

    /// Elapsed simulated seconds at the current tick.
    #[inline]
    pub fn elapsed_secs(&self) -> f64 {
        self.current_tick.0 as f64 * self.step_secs
    }

    /// Snapshot of the current tick and its time in seconds.
    #[inline]
    pub fn now(&self) -> SimTime {
        SimTime::new(self.current_tick, self.elapsed_secs())
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.now().fmt(f)
    }
}

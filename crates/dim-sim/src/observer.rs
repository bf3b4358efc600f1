//! Simulation observer trait for progress reporting and data collection.

use dim_core::Tick;

use crate::{NegotiationEvent, TickSummary};

/// Callbacks invoked by [`Sim`][crate::Sim] at key points in the tick loop.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example: safety monitor
///
/// ```rust,ignore
/// struct SafetyMonitor { warnings: usize }
///
/// impl SimObserver for SafetyMonitor {
///     fn on_event(&mut self, _tick: Tick, event: &NegotiationEvent) {
///         if matches!(event, NegotiationEvent::SafetyWarning { .. }) {
///             self.warnings += 1;
///         }
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called at the very start of each tick, before any lane is processed.
    fn on_tick_start(&mut self, _tick: Tick) {}

    /// Called once per event, in the order the events happened.
    fn on_event(&mut self, _tick: Tick, _event: &NegotiationEvent) {}

    /// Called at the end of each tick.
    fn on_tick_end(&mut self, _tick: Tick, _summary: &TickSummary) {}

    /// Called once after the final tick of [`Sim::run`][crate::Sim::run].
    fn on_sim_end(&mut self, _final_tick: Tick) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}

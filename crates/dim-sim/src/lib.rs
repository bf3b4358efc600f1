//! `dim-sim`: tick driver for the dim framework.
//!
//! # Tick loop
//!
//! ```text
//! for tick in 0..config.total_ticks:
//!   ① World    : WorldState::advance(step_secs)           (run / run_ticks only)
//!   ② For each lane, in LaneIdx order:
//!        Sync     : drop departed agents, spawn arrivals, forget their decisions
//!        Negotiate: the lane leader runs one step of the state machine:
//!                      Waiting hold → entry guard → exit backpressure →
//!                      opposite leader (radio, then perception) → flaw escalation →
//!                      Auto / Yielding / GainingPriority handler
//!   ③ Observe  : NegotiationEvents, then on_tick_end(TickSummary)
//! ```
//!
//! Lanes are processed strictly in order and every write is visible to the
//! lanes processed after it in the same tick.
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use dim_core::SimConfig;
//! use dim_sim::{NoopObserver, SimBuilder};
//!
//! let mut sim = SimBuilder::new(SimConfig::default(), world).build()?;
//! sim.run(&mut NoopObserver);
//! ```

pub mod builder;
pub mod error;
pub mod event;
mod negotiation;
pub mod observer;
mod routing;
pub mod sim;


pub use builder::SimBuilder;
pub use error::{SimError, SimResult};
pub use event::{NegotiationEvent, TickSummary};
pub use observer::{NoopObserver, SimObserver};
pub use sim::Sim;

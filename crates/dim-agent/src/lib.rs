//! `dim-agent`: one negotiating vehicle.
//!
//! | Module         | Contents                                                     |
//! |----------------|--------------------------------------------------------------|
//! | [`profile`]    | `BehaviorProfile`, `Capabilities`                            |
//! | [`agent`]      | `Agent`, `AgentState`, refresh, braking, stop/resume         |
//! | [`decide`]     | `should_yield` rule ladder, `AgentView`                      |
//! | [`convoy`]     | convoy tally and follower self-reports                       |
//! | [`respond`]    | answering incoming requests                                  |
//! | [`priority`]   | `DecisionBook` rendezvous and the priority ladder            |
//! | [`registry`]   | `AgentRegistry`: generational storage keyed by `AgentKey`    |
//!
//! Everything here is a function of (agent, peer report, now, config).  Moving
//! messages between agents is the job of `dim-sim`.

pub mod agent;
pub mod convoy;
pub mod decide;
pub mod priority;
pub mod profile;
pub mod registry;
pub mod respond;

#[cfg(test)]
mod tests;

pub use agent::{Agent, AgentState, StopSite};
pub use convoy::{ConvoyOutcome, tally_convoy};
pub use decide::{AgentView, YieldReason, YieldVerdict};
pub use priority::{DecisionBook, resolve_priority};
pub use profile::{BehaviorProfile, Capabilities};
pub use registry::AgentRegistry;
pub use respond::{Delivery, Handled};

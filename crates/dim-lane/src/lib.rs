//! `dim-lane`: lanes as negotiation channels.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                      |
//! |-------------|---------------------------------------------------------------|
//! | [`channel`] | `LaneChannel`: agent queue, leader/tail, convoy boundary      |
//! | [`network`] | `LaneNetwork`: lane discovery, R-tree adjacency, successors   |
//! | [`error`]   | `LaneError`, `LaneResult<T>`                                  |
//!
//! Topology is built once from the world and never changes afterwards; only
//! queue membership moves from tick to tick.

pub mod channel;
pub mod error;
pub mod network;

#[cfg(test)]
mod tests;

pub use channel::{LaneChannel, MembershipDelta};
pub use error::{LaneError, LaneResult};
pub use network::LaneNetwork;

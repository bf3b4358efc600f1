//! `dim-world`: the boundary between the negotiation core and whatever moves
//! the vehicles.
//!
//! | Module       | Contents                                                   |
//! |--------------|------------------------------------------------------------|
//! | [`state`]    | [`WorldState`]: queries, actuation, lane topology          |
//! | [`memory`]   | [`MemoryWorld`]: polyline lanes + longitudinal kinematics  |
//! | [`error`]    | [`WorldError`], [`WorldResult`]                            |
//!
//! The core never owns physics.  A real deployment implements [`WorldState`]
//! over its traffic simulator; `MemoryWorld` exists so the protocol can be run
//! and tested without one.

pub mod error;
pub mod memory;
pub mod state;


pub use error::{WorldError, WorldResult};
pub use memory::{Actuation, LaneSpec, MemoryWorld, VehicleSpec};
pub use state::WorldState;

//! `dim-core`: foundational types for the `dim` decentralized intersection
//! management framework.
//!
//! This crate is a dependency of every other `dim-*` crate.  It has no `dim-*`
//! dependencies of its own.
//!
//! # What lives here
//!
//! | Module          | Contents                                                  |
//! |-----------------|-----------------------------------------------------------|
//! | [`ids`]         | `AgentKey`, `LaneIdx`, `VehicleId`, `LaneId`, `EdgeId`    |
//! | [`geo`]         | `Point`, polyline length / interpolation                  |
//! | [`time`]        | `Tick`, `SimTime`, `SimClock`                             |
//! | [`rng`]         | `SimRng` (seedable tie-break coin)                        |
//! | [`config`]      | `SimConfig`, `ProtocolConfig` (TOML loadable)             |
//! | [`error`]       | `DimError`, `DimResult`                                   |

pub mod config;
pub mod error;
pub mod geo;
pub mod ids;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{ProtocolConfig, SimConfig};
pub use error::{DimError, DimResult};
pub use geo::Point;
pub use ids::{AgentKey, EdgeId, LaneId, LaneIdx, VehicleId};
pub use rng::SimRng;
pub use time::{SimClock, SimTime, Tick};

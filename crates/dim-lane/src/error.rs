//! Lane-subsystem error type.

use thiserror::Error;

use dim_core::LaneId;

/// Errors produced while building the lane network.  Nothing fails per tick.
#[derive(Debug, Error, PartialEq)]
pub enum LaneError {
    #[error("world lists lane {0} but reports no length for it")]
    UnknownLane(LaneId),

    #[error("lane {0} has no usable geometry")]
    MissingGeometry(LaneId),

    #[error("lane {0} has no edge id")]
    MissingEdge(LaneId),

    #[error("lane index overflow at lane {0}")]
    TooManyLanes(LaneId),
}

pub type LaneResult<T> = Result<T, LaneError>;

use dim_core::{LaneId, VehicleId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum WorldError {
    /// The vehicle is no longer in the simulation.
    #[error("vehicle {0} has left the simulation")]
    Departed(VehicleId),

    #[error("unknown lane {0}")]
    UnknownLane(LaneId),

    #[error("vehicle {0} already exists")]
    DuplicateVehicle(VehicleId),
}

pub type WorldResult<T> = Result<T, WorldError>;

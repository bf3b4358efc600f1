use dim_core::DimError;
use dim_lane::LaneError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(#[from] DimError),

    #[error("lane network error: {0}")]
    Lane(#[from] LaneError),
}

pub type SimResult<T> = Result<T, SimError>;

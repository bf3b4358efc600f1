//! Framework error type.
//!
//! Sub-crates define their own error enums and wrap `DimError` as one variant
//! where they surface configuration problems.

use thiserror::Error;

/// The top-level error type for `dim-core`.
#[derive(Debug, Error)]
pub enum DimError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for `dim-core`.
pub type DimResult<T> = Result<T, DimError>;

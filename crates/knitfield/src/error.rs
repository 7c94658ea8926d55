//! Error kinds surfaced by the library.
//!
//! Numeric routines do not use this type: they return `Option` and fall back on
//! ill-conditioned geometry. Solver non-convergence is reported through stage
//! reports, and validation findings through `solver::ValidationReport`.

use thiserror::Error;

/// Root error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller misuse detected at the call site.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Sketch geometry that the mesh layer cannot discretize.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// A persisted layer references a sample that does not exist.
    #[error("topology error: {0}")]
    Topology(String),

    /// Layer (de)serialization failed.
    #[error("persistence error: {0}")]
    Persist(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

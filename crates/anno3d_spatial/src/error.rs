//! Error types for spatial index construction.

use thiserror::Error;

/// Errors that can occur while building or querying a spatial index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpatialError {
    /// A build job was requested while another one is still running.
    #[error("BVH builder is already running a job")]
    BuilderBusy,

    /// The builder thread has been shut down.
    #[error("BVH builder has been disposed")]
    BuilderDisposed,

    /// The worker thread failed or disappeared before answering.
    #[error("BVH worker failed: {0}")]
    WorkerFailed(String),

    /// The geometry handed to the builder cannot be indexed.
    #[error("Invalid geometry: {message}")]
    InvalidGeometry {
        /// Description of what is wrong with the geometry
        message: String,
    },
}

impl SpatialError {
    /// Create an invalid geometry error with a message.
    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }
}

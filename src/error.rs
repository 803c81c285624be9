//! Central error handling for the bake pipeline.
//!
//! Provides a unified `Error` enum with one variant per failure class the
//! pipeline can surface. Setup failures (atlas build, oracle init, bad
//! configuration) are fatal; a cache-load miss is recoverable and the
//! pipeline falls through to a fresh bake.

/// Centralized error type for all bake operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("atlas build failed for submesh {submesh}: {reason}")]
    AtlasBuild { submesh: usize, reason: String },

    #[error("ray oracle initialization failed: {0}")]
    RayOracleInit(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("numeric error: {0}")]
    Numeric(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("bake chunk {chunk} failed: {reason}")]
    ChunkFailed { chunk: usize, reason: String },

    #[error("bake cancelled")]
    Cancelled,
}

impl Error {
    /// Convenience constructors for common error types.
    pub fn atlas<T: ToString>(submesh: usize, reason: T) -> Self {
        Error::AtlasBuild {
            submesh,
            reason: reason.to_string(),
        }
    }

    pub fn oracle<T: ToString>(msg: T) -> Self {
        Error::RayOracleInit(msg.to_string())
    }

    pub fn numeric<T: ToString>(msg: T) -> Self {
        Error::Numeric(msg.to_string())
    }

    pub fn config<T: ToString>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    pub fn gpu<T: ToString>(msg: T) -> Self {
        Error::Gpu(msg.to_string())
    }
}

/// Result type alias for bake operations.
pub type Result<T> = std::result::Result<T, Error>;

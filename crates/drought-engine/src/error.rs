//! Error types for the query engine.

use thiserror::Error;

/// Errors that can occur while answering a drought query.
///
/// Recoverable conditions (an empty time window, a selection covering no
/// cells, a degenerate correlation cell) never appear here; they are
/// resolved in place by the component that meets them.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A deployment artifact (archive cube, admin raster, grid index) is absent.
    #[error("missing artifact: {0}")]
    MissingArtifact(String),

    /// Failed to open a cube or raster.
    #[error("failed to open dataset: {0}")]
    OpenFailed(String),

    /// Failed to read data from a cube.
    #[error("failed to read dataset: {0}")]
    ReadFailed(String),

    /// Cube or raster attributes are missing or malformed.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Two rasters that must share a grid do not.
    #[error("grid mismatch: {0}")]
    GridMismatch(String),

    /// The selection event could not be resolved; the caller should not update.
    #[error("no selection: {0}")]
    NoSelection(String),

    /// Index name not in the catalog.
    #[error("unknown index: {0}")]
    UnknownIndex(String),

    /// A computation exceeded its time budget.
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A blocking worker panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Join(String),
}

impl EngineError {
    pub fn missing_artifact(msg: impl Into<String>) -> Self {
        Self::MissingArtifact(msg.into())
    }

    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    pub fn grid_mismatch(msg: impl Into<String>) -> Self {
        Self::GridMismatch(msg.into())
    }

    pub fn no_selection(msg: impl Into<String>) -> Self {
        Self::NoSelection(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether the caller should treat this as "no update" rather than a failure.
    pub fn is_no_update(&self) -> bool {
        matches!(self, Self::NoSelection(_))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

impl From<drought_common::DroughtError> for EngineError {
    fn from(err: drought_common::DroughtError) -> Self {
        match err {
            drought_common::DroughtError::UnknownIndex(name) => Self::UnknownIndex(name),
            drought_common::DroughtError::Io(e) => Self::Storage(e.to_string()),
            other => Self::Config(other.to_string()),
        }
    }
}

impl From<projection::ProjectionError> for EngineError {
    fn from(err: projection::ProjectionError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

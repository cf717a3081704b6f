use thiserror::Error;

/// Errors raised by projection setup or inversion.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Invalid projection parameters: {0}")]
    InvalidParameters(String),

    #[error("Point ({x}, {y}) is outside the projection domain")]
    OutOfDomain { x: f64, y: f64 },

    #[error("Latitude iteration did not converge at ({x}, {y})")]
    NoConvergence { x: f64, y: f64 },
}

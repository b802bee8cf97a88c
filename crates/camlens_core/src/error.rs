//! Error types for camlens_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors raised by model evaluation and hook plumbing.
#[derive(Error, Debug)]
pub enum CoreError {
    /// An operation needed state produced by an earlier forward or backward pass.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Shape mismatch between tensors.
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Dimension error.
    #[error("Dimension error: expected {expected} dimensions, got {got}")]
    DimensionError {
        /// Expected number of dimensions.
        expected: usize,
        /// Actual number of dimensions.
        got: usize,
    },

    /// A hook was requested for a layer the model does not expose.
    #[error("Unknown layer '{name}' (available: {available})")]
    UnknownLayer {
        /// Requested layer name.
        name: String,
        /// Comma separated list of observable layers.
        available: String,
    },

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Tensor data could not be read back from the backend.
    #[error("Tensor error: {0}")]
    Tensor(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Build a [`CoreError::ShapeMismatch`] from any two debuggable shapes.
    pub fn shape_mismatch(expected: impl std::fmt::Debug, got: impl std::fmt::Debug) -> Self {
        Self::ShapeMismatch {
            expected: format!("{expected:?}"),
            got: format!("{got:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message() {
        let err = CoreError::shape_mismatch([2, 4, 4], [2, 3, 3]);
        assert_eq!(
            err.to_string(),
            "Shape mismatch: expected [2, 4, 4], got [2, 3, 3]"
        );
    }

    #[test]
    fn test_unknown_layer_message() {
        let err = CoreError::UnknownLayer {
            name: "head".to_string(),
            available: "features.block0, features.block1".to_string(),
        };
        assert!(err.to_string().contains("'head'"));
        assert!(err.to_string().contains("features.block1"));
    }
}

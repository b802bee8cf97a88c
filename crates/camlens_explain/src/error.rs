//! Error types for camlens_explain.

use thiserror::Error;

/// Result type alias using [`ExplainError`].
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors raised while building saliency maps or overlays.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// `generate` was called before an input was set or before a forward pass captured data.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Activation, gradient or map shapes disagree.
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// The requested class is not in the model's score vector.
    #[error("Class index {index} out of range for {n_classes} classes")]
    ClassIndexOutOfRange {
        /// Requested class index.
        index: usize,
        /// Number of classes the model scores.
        n_classes: usize,
    },

    /// A map or image with zero area.
    #[error("Empty map: {0}")]
    EmptyMap(String),

    /// Tensor data could not be read back from the backend.
    #[error("Tensor error: {0}")]
    Tensor(String),

    /// Model evaluation or hook error.
    #[error(transparent)]
    Core(#[from] camlens_core::CoreError),
}

impl ExplainError {
    pub(crate) fn shape_mismatch(
        expected: impl std::fmt::Debug,
        got: impl std::fmt::Debug,
    ) -> Self {
        Self::ShapeMismatch {
            expected: format!("{expected:?}"),
            got: format!("{got:?}"),
        }
    }
}

//! Error types for camlens_models.

use thiserror::Error;

/// Result type alias using [`ModelError`].
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while building, loading or feeding models.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),

    /// Checkpoint metadata written by an incompatible format version.
    #[error(
        "Checkpoint format version {found} is not supported (expected {expected}); \
         load it with permissive loading"
    )]
    UnsupportedVersion {
        /// Version found in the metadata.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },

    /// Invalid model configuration.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Image decoding or encoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Model evaluation error.
    #[error(transparent)]
    Core(#[from] camlens_core::CoreError),
}

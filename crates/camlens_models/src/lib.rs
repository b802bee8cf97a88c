//! # camlens_models
//!
//! Image classifiers for camlens.
//!
//! This crate provides:
//! - [`ConvClassifier`], a convolutional classifier whose block outputs are
//!   observable layers (`features.block{i}`)
//! - [`Preprocessor`] to turn decoded images into input tensors
//! - [`predict`] for per-class sigmoid probabilities
//! - Checkpoint save/load with a scoped permissive loading override
//! - The [`PATHOLOGIES`] label set
//!
//! ## Example
//!
//! ```rust,ignore
//! use camlens_core::Hooked;
//! use camlens_models::{load_classifier, load_image, predict, Preprocessor};
//!
//! let (model, metadata) = load_classifier::<CpuAutodiff>("weights/chest", &device)?;
//! let input = Preprocessor::from_config(&metadata.config)?
//!     .tensor(&load_image("xray.png")?, &device);
//! let probabilities = predict(&mut Hooked::new(model), input)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod cnn;
mod error;
mod inference;
pub mod labels;
pub mod loader;
mod preprocess;

pub use checkpoint::{
    load_checkpoint, load_classifier, save_classifier, CheckpointMetadata,
    CHECKPOINT_FORMAT_VERSION,
};
pub use cnn::{block_name, ConvBlock, ConvClassifier, ConvClassifierConfig};
pub use error::{ModelError, Result};
pub use inference::{predict, top_k};
pub use labels::{pathology_index, pathology_labels, PATHOLOGIES};
pub use loader::{loader_policy, with_permissive_loading, LoaderPolicy, PermissiveLoading};
pub use preprocess::{load_image, normalize_intensity, Preprocessor, INTENSITY_RANGE};

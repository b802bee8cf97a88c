//! Classifier checkpoints.
//!
//! A checkpoint is a pair of files sharing a stem:
//!
//! - `<stem>.mpk`: weights, written with Burn's named MessagePack recorder
//! - `<stem>.json`: [`CheckpointMetadata`] with the architecture config
//!
//! # Example
//!
//! ```rust,ignore
//! use camlens_models::{load_classifier, save_classifier, CheckpointMetadata};
//!
//! save_classifier(&model, &CheckpointMetadata::new(config), "weights/chest")?;
//! let (model, metadata) = load_classifier::<NdArray>("weights/chest", &device)?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use serde::{Deserialize, Serialize};

use crate::cnn::{ConvClassifier, ConvClassifierConfig};
use crate::error::{ModelError, Result};
use crate::labels::pathology_labels;
use crate::loader::{loader_policy, with_permissive_loading, LoaderPolicy};

/// Metadata format version written by this build.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// Architecture name recorded for [`ConvClassifier`] checkpoints.
pub const CONV_CLASSIFIER_ARCH: &str = "ConvClassifier";

/// Model checkpoint metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Model architecture name.
    pub arch: String,
    /// Metadata format version.
    pub format_version: u32,
    /// Architecture configuration.
    pub config: ConvClassifierConfig,
    /// Class labels, one per output.
    pub labels: Vec<String>,
    /// Additional metadata.
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

impl CheckpointMetadata {
    /// Create metadata for a classifier built from `config`.
    ///
    /// Labels default to the pathology list when the class count matches it.
    pub fn new(config: ConvClassifierConfig) -> Self {
        let labels = if config.n_classes == crate::labels::PATHOLOGIES.len() {
            pathology_labels()
        } else {
            (0..config.n_classes).map(|i| format!("class_{i}")).collect()
        };
        Self {
            arch: CONV_CLASSIFIER_ARCH.to_string(),
            format_version: CHECKPOINT_FORMAT_VERSION,
            config,
            labels,
            extra: HashMap::new(),
        }
    }

    /// Set the class labels.
    #[must_use]
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    /// Add extra metadata.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Save metadata to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ModelError::Save(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| ModelError::Save(e.to_string()))?;
        Ok(())
    }

    /// Load metadata from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| ModelError::Load(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| ModelError::Load(e.to_string()))
    }

    /// Check the metadata against the active [`LoaderPolicy`].
    pub fn check_compatible(&self) -> Result<()> {
        if self.arch != CONV_CLASSIFIER_ARCH {
            return Err(ModelError::Load(format!(
                "unknown architecture '{}'",
                self.arch
            )));
        }
        if self.labels.len() != self.config.n_classes {
            return Err(ModelError::Load(format!(
                "{} labels for {} classes",
                self.labels.len(),
                self.config.n_classes
            )));
        }
        if self.format_version != CHECKPOINT_FORMAT_VERSION {
            match loader_policy() {
                LoaderPolicy::Strict => {
                    return Err(ModelError::UnsupportedVersion {
                        found: self.format_version,
                        expected: CHECKPOINT_FORMAT_VERSION,
                    });
                }
                LoaderPolicy::Permissive => tracing::warn!(
                    found = self.format_version,
                    expected = CHECKPOINT_FORMAT_VERSION,
                    "loading checkpoint from a different format version"
                ),
            }
        }
        self.config.validate()
    }
}

fn checkpoint_paths(path: &Path) -> (PathBuf, PathBuf) {
    (path.with_extension("mpk"), path.with_extension("json"))
}

/// Save a classifier and its metadata.
///
/// `path` is the checkpoint stem; any extension is replaced.
pub fn save_classifier<B: Backend>(
    model: &ConvClassifier<B>,
    metadata: &CheckpointMetadata,
    path: impl AsRef<Path>,
) -> Result<()> {
    let (weights, meta) = checkpoint_paths(path.as_ref());
    if let Some(parent) = weights.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .record(model.clone().into_record(), weights.clone())
        .map_err(|e| ModelError::Save(e.to_string()))?;
    metadata.save(&meta)?;

    tracing::info!(weights = %weights.display(), "saved classifier checkpoint");
    Ok(())
}

/// Load a classifier under the active [`LoaderPolicy`].
pub fn load_checkpoint<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(ConvClassifier<B>, CheckpointMetadata)> {
    let (weights, meta) = checkpoint_paths(path.as_ref());
    let metadata = CheckpointMetadata::load(&meta)?;
    metadata.check_compatible()?;

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let record = recorder
        .load(weights.clone(), device)
        .map_err(|e| ModelError::Load(e.to_string()))?;
    let model = metadata.config.init::<B>(device).load_record(record);

    tracing::info!(
        weights = %weights.display(),
        classes = metadata.config.n_classes,
        "loaded classifier checkpoint"
    );
    Ok((model, metadata))
}

/// Load a classifier with permissive loading in effect.
///
/// The override is scoped to this call and released even when loading fails.
pub fn load_classifier<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(ConvClassifier<B>, CheckpointMetadata)> {
    with_permissive_loading(|| load_checkpoint(path, device))
}

//! # camlens
//!
//! Visual explanations for convolutional image classifiers.
//!
//! camlens answers "where did the model look?" for a single image:
//!
//! - **Capture**: record one layer's activation and its gradient during a
//!   single forward/backward pass
//! - **Grad-CAM**: weight activation channels by their mean gradient, rectify
//!   and normalize into a saliency map
//! - **Overlay**: upsample the map, colour it with the jet colour map and
//!   blend it over the original image
//! - **Captions**: describe the findings in plain language, through a local
//!   text-generation service or an offline template
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use camlens::prelude::*;
//!
//! let device = Default::default();
//! let (model, metadata) = load_classifier::<CpuAutodiff>("weights/chest", &device)?;
//!
//! let image = load_image("chest.png")?;
//! let input = Preprocessor::from_config(&metadata.config)?.tensor(&image, &device);
//!
//! let mut model = Hooked::new(model);
//! let probabilities = predict(&mut model, input.clone())?;
//!
//! let mut cam = GradCam::new(model, &metadata.config.target_layer())?;
//! cam.set_input(input);
//! let map = cam.generate(8)?;
//! composite(&image, &map)?.save("overlay.png")?;
//!
//! let caption = select_captioner(&CaptionConfig::default())
//!     .caption(&probabilities, &metadata.labels)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default, via `camlens_core`): CPU backend using ndarray

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use camlens_caption as caption;
pub use camlens_core as core;
pub use camlens_explain as explain;
pub use camlens_models as models;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use camlens::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use camlens_core::backend::CpuAutodiff;
    pub use camlens_core::{
        ActivationShape, CoreError, HookHandle, Hooked, LayerTap, ObservableModel, TappedModule,
    };

    // Models
    pub use camlens_models::{
        load_classifier, load_image, predict, save_classifier, top_k, with_permissive_loading,
        CheckpointMetadata, ConvClassifier, ConvClassifierConfig, ModelError, PermissiveLoading,
        Preprocessor, PATHOLOGIES,
    };

    // Explanations
    pub use camlens_explain::{
        composite, compute_saliency, ActivationGradientCapture, ExplainError, GradCam, SaliencyMap,
    };

    // Captions
    pub use camlens_caption::{
        select_captioner, CaptionConfig, CaptionError, Captioner, OllamaCaptioner,
        TemplateCaptioner,
    };
}

//! # camlens_explain
//!
//! Grad-CAM visual explanations for convolutional classifiers.
//!
//! This crate provides:
//! - [`ActivationGradientCapture`]: records one layer's activation and gradient
//! - [`GradCam`]: turns a captured pair and a target class into a [`SaliencyMap`]
//! - Heatmap overlays: resize, jet colouring and blending over the source image
//!
//! ## Example
//!
//! ```rust,ignore
//! use camlens_core::Hooked;
//! use camlens_explain::{composite, GradCam};
//!
//! let mut cam = GradCam::new(Hooked::new(classifier), "features.block3")?;
//! cam.set_input(input);
//! let map = cam.generate(class_idx)?;
//! let overlay = composite(&image, &map)?;
//! overlay.save("overlay.png")?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod capture;
mod colormap;
mod error;
mod gradcam;
mod overlay;
mod saliency;

pub use capture::ActivationGradientCapture;
pub use colormap::{jet, quantize};
pub use error::{ExplainError, Result};
pub use gradcam::GradCam;
pub use overlay::{blend, colorize, composite, resize_map, HEATMAP_WEIGHT, IMAGE_WEIGHT};
pub use saliency::{
    compute_saliency, grad_cam_breakdown, CamBreakdown, SaliencyMap, NORMALIZATION_EPSILON,
};

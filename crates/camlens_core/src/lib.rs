//! # camlens_core
//!
//! Core types and traits for camlens visual explanations.
//!
//! This crate provides:
//! - [`ObservableModel`], the surface explainability code drives: forward,
//!   gradient reset, backward from a scalar, and layer hooks
//! - [`TappedModule`] and [`LayerTap`] for modules that name their layers
//! - [`HookRegistry`] and the [`Hooked`] wrapper that implements [`ObservableModel`]
//! - [`ActivationShape`] for `(C, H, W)` activation metadata
//! - Error types and backend aliases
//!
//! ## Example
//!
//! ```rust,ignore
//! use camlens_core::{Hooked, ObservableModel};
//!
//! let mut model = Hooked::new(classifier);
//! println!("observable layers: {:?}", model.layer_names());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hooks;
mod model_trait;
mod shape;

pub use error::{CoreError, Result};
pub use hooks::{BackwardHook, ForwardHook, HookHandle, HookKind, HookRegistry, Hooked};
pub use model_trait::{LayerTap, NoTap, ObservableModel, TappedModule};
pub use shape::ActivationShape;

/// Backend type aliases for convenience
pub mod backend {
    pub use burn_autodiff::Autodiff;

    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;

    /// CPU backend with gradient tracking, used for Grad-CAM evaluation.
    #[cfg(feature = "backend-ndarray")]
    pub type CpuAutodiff = Autodiff<NdArray>;
}

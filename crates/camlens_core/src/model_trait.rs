//! Model traits for observable evaluation.
//!
//! A classifier exposes a set of named internal layers. During a forward pass it
//! hands each named layer output to a [`LayerTap`], which may observe it and
//! must return a tensor with identical values. [`ObservableModel`] is the
//! surface explainability code drives: forward, gradient reset, backward from a
//! scalar score, and hook registration on a named layer.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::error::Result;
use crate::hooks::{BackwardHook, ForwardHook, HookHandle};

/// Receives named layer outputs during a forward pass.
pub trait LayerTap<B: Backend> {
    /// Observe the output of `layer` and return the tensor the model should continue with.
    ///
    /// Implementations must not change the values of `output`.
    fn tap(&mut self, layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// A tap that observes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTap;

impl<B: Backend> LayerTap<B> for NoTap {
    fn tap(&mut self, _layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
        output
    }
}

/// A module whose forward pass reports named layer outputs to a [`LayerTap`].
pub trait TappedModule<B: Backend> {
    /// Names of the observable layers, in forward order.
    fn layer_names(&self) -> Vec<String>;

    /// Number of input channels the module expects, if it is fixed.
    fn input_channels(&self) -> Option<usize> {
        None
    }

    /// Forward pass returning per-class scores.
    ///
    /// # Arguments
    ///
    /// * `input` - Image tensor of shape (batch, channels, height, width)
    /// * `tap` - Receives every named layer output
    ///
    /// # Returns
    ///
    /// Scores tensor of shape (batch, n_classes)
    fn forward_tapped(&self, input: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 2>;
}

/// A classifier that supports layer observers and backward propagation from a score.
pub trait ObservableModel<B: AutodiffBackend> {
    /// Names of the layers hooks may be registered on.
    fn layer_names(&self) -> Vec<String>;

    /// Run a forward evaluation, firing forward hooks.
    ///
    /// Returns scores of shape (batch, n_classes).
    fn forward(&mut self, input: Tensor<B, 4>) -> Result<Tensor<B, 2>>;

    /// Discard gradient state left by earlier backward passes.
    fn zero_grad(&mut self);

    /// Backpropagate from a single-element score tensor, firing backward hooks.
    fn backward(&mut self, score: Tensor<B, 1>) -> Result<()>;

    /// Register an observer for the output of `layer` on every forward pass.
    fn register_forward_hook(&mut self, layer: &str, hook: ForwardHook<B>) -> Result<HookHandle>;

    /// Register an observer for the gradient delivered to `layer` on every backward pass.
    fn register_backward_hook(&mut self, layer: &str, hook: BackwardHook<B>)
        -> Result<HookHandle>;

    /// Remove a previously registered hook. Returns `false` if the handle was unknown.
    fn remove_hook(&mut self, handle: HookHandle) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NdArray;

    #[test]
    fn test_no_tap_is_identity() {
        let device = Default::default();
        let x = Tensor::<NdArray, 4>::ones([1, 2, 3, 3], &device);
        let out = NoTap.tap("features.block0", x.clone());
        let diff: f32 = (out - x).abs().sum().into_scalar().elem();
        assert_eq!(diff, 0.0);
    }
}

//! Activation and gradient capture for a single layer.

use std::sync::Arc;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use parking_lot::Mutex;

use camlens_core::{HookHandle, ObservableModel};

use crate::error::{ExplainError, Result};

type Inner<B> = <B as AutodiffBackend>::InnerBackend;

#[derive(Debug)]
struct CaptureState<B: Backend> {
    activation: Option<Tensor<B, 4>>,
    gradient: Option<Tensor<B, 4>>,
    activation_fresh: bool,
    gradient_fresh: bool,
    /// Set by a forward pass, cleared by the first gradient delivered after it.
    awaiting_gradient: bool,
}

impl<B: Backend> Default for CaptureState<B> {
    fn default() -> Self {
        Self {
            activation: None,
            gradient: None,
            activation_fresh: false,
            gradient_fresh: false,
            awaiting_gradient: false,
        }
    }
}

impl<B: Backend> CaptureState<B> {
    fn invalidate(&mut self) {
        self.activation_fresh = false;
        self.gradient_fresh = false;
        self.awaiting_gradient = false;
    }
}

/// Records one layer's forward output and the gradient delivered to it.
///
/// The activation is overwritten on every forward evaluation. The gradient is
/// the first one delivered after the most recent forward evaluation; a forward
/// pass makes the previous gradient stale until a new backward pass runs.
/// Re-attaching replaces the observers instead of stacking them.
#[derive(Debug)]
pub struct ActivationGradientCapture<B: AutodiffBackend> {
    layer: Option<String>,
    handles: Vec<HookHandle>,
    state: Arc<Mutex<CaptureState<Inner<B>>>>,
}

impl<B: AutodiffBackend> ActivationGradientCapture<B> {
    /// Create a detached capture.
    pub fn new() -> Self {
        Self {
            layer: None,
            handles: Vec::new(),
            state: Arc::new(Mutex::new(CaptureState::default())),
        }
    }

    /// Observe `layer` on `model`.
    ///
    /// Any observers this capture registered earlier are removed first, so at
    /// most one forward and one backward observer are active. Previously
    /// captured tensors stay in place but are stale until the next forward and
    /// backward passes.
    pub fn attach<M: ObservableModel<B>>(&mut self, model: &mut M, layer: &str) -> Result<()> {
        self.detach(model);

        let forward_state = Arc::clone(&self.state);
        let forward = model.register_forward_hook(
            layer,
            Box::new(move |output: &Tensor<Inner<B>, 4>| {
                let mut state = forward_state.lock();
                state.activation = Some(output.clone());
                state.activation_fresh = true;
                state.gradient_fresh = false;
                state.awaiting_gradient = true;
            }),
        )?;

        let backward_state = Arc::clone(&self.state);
        let backward = match model.register_backward_hook(
            layer,
            Box::new(move |grad: &Tensor<Inner<B>, 4>| {
                let mut state = backward_state.lock();
                if state.awaiting_gradient {
                    state.gradient = Some(grad.clone());
                    state.gradient_fresh = true;
                    state.awaiting_gradient = false;
                }
            }),
        ) {
            Ok(handle) => handle,
            Err(err) => {
                model.remove_hook(forward);
                return Err(err.into());
            }
        };

        self.handles = vec![forward, backward];
        self.layer = Some(layer.to_string());
        tracing::debug!(layer, "capture attached");
        Ok(())
    }

    /// Remove this capture's observers from `model` and mark captured tensors stale.
    pub fn detach<M: ObservableModel<B>>(&mut self, model: &mut M) {
        for handle in self.handles.drain(..) {
            model.remove_hook(handle);
        }
        if let Some(layer) = self.layer.take() {
            tracing::debug!(layer = %layer, "capture detached");
        }
        self.state.lock().invalidate();
    }

    /// Mark captured tensors stale without touching the observers.
    pub(crate) fn invalidate(&self) {
        self.state.lock().invalidate();
    }

    /// The observed layer, if attached.
    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    /// Check whether observers are registered.
    pub fn is_attached(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Check whether a fresh activation is available.
    pub fn has_activation(&self) -> bool {
        self.state.lock().activation_fresh
    }

    /// Check whether a fresh gradient is available.
    pub fn has_gradient(&self) -> bool {
        self.state.lock().gradient_fresh
    }

    /// The activation from the most recent forward pass, shape (batch, C, H, W).
    pub fn activation(&self) -> Result<Tensor<Inner<B>, 4>> {
        let state = self.state.lock();
        match (&state.activation, state.activation_fresh) {
            (Some(activation), true) => Ok(activation.clone()),
            _ => Err(ExplainError::NotReady(format!(
                "no activation captured for layer {:?} since the last attach",
                self.layer
            ))),
        }
    }

    /// The gradient delivered after the most recent forward pass, shape (batch, C, H, W).
    pub fn gradient(&self) -> Result<Tensor<Inner<B>, 4>> {
        let state = self.state.lock();
        match (&state.gradient, state.gradient_fresh) {
            (Some(gradient), true) => Ok(gradient.clone()),
            _ => Err(ExplainError::NotReady(format!(
                "no gradient captured for layer {:?} since the last forward pass",
                self.layer
            ))),
        }
    }
}

impl<B: AutodiffBackend> Default for ActivationGradientCapture<B> {
    fn default() -> Self {
        Self::new()
    }
}

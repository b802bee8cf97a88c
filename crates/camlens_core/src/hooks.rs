//! Layer hooks: forward/backward observers keyed by layer name.
//!
//! Forward hooks receive the layer output on the inner (non-autodiff) backend.
//! Backward hooks receive the gradient of the backward root with respect to the
//! layer output. The gradient is obtained by adding a zero-valued, gradient
//! tracked probe to the observed output: the sum has the same values, the
//! upstream graph is untouched, and the probe's gradient equals the gradient
//! flowing into the layer output.

use std::fmt;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::error::{CoreError, Result};
use crate::model_trait::{LayerTap, ObservableModel, TappedModule};

/// Observer for a layer output.
pub type ForwardHook<B> = Box<dyn FnMut(&Tensor<<B as AutodiffBackend>::InnerBackend, 4>) + Send>;

/// Observer for the gradient delivered to a layer output.
pub type BackwardHook<B> =
    Box<dyn FnMut(&Tensor<<B as AutodiffBackend>::InnerBackend, 4>) + Send>;

/// Which event a hook subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Layer output produced.
    Forward,
    /// Gradient delivered to the layer output.
    Backward,
}

/// Opaque handle returned by hook registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle {
    id: u64,
    kind: HookKind,
}

impl HookHandle {
    /// The event this hook subscribes to.
    #[must_use]
    pub const fn kind(&self) -> HookKind {
        self.kind
    }
}

struct Entry<H> {
    id: u64,
    layer: String,
    hook: H,
}

/// Forward/backward hooks for the named layers of one model.
pub struct HookRegistry<B: AutodiffBackend> {
    forward: Vec<Entry<ForwardHook<B>>>,
    backward: Vec<Entry<BackwardHook<B>>>,
    probes: Vec<(String, Tensor<B, 4>)>,
    next_id: u64,
}

impl<B: AutodiffBackend> HookRegistry<B> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            forward: Vec::new(),
            backward: Vec::new(),
            probes: Vec::new(),
            next_id: 0,
        }
    }

    fn next_handle(&mut self, kind: HookKind) -> HookHandle {
        let id = self.next_id;
        self.next_id += 1;
        HookHandle { id, kind }
    }

    /// Register a forward hook on `layer`.
    pub fn add_forward(&mut self, layer: &str, hook: ForwardHook<B>) -> HookHandle {
        let handle = self.next_handle(HookKind::Forward);
        self.forward.push(Entry {
            id: handle.id,
            layer: layer.to_string(),
            hook,
        });
        tracing::debug!(layer, id = handle.id, "registered forward hook");
        handle
    }

    /// Register a backward hook on `layer`.
    pub fn add_backward(&mut self, layer: &str, hook: BackwardHook<B>) -> HookHandle {
        let handle = self.next_handle(HookKind::Backward);
        self.backward.push(Entry {
            id: handle.id,
            layer: layer.to_string(),
            hook,
        });
        tracing::debug!(layer, id = handle.id, "registered backward hook");
        handle
    }

    /// Remove a hook. Returns `false` if the handle is unknown.
    pub fn remove(&mut self, handle: HookHandle) -> bool {
        let before;
        let after;
        match handle.kind {
            HookKind::Forward => {
                before = self.forward.len();
                self.forward.retain(|entry| entry.id != handle.id);
                after = self.forward.len();
            }
            HookKind::Backward => {
                before = self.backward.len();
                self.backward.retain(|entry| entry.id != handle.id);
                after = self.backward.len();
                let backward = &self.backward;
                self.probes
                    .retain(|(layer, _)| backward.iter().any(|entry| &entry.layer == layer));
            }
        }
        before != after
    }

    /// Number of hooks currently registered on `layer`.
    pub fn count(&self, layer: &str, kind: HookKind) -> usize {
        match kind {
            HookKind::Forward => self.forward.iter().filter(|e| e.layer == layer).count(),
            HookKind::Backward => self.backward.iter().filter(|e| e.layer == layer).count(),
        }
    }

    /// Check whether any hook is registered.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.backward.is_empty()
    }

    /// Drop gradient probes left by the last forward pass.
    pub fn clear_probes(&mut self) {
        self.probes.clear();
    }

    /// Deliver gradients from a finished backward pass to backward hooks.
    ///
    /// Probes are consumed: a second call without a new forward pass delivers nothing.
    pub fn dispatch_backward(&mut self, grads: &B::Gradients) {
        let probes = std::mem::take(&mut self.probes);
        for (layer, probe) in probes {
            let Some(grad) = probe.grad(grads) else {
                tracing::debug!(layer = %layer, "no gradient reached layer");
                continue;
            };
            for entry in self.backward.iter_mut().filter(|e| e.layer == layer) {
                (entry.hook)(&grad);
            }
        }
    }
}

impl<B: AutodiffBackend> Default for HookRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: AutodiffBackend> fmt::Debug for HookRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("forward", &self.forward.len())
            .field("backward", &self.backward.len())
            .field("pending_probes", &self.probes.len())
            .finish()
    }
}

impl<B: AutodiffBackend> LayerTap<B> for HookRegistry<B> {
    fn tap(&mut self, layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
        if self.forward.iter().any(|e| e.layer == layer) {
            let observed = output.clone().inner();
            for entry in self.forward.iter_mut().filter(|e| e.layer == layer) {
                (entry.hook)(&observed);
            }
        }

        if self.backward.iter().any(|e| e.layer == layer) {
            let probe = output.zeros_like().require_grad();
            self.probes.push((layer.to_string(), probe.clone()));
            return output + probe;
        }

        output
    }
}

/// A [`TappedModule`] paired with a hook registry, implementing [`ObservableModel`].
///
/// # Example
///
/// ```rust,ignore
/// use camlens_core::{Hooked, ObservableModel};
///
/// let mut model = Hooked::new(classifier);
/// let handle = model.register_forward_hook("features.block3", Box::new(|out| {
///     println!("activation dims: {:?}", out.dims());
/// }))?;
/// let scores = model.forward(input)?;
/// ```
pub struct Hooked<B: AutodiffBackend, M> {
    module: M,
    hooks: HookRegistry<B>,
    gradients: Option<B::Gradients>,
}

impl<B: AutodiffBackend, M: TappedModule<B>> Hooked<B, M> {
    /// Wrap a module with an empty hook registry.
    pub fn new(module: M) -> Self {
        Self {
            module,
            hooks: HookRegistry::new(),
            gradients: None,
        }
    }

    /// Get a reference to the wrapped module.
    pub fn module(&self) -> &M {
        &self.module
    }

    /// Consume self and return the wrapped module, dropping all hooks.
    pub fn into_inner(self) -> M {
        self.module
    }

    /// Get the hook registry.
    pub fn hooks(&self) -> &HookRegistry<B> {
        &self.hooks
    }

    /// Gradients from the most recent backward pass, if not reset since.
    pub fn gradients(&self) -> Option<&B::Gradients> {
        self.gradients.as_ref()
    }

    fn ensure_layer(&self, layer: &str) -> Result<()> {
        let names = self.module.layer_names();
        if names.iter().any(|name| name == layer) {
            Ok(())
        } else {
            Err(CoreError::UnknownLayer {
                name: layer.to_string(),
                available: names.join(", "),
            })
        }
    }
}

impl<B: AutodiffBackend, M: TappedModule<B>> ObservableModel<B> for Hooked<B, M> {
    fn layer_names(&self) -> Vec<String> {
        self.module.layer_names()
    }

    fn forward(&mut self, input: Tensor<B, 4>) -> Result<Tensor<B, 2>> {
        let dims = input.dims();
        if let Some(channels) = self.module.input_channels() {
            if dims[1] != channels {
                return Err(CoreError::ShapeMismatch {
                    expected: format!("(batch, {channels}, height, width)"),
                    got: format!("{dims:?}"),
                });
            }
        }
        if dims.iter().any(|&d| d == 0) {
            return Err(CoreError::InvalidInput(format!(
                "input tensor has an empty dimension: {dims:?}"
            )));
        }
        self.hooks.clear_probes();
        Ok(self.module.forward_tapped(input, &mut self.hooks))
    }

    fn zero_grad(&mut self) {
        self.gradients = None;
        self.hooks.clear_probes();
    }

    fn backward(&mut self, score: Tensor<B, 1>) -> Result<()> {
        let [n] = score.dims();
        if n != 1 {
            return Err(CoreError::shape_mismatch([1], [n]));
        }
        let grads = score.backward();
        self.hooks.dispatch_backward(&grads);
        self.gradients = Some(grads);
        Ok(())
    }

    fn register_forward_hook(&mut self, layer: &str, hook: ForwardHook<B>) -> Result<HookHandle> {
        self.ensure_layer(layer)?;
        Ok(self.hooks.add_forward(layer, hook))
    }

    fn register_backward_hook(
        &mut self,
        layer: &str,
        hook: BackwardHook<B>,
    ) -> Result<HookHandle> {
        self.ensure_layer(layer)?;
        Ok(self.hooks.add_backward(layer, hook))
    }

    fn remove_hook(&mut self, handle: HookHandle) -> bool {
        self.hooks.remove(handle)
    }
}

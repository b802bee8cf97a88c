//! Grad-CAM over an observable classifier.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use camlens_core::{ActivationShape, ObservableModel};

use crate::capture::ActivationGradientCapture;
use crate::error::{ExplainError, Result};
use crate::saliency::{grad_cam_breakdown, CamBreakdown, SaliencyMap};

/// Builds Grad-CAM saliency maps for one observed layer of a classifier.
///
/// Each call to [`GradCam::generate`] resets gradients, runs a forward pass on
/// the held input, backpropagates from the target class score and combines
/// the captured activation and gradient. Only the first image of a batch is
/// explained.
///
/// # Example
///
/// ```rust,ignore
/// use camlens_explain::GradCam;
///
/// let mut cam = GradCam::new(Hooked::new(classifier), "features.block3")?;
/// cam.set_input(input);
/// let map = cam.generate(8)?;
/// ```
pub struct GradCam<B: AutodiffBackend, M: ObservableModel<B>> {
    model: M,
    capture: ActivationGradientCapture<B>,
    input: Option<Tensor<B, 4>>,
}

impl<B: AutodiffBackend, M: ObservableModel<B>> GradCam<B, M> {
    /// Attach to `layer` of `model`.
    pub fn new(mut model: M, layer: &str) -> Result<Self> {
        let mut capture = ActivationGradientCapture::new();
        capture.attach(&mut model, layer)?;
        Ok(Self {
            model,
            capture,
            input: None,
        })
    }

    /// Observe a different layer. The previous layer's observers are removed.
    pub fn retarget(&mut self, layer: &str) -> Result<()> {
        self.capture.attach(&mut self.model, layer)
    }

    /// Store the input for subsequent [`GradCam::generate`] calls.
    ///
    /// The tensor is used as given; preprocessing is the caller's responsibility.
    pub fn set_input(&mut self, input: Tensor<B, 4>) {
        self.input = Some(input);
    }

    /// The held input, if set.
    pub fn input(&self) -> Option<&Tensor<B, 4>> {
        self.input.as_ref()
    }

    /// The observed layer.
    pub fn layer(&self) -> Option<&str> {
        self.capture.layer()
    }

    /// The activation/gradient capture.
    pub fn capture(&self) -> &ActivationGradientCapture<B> {
        &self.capture
    }

    /// Get a reference to the model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Get a mutable reference to the model.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Detach the capture and return the model.
    pub fn into_model(mut self) -> M {
        self.capture.detach(&mut self.model);
        self.model
    }

    /// Compute the saliency map for `class_idx`.
    ///
    /// # Errors
    ///
    /// - [`ExplainError::NotReady`] if no input was set or nothing was captured
    /// - [`ExplainError::ClassIndexOutOfRange`] if the model has no such class
    /// - [`ExplainError::Core`] for model evaluation failures
    pub fn generate(&mut self, class_idx: usize) -> Result<SaliencyMap> {
        Ok(self.generate_detailed(class_idx)?.saliency)
    }

    /// Compute the saliency map for `class_idx` together with its channel weights and raw map.
    pub fn generate_detailed(&mut self, class_idx: usize) -> Result<CamBreakdown> {
        let input = self.input.clone().ok_or_else(|| {
            ExplainError::NotReady("set_input must be called before generate".to_string())
        })?;

        self.model.zero_grad();
        self.capture.invalidate();

        let scores = self.model.forward(input)?;
        let [batch, n_classes] = scores.dims();
        if class_idx >= n_classes {
            return Err(ExplainError::ClassIndexOutOfRange {
                index: class_idx,
                n_classes,
            });
        }
        if batch > 1 {
            tracing::debug!(batch, "explaining the first image of the batch only");
        }

        let score = scores.slice([0..1, class_idx..class_idx + 1]).sum();
        self.model.backward(score)?;

        let activation = self.capture.activation()?;
        let gradient = self.capture.gradient()?;
        let shape = ActivationShape::from_batched_dims(&activation.dims())?;
        let gradient_dims = gradient.dims();
        if gradient_dims[1..] != shape.as_array() {
            return Err(ExplainError::shape_mismatch(
                activation.dims(),
                gradient_dims,
            ));
        }

        let [channels, height, width] = shape.as_array();
        let activation = activation
            .slice([0..1, 0..channels, 0..height, 0..width])
            .reshape([channels, height, width]);
        let gradient = gradient
            .slice([0..1, 0..channels, 0..height, 0..width])
            .reshape([channels, height, width]);

        let mut breakdown = grad_cam_breakdown(activation, gradient)?;
        breakdown.saliency.target_class = Some(class_idx);

        tracing::debug!(
            layer = ?self.capture.layer(),
            class_idx,
            shape = %shape,
            max_raw = breakdown.raw_map.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            "grad-cam generated"
        );
        Ok(breakdown)
    }
}

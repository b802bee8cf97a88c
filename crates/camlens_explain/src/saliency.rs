//! Saliency maps and the Grad-CAM weighting.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ExplainError, Result};

/// Added to the map maximum before dividing, so an all-zero map stays all zero.
pub const NORMALIZATION_EPSILON: f32 = 1e-8;

/// A single-channel importance map over spatial positions, row-major.
///
/// Maps produced by Grad-CAM are non-negative and min-max normalized into `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaliencyMap {
    height: usize,
    width: usize,
    values: Vec<f32>,
    /// Class the map explains, when known.
    pub target_class: Option<usize>,
}

impl SaliencyMap {
    /// Create a map from row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`ExplainError::EmptyMap`] for a zero-area map and
    /// [`ExplainError::ShapeMismatch`] if `values.len() != height * width`.
    pub fn new(height: usize, width: usize, values: Vec<f32>) -> Result<Self> {
        if height == 0 || width == 0 {
            return Err(ExplainError::EmptyMap(format!("{height}x{width}")));
        }
        if values.len() != height * width {
            return Err(ExplainError::shape_mismatch(height * width, values.len()));
        }
        Ok(Self {
            height,
            width,
            values,
            target_class: None,
        })
    }

    /// Create a map filled with one value.
    pub fn filled(height: usize, width: usize, value: f32) -> Result<Self> {
        Self::new(height, width, vec![value; height * width])
    }

    /// Set the target class.
    #[must_use]
    pub fn with_target_class(mut self, class: usize) -> Self {
        self.target_class = Some(class);
        self
    }

    /// Map height.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Map width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Row-major values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Consume the map and return its values.
    #[must_use]
    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    /// Value at (`row`, `col`), if in bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.height && col < self.width {
            Some(self.values[row * self.width + col])
        } else {
            None
        }
    }

    /// Smallest value.
    #[must_use]
    pub fn min(&self) -> f32 {
        self.values.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Largest value.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Mean value.
    #[must_use]
    pub fn mean(&self) -> f32 {
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    /// Check whether every value is exactly zero.
    #[must_use]
    pub fn is_uniform_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }
}

/// Intermediate results of one Grad-CAM computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CamBreakdown {
    /// Spatial mean of the gradient, one weight per channel.
    pub channel_weights: Vec<f32>,
    /// Weighted channel sum before rectification, row-major `H * W`.
    pub raw_map: Vec<f32>,
    /// Rectified, min-max normalized map.
    pub saliency: SaliencyMap,
}

fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| ExplainError::Tensor(format!("{e:?}")))
}

/// Compute the Grad-CAM map for one image.
///
/// # Arguments
///
/// * `activations` - Layer output of shape (channels, height, width)
/// * `gradients` - Gradient of the target score w.r.t. the layer output, same shape
///
/// # Returns
///
/// The channel weights, the raw weighted sum and the normalized map.
pub fn grad_cam_breakdown<B: Backend>(
    activations: Tensor<B, 3>,
    gradients: Tensor<B, 3>,
) -> Result<CamBreakdown> {
    let [channels, height, width] = activations.dims();
    if gradients.dims() != [channels, height, width] {
        return Err(ExplainError::shape_mismatch(
            [channels, height, width],
            gradients.dims(),
        ));
    }
    if channels == 0 || height == 0 || width == 0 {
        return Err(ExplainError::EmptyMap(format!(
            "activation shape ({channels}, {height}, {width})"
        )));
    }
    let spatial = height * width;

    // Global average pool the gradients: (C, H*W) -> (C, 1)
    let weights = gradients.reshape([channels, spatial]).mean_dim(1);

    // Weighted sum over channels: (C, H*W) * (C, 1) -> (1, H*W)
    let raw = (activations.reshape([channels, spatial]) * weights.clone()).sum_dim(0);

    // ReLU
    let rectified = raw.clone().clamp_min(0.0);

    let min: f32 = rectified.clone().min().into_scalar().elem();
    let shifted = rectified - min;
    let max: f32 = shifted.clone().max().into_scalar().elem();
    let normalized = shifted / (max + NORMALIZATION_EPSILON);

    Ok(CamBreakdown {
        channel_weights: to_vec(weights)?,
        raw_map: to_vec(raw)?,
        saliency: SaliencyMap::new(height, width, to_vec(normalized)?)?,
    })
}

/// Compute the normalized Grad-CAM map for one image.
///
/// See [`grad_cam_breakdown`].
pub fn compute_saliency<B: Backend>(
    activations: Tensor<B, 3>,
    gradients: Tensor<B, 3>,
) -> Result<SaliencyMap> {
    Ok(grad_cam_breakdown(activations, gradients)?.saliency)
}

#[cfg(test)]
mod tests {
    use burn_ndarray::NdArray;

    use super::*;

    type TestBackend = NdArray;

    fn tensor(values: &[f32], dims: [usize; 3]) -> Tensor<TestBackend, 3> {
        let device = Default::default();
        Tensor::<TestBackend, 1>::from_floats(values, &device).reshape(dims)
    }

    #[test]
    fn test_saliency_map_rejects_bad_length() {
        let err = SaliencyMap::new(2, 2, vec![0.0; 3]).unwrap_err();
        assert!(matches!(err, ExplainError::ShapeMismatch { .. }));
        let err = SaliencyMap::new(0, 2, vec![]).unwrap_err();
        assert!(matches!(err, ExplainError::EmptyMap(_)));
    }

    #[test]
    fn test_saliency_map_accessors() {
        let map = SaliencyMap::new(2, 3, vec![0.0, 0.5, 1.0, 0.25, 0.75, 0.5])
            .unwrap()
            .with_target_class(4);
        assert_eq!(map.get(1, 1), Some(0.75));
        assert_eq!(map.get(2, 0), None);
        assert_eq!(map.min(), 0.0);
        assert_eq!(map.max(), 1.0);
        assert!((map.mean() - 0.5).abs() < 1e-6);
        assert_eq!(map.target_class, Some(4));
        assert!(!map.is_uniform_zero());
    }

    #[test]
    fn test_grad_cam_normalises_heatmap() {
        // channel 0 constant, channel 1 ramps; only channel 1's gradient varies.
        let activations = tensor(&[1.0, 1.0, 1.0, 1.0, 0.5, 1.0, 1.5, 2.0], [2, 2, 2]);
        let gradients = tensor(&[1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.4], [2, 2, 2]);

        let breakdown = grad_cam_breakdown(activations, gradients).unwrap();

        assert!((breakdown.channel_weights[0] - 1.0).abs() < 1e-6);
        assert!((breakdown.channel_weights[1] - 0.1).abs() < 1e-6);
        let expected_raw = [1.05, 1.1, 1.15, 1.2];
        for (value, expected) in breakdown.raw_map.iter().zip(expected_raw) {
            assert!((value - expected).abs() < 1e-6);
        }
        let expected = [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0];
        for (value, expected) in breakdown.saliency.values().iter().zip(expected) {
            assert!((value - expected).abs() < 1e-5);
        }
        assert_eq!(breakdown.saliency.height(), 2);
        assert_eq!(breakdown.saliency.width(), 2);
    }

    #[test]
    fn test_negative_contributions_are_rectified() {
        let activations = tensor(&[1.0, 2.0, 3.0, 4.0], [1, 2, 2]);
        let gradients = tensor(&[-1.0, -1.0, -1.0, -1.0], [1, 2, 2]);

        let breakdown = grad_cam_breakdown(activations, gradients).unwrap();

        assert!(breakdown.raw_map.iter().all(|&v| v < 0.0));
        assert!(breakdown.saliency.is_uniform_zero());
        assert!(breakdown.saliency.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_values_in_unit_interval_with_zero_minimum() {
        let activations = tensor(
            &[0.3, -1.2, 2.5, 0.0, 1.1, 0.7, -0.4, 3.3, 0.9, -2.0, 1.5, 0.2],
            [3, 2, 2],
        );
        let gradients = tensor(
            &[0.5, 0.1, -0.2, 0.3, -0.6, 0.4, 0.2, 0.1, 0.05, 0.2, -0.1, 0.0],
            [3, 2, 2],
        );

        let map = compute_saliency(activations, gradients).unwrap();

        assert!(map.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(map.min(), 0.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let activations = tensor(&[0.0; 8], [2, 2, 2]);
        let gradients = tensor(&[0.0; 8], [2, 1, 4]);
        let err = compute_saliency(activations, gradients).unwrap_err();
        assert!(matches!(err, ExplainError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_saliency_map_serde() {
        let map = SaliencyMap::filled(1, 2, 0.5).unwrap().with_target_class(1);
        let json = serde_json::to_string(&map).unwrap();
        let decoded: SaliencyMap = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, map);
    }
}

//! Class probabilities from observable models.

use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::AutodiffBackend;

use camlens_core::{CoreError, ObservableModel};

use crate::error::Result;

/// Per-class sigmoid probabilities for the first image of `input`.
///
/// The forward pass goes through the model's hooks like any other, so
/// attached observers see this evaluation.
pub fn predict<B, M>(model: &mut M, input: Tensor<B, 4>) -> Result<Vec<f32>>
where
    B: AutodiffBackend,
    M: ObservableModel<B>,
{
    let scores = model.forward(input)?;
    let [_, n_classes] = scores.dims();
    let first = scores.inner().slice([0..1, 0..n_classes]);

    let probabilities = sigmoid(first)
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| CoreError::Tensor(format!("{e:?}")))?;
    tracing::debug!(n_classes, "computed class probabilities");
    Ok(probabilities)
}

/// Indices and values of the `k` largest probabilities, highest first.
pub fn top_k(probabilities: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(k);
    ranked
}

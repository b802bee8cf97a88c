//! Convolutional image classifier with observable blocks.
//!
//! The network consists of stacked convolutional blocks (Conv2d -> ReLU) with
//! 2x2 max pooling between them, followed by global average pooling and a
//! linear classifier. Every block output is an observable layer named
//! `features.block{i}`; the last block is the usual Grad-CAM target.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{MaxPool2d, MaxPool2dConfig},
    Linear, LinearConfig, PaddingConfig2d, Relu,
};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use camlens_core::{LayerTap, TappedModule};

use crate::error::{ModelError, Result};
use crate::labels::PATHOLOGIES;

/// Name of the observable output of block `index`.
pub fn block_name(index: usize) -> String {
    format!("features.block{index}")
}

/// Configuration for the [`ConvClassifier`] model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvClassifierConfig {
    /// Number of input image channels.
    pub in_channels: usize,
    /// Side length of the square input image.
    pub input_size: usize,
    /// Output channels of each convolutional block.
    pub block_channels: Vec<usize>,
    /// Kernel size of every convolution (odd).
    pub kernel_size: usize,
    /// Number of output classes.
    pub n_classes: usize,
}

impl Default for ConvClassifierConfig {
    fn default() -> Self {
        Self {
            in_channels: 1,
            input_size: 224,
            block_channels: vec![16, 32, 64, 64],
            kernel_size: 3,
            n_classes: PATHOLOGIES.len(),
        }
    }
}

impl ConvClassifierConfig {
    /// Create a new config with specified dimensions.
    pub fn new(in_channels: usize, input_size: usize, n_classes: usize) -> Self {
        Self {
            in_channels,
            input_size,
            n_classes,
            ..Default::default()
        }
    }

    /// Set the output channels of each block.
    #[must_use]
    pub fn with_blocks(mut self, block_channels: Vec<usize>) -> Self {
        self.block_channels = block_channels;
        self
    }

    /// Set the convolution kernel size.
    #[must_use]
    pub fn with_kernel_size(mut self, kernel_size: usize) -> Self {
        self.kernel_size = kernel_size;
        self
    }

    /// Check that the configuration describes a buildable network.
    pub fn validate(&self) -> Result<()> {
        if self.in_channels == 0 || self.n_classes == 0 {
            return Err(ModelError::InvalidConfig(
                "in_channels and n_classes must be non-zero".to_string(),
            ));
        }
        if self.block_channels.is_empty() || self.block_channels.contains(&0) {
            return Err(ModelError::InvalidConfig(format!(
                "block_channels must be non-empty and non-zero, got {:?}",
                self.block_channels
            )));
        }
        if self.kernel_size % 2 == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "kernel_size must be odd, got {}",
                self.kernel_size
            )));
        }
        let downsample = 1usize << (self.block_channels.len() - 1);
        if self.input_size < downsample {
            return Err(ModelError::InvalidConfig(format!(
                "input_size {} is too small for {} pooled blocks",
                self.input_size,
                self.block_channels.len()
            )));
        }
        Ok(())
    }

    /// Name of the last block, the default Grad-CAM target.
    pub fn target_layer(&self) -> String {
        block_name(self.block_channels.len().saturating_sub(1))
    }

    /// Spatial side length of the target layer's activation.
    pub fn target_resolution(&self) -> usize {
        self.input_size >> self.block_channels.len().saturating_sub(1)
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvClassifier<B> {
        ConvClassifier::new(self.clone(), device)
    }
}

/// A single convolutional block: Conv2d -> ReLU
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    /// Convolutional layer.
    conv: Conv2d<B>,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        Self { conv }
    }

    /// Forward pass through the block.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        Relu::new().forward(self.conv.forward(x))
    }
}

/// Convolutional classifier producing one logit per class.
///
/// Architecture:
/// - N x [Conv2d(k, same) -> ReLU], 2x2 max pooling between blocks
/// - Global average pooling
/// - Linear(last_channels, n_classes)
///
/// # Example
///
/// ```rust,ignore
/// use camlens_models::ConvClassifierConfig;
///
/// let config = ConvClassifierConfig::new(1, 224, 18);
/// let model = config.init::<NdArray>(&device);
///
/// let x = Tensor::random([1, 1, 224, 224], Distribution::Normal(0.0, 1.0), &device);
/// let logits = model.forward(x);
/// // logits shape: [1, 18]
/// ```
#[derive(Module, Debug)]
pub struct ConvClassifier<B: Backend> {
    /// Convolutional blocks.
    blocks: Vec<ConvBlock<B>>,
    /// Max pooling between blocks.
    pool: MaxPool2d,
    /// Final linear classifier.
    head: Linear<B>,
}

impl<B: Backend> ConvClassifier<B> {
    /// Create a new model.
    pub fn new(config: ConvClassifierConfig, device: &B::Device) -> Self {
        let mut blocks = Vec::with_capacity(config.block_channels.len());
        let mut in_channels = config.in_channels;
        for &out_channels in &config.block_channels {
            blocks.push(ConvBlock::new(
                in_channels,
                out_channels,
                config.kernel_size,
                device,
            ));
            in_channels = out_channels;
        }

        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let head = LinearConfig::new(in_channels, config.n_classes).init(device);

        Self { blocks, pool, head }
    }

    /// Number of convolutional blocks.
    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Forward pass, handing every block output to `tap`.
    pub fn forward_with<F>(&self, x: Tensor<B, 4>, mut tap: F) -> Tensor<B, 2>
    where
        F: FnMut(&str, Tensor<B, 4>) -> Tensor<B, 4>,
    {
        let last = self.blocks.len().saturating_sub(1);
        let mut out = x;
        for (index, block) in self.blocks.iter().enumerate() {
            out = tap(&block_name(index), block.forward(out));
            if index < last {
                out = self.pool.forward(out);
            }
        }

        // Global average pooling, then classify
        let [batch, channels, _, _] = out.dims();
        let pooled = out.mean_dim(3).mean_dim(2).reshape([batch, channels]);
        self.head.forward(pooled)
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape (batch, channels, height, width)
    ///
    /// # Returns
    ///
    /// Output tensor of shape (batch, n_classes) with logits
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward_with(x, |_, out| out)
    }
}

impl<B: Backend> TappedModule<B> for ConvClassifier<B> {
    fn layer_names(&self) -> Vec<String> {
        (0..self.blocks.len()).map(block_name).collect()
    }

    fn input_channels(&self) -> Option<usize> {
        self.blocks.first().map(|block| block.conv.weight.dims()[1])
    }

    fn forward_tapped(&self, input: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 2> {
        self.forward_with(input, |layer, out| tap.tap(layer, out))
    }
}

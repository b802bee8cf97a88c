//! Image loading and conversion to model input tensors.

use std::path::Path;

use burn::prelude::*;
use burn::tensor::TensorData;
use image::imageops::{self, FilterType};
use image::DynamicImage;

use crate::cnn::ConvClassifierConfig;
use crate::error::{ModelError, Result};

/// Half-width of the input intensity range: pixels map onto `[-1024, 1024]`.
pub const INTENSITY_RANGE: f32 = 1024.0;

/// Decode an image file.
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let path = path.as_ref();
    let image = image::open(path)?;
    tracing::debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "decoded image"
    );
    Ok(image)
}

/// Map an 8-bit intensity onto `[-INTENSITY_RANGE, INTENSITY_RANGE]`.
#[inline]
pub fn normalize_intensity(value: u8) -> f32 {
    (2.0 * (f32::from(value) / 255.0) - 1.0) * INTENSITY_RANGE
}

/// Converts images into `[1, C, S, S]` classifier inputs.
///
/// Images are reduced to luminance, resized to `S x S` with a triangle filter,
/// rescaled with [`normalize_intensity`] and replicated across `C` channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessor {
    size: usize,
    channels: usize,
}

impl Preprocessor {
    /// Create a preprocessor for `size x size` inputs with `channels` channels.
    pub fn new(size: usize, channels: usize) -> Result<Self> {
        if size == 0 || channels == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "preprocessor needs a non-zero size and channel count, got {size}x{size}x{channels}"
            )));
        }
        Ok(Self { size, channels })
    }

    /// Preprocessor matching a classifier configuration.
    pub fn from_config(config: &ConvClassifierConfig) -> Result<Self> {
        Self::new(config.input_size, config.in_channels)
    }

    /// Side length of the produced input.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of channels of the produced input.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Normalized luminance values, row-major `size * size`.
    pub fn intensities(&self, image: &DynamicImage) -> Vec<f32> {
        let side = self.size as u32;
        let gray = image.to_luma8();
        let resized = if gray.dimensions() == (side, side) {
            gray
        } else {
            imageops::resize(&gray, side, side, FilterType::Triangle)
        };
        resized.pixels().map(|p| normalize_intensity(p[0])).collect()
    }

    /// Build the `[1, C, S, S]` input tensor for `image`.
    pub fn tensor<B: Backend>(&self, image: &DynamicImage, device: &B::Device) -> Tensor<B, 4> {
        let plane = self.intensities(image);
        let mut values = Vec::with_capacity(plane.len() * self.channels);
        for _ in 0..self.channels {
            values.extend_from_slice(&plane);
        }
        let data = TensorData::new(values, [1, self.channels, self.size, self.size]);
        Tensor::from_data(data, device)
    }
}

#[cfg(test)]
mod tests {
    use burn_ndarray::NdArray;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::*;

    type TestBackend = NdArray;

    #[test]
    fn test_normalize_intensity() {
        assert_eq!(normalize_intensity(0), -1024.0);
        assert_eq!(normalize_intensity(255), 1024.0);
        assert!(normalize_intensity(128).abs() < 5.0);
    }

    #[test]
    fn test_tensor_shape_and_range() {
        let device = Default::default();
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([255, 255, 255])));
        let prep = Preprocessor::new(8, 3).unwrap();

        let tensor = prep.tensor::<TestBackend>(&image, &device);
        assert_eq!(tensor.dims(), [1, 3, 8, 8]);
        let values = tensor.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (*v - 1024.0).abs() < 1e-3));
    }

    #[test]
    fn test_grayscale_passthrough() {
        let mut gray = GrayImage::new(2, 2);
        gray.put_pixel(1, 0, Luma([255]));
        let prep = Preprocessor::new(2, 1).unwrap();

        let values = prep.intensities(&DynamicImage::ImageLuma8(gray));
        assert_eq!(values, vec![-1024.0, 1024.0, -1024.0, -1024.0]);
    }

    #[test]
    fn test_from_config() {
        let prep = Preprocessor::from_config(&ConvClassifierConfig::default()).unwrap();
        assert_eq!(prep.size(), 224);
        assert_eq!(prep.channels(), 1);
        assert!(Preprocessor::new(0, 1).is_err());
    }
}

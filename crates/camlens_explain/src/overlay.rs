//! Heatmap overlays: resize a saliency map to the image, colour it and blend.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, Luma, RgbImage};

use crate::colormap::{jet, quantize};
use crate::error::{ExplainError, Result};
use crate::saliency::SaliencyMap;

/// Weight of the source image in the blend.
pub const IMAGE_WEIGHT: f32 = 0.6;

/// Weight of the coloured heatmap in the blend.
pub const HEATMAP_WEIGHT: f32 = 0.4;

/// Resize a map to `width` x `height` with bilinear interpolation.
pub fn resize_map(map: &SaliencyMap, width: u32, height: u32) -> Result<SaliencyMap> {
    if width == 0 || height == 0 {
        return Err(ExplainError::EmptyMap(format!(
            "resize target {width}x{height}"
        )));
    }
    let resized = if map.width() == width as usize && map.height() == height as usize {
        map.values().to_vec()
    } else {
        let source: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_raw(
            map.width() as u32,
            map.height() as u32,
            map.values().to_vec(),
        )
        .ok_or_else(|| {
            ExplainError::shape_mismatch(map.height() * map.width(), map.values().len())
        })?;
        imageops::resize(&source, width, height, FilterType::Triangle)
            .into_raw()
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0))
            .collect()
    };
    let mut out = SaliencyMap::new(height as usize, width as usize, resized)?;
    out.target_class = map.target_class;
    Ok(out)
}

/// Colour a map through the jet scale after quantizing it to 8 bits.
pub fn colorize(map: &SaliencyMap) -> RgbImage {
    let width = map.width();
    let values = map.values();
    RgbImage::from_fn(width as u32, map.height() as u32, |x, y| {
        jet(quantize(values[y as usize * width + x as usize]))
    })
}

/// Blend a heatmap over an image: `0.6 * image + 0.4 * heatmap`, rounded and clamped.
pub fn blend(image: &RgbImage, heatmap: &RgbImage) -> Result<RgbImage> {
    if image.dimensions() != heatmap.dimensions() {
        return Err(ExplainError::shape_mismatch(
            image.dimensions(),
            heatmap.dimensions(),
        ));
    }
    let mut out = RgbImage::new(image.width(), image.height());
    for ((dst, base), heat) in out.pixels_mut().zip(image.pixels()).zip(heatmap.pixels()) {
        for c in 0..3 {
            let value = IMAGE_WEIGHT * f32::from(base[c]) + HEATMAP_WEIGHT * f32::from(heat[c]);
            dst[c] = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(out)
}

/// Render `map` over `image`.
///
/// The map is resized to the image, quantized, coloured with the jet scale and
/// blended. Grayscale images are expanded to three channels first; the output
/// always has the image's width and height.
///
/// Images with an alpha channel are rejected with
/// [`ExplainError::ShapeMismatch`]; flatten them to RGB before compositing.
pub fn composite(image: &DynamicImage, map: &SaliencyMap) -> Result<RgbImage> {
    let color = image.color();
    if color.has_alpha() {
        return Err(ExplainError::ShapeMismatch {
            expected: "a grayscale or RGB image without alpha".to_string(),
            got: format!("{color:?} with {} channels", color.channel_count()),
        });
    }
    let base = image.to_rgb8();
    let (width, height) = base.dimensions();
    let heatmap = colorize(&resize_map(map, width, height)?);
    blend(&base, &heatmap)
}

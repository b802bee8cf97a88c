//! Jet colour scale: low values blue, high values red.

use image::Rgb;

/// Map an 8-bit level through the jet colour scale.
///
/// Piecewise linear: dark blue at 0, cyan, yellow, dark red at 255.
#[must_use]
pub fn jet(level: u8) -> Rgb<u8> {
    let v = f32::from(level) / 255.0;
    let channel = |center: f32| {
        let intensity = (1.5 - (4.0 * v - center).abs()).clamp(0.0, 1.0);
        (intensity * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

/// Quantize a unit-interval value to 8 bits by scaling and truncating.
#[must_use]
pub fn quantize(value: f32) -> u8 {
    // `as` saturates and maps NaN to 0.
    (255.0 * value) as u8
}

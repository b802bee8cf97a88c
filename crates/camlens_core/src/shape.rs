//! Activation shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Shape of a single-image layer activation.
///
/// Follows the convention `(C, H, W)`:
/// - `C`: Channels (feature maps)
/// - `H`: Spatial height
/// - `W`: Spatial width
///
/// # Example
///
/// ```rust
/// use camlens_core::ActivationShape;
///
/// let shape = ActivationShape::new(64, 7, 7);
/// assert_eq!(shape.channels(), 64);
/// assert_eq!(shape.spatial(), 49);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivationShape {
    channels: usize,
    height: usize,
    width: usize,
}

impl ActivationShape {
    /// Create a new shape.
    #[must_use]
    pub const fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Create a shape from the dims of a `(B, C, H, W)` tensor, dropping the batch axis.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice doesn't contain exactly 4 elements or the batch is empty.
    pub fn from_batched_dims(dims: &[usize]) -> Result<Self> {
        if dims.len() != 4 {
            return Err(CoreError::DimensionError {
                expected: 4,
                got: dims.len(),
            });
        }
        if dims[0] == 0 {
            return Err(CoreError::InvalidInput(
                "activation has an empty batch axis".to_string(),
            ));
        }
        Ok(Self::new(dims[1], dims[2], dims[3]))
    }

    /// Number of channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Spatial height.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Spatial width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Number of spatial positions (`H * W`).
    #[must_use]
    pub const fn spatial(&self) -> usize {
        self.height * self.width
    }

    /// Check if any dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.channels == 0 || self.height == 0 || self.width == 0
    }

    /// Convert to an array.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }
}

impl std::fmt::Display for ActivationShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.channels, self.height, self.width)
    }
}

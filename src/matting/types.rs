use anyhow::Result;
use image::{GrayImage, RgbaImage};

/// A neural foreground estimator.
/// Allows swapping between backends (ONNX models, remote services, test fakes).
pub trait ForegroundModel {
    /// Estimate foreground alpha for `image`
    ///
    /// # Returns
    /// * Mask with the same dimensions as `image`, 0 = background,
    ///   255 = foreground, intermediate values at soft edges
    fn segment_foreground(&mut self, image: &RgbaImage) -> Result<GrayImage>;

    /// Get the model's preferred input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);
}

/// One cell of the correction overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Correction {
    #[default]
    Untouched = 0,
    ForcedForeground = 1,
    ForcedBackground = 2,
}

impl Correction {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Correction::ForcedForeground,
            2 => Correction::ForcedBackground,
            _ => Correction::Untouched,
        }
    }

    /// Alpha this correction forces, if any.
    pub fn forced_alpha(self) -> Option<u8> {
        match self {
            Correction::Untouched => None,
            Correction::ForcedForeground => Some(255),
            Correction::ForcedBackground => Some(0),
        }
    }
}

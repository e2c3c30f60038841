use image::{GrayImage, Luma, RgbaImage};

use super::Label;
use crate::config::EditorConfig;
use crate::error::{EditorError, Result};
use crate::ops::{ImageOps, MorphOp};

/// Turn a cut label mask into the raster's alpha channel.
///
/// Foreground and probable foreground become opaque, the rest transparent.
/// Speckle is cleaned with a close then an open when the backend has
/// morphology, edges are feathered with a small Gaussian, and the result is
/// scaled up to the raster when the cut ran at a reduced working size.
pub(crate) fn apply_mask_to_alpha(
    ops: &dyn ImageOps,
    config: &EditorConfig,
    raster: &mut RgbaImage,
    labels: &GrayImage,
) -> Result<()> {
    let _span = tracing::debug_span!("apply_mask_to_alpha").entered();

    let mut binary = GrayImage::from_fn(labels.width(), labels.height(), |x, y| {
        if Label::from_u8(labels.get_pixel(x, y)[0]).is_foreground() {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    if ops.capabilities().morphology {
        match cleanup(ops, &binary, config.morphology_kernel) {
            Ok(cleaned) => binary = cleaned,
            Err(EditorError::Unavailable(capability)) => {
                tracing::warn!("{} unavailable, skipping mask cleanup", capability)
            }
            Err(err) => return Err(err),
        }
    } else {
        tracing::warn!("Morphology unavailable, skipping mask cleanup");
    }

    let blurred = ops.gaussian_blur(&binary, config.blur_sigma());
    let alpha = ops.resize_mask(&blurred, raster.width(), raster.height());

    for (pixel, mask) in raster.pixels_mut().zip(alpha.pixels()) {
        pixel[3] = mask[0];
    }
    Ok(())
}

fn cleanup(ops: &dyn ImageOps, mask: &GrayImage, kernel: u32) -> Result<GrayImage> {
    let closed = ops.morphology(mask, MorphOp::Close, kernel)?;
    ops.morphology(&closed, MorphOp::Open, kernel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{Capabilities, CpuOps};
    use image::Rgba;

    fn labels() -> GrayImage {
        GrayImage::from_fn(40, 40, |x, y| {
            if (10..30).contains(&x) && (10..30).contains(&y) {
                Luma([Label::ProbableForeground as u8])
            } else {
                Luma([Label::Background as u8])
            }
        })
    }

    #[test]
    fn writes_feathered_alpha() {
        let mut raster = RgbaImage::from_pixel(40, 40, Rgba([9, 9, 9, 255]));
        apply_mask_to_alpha(&CpuOps::new(), &EditorConfig::default(), &mut raster, &labels()).unwrap();
        assert!(raster.get_pixel(20, 20)[3] >= 250);
        assert_eq!(raster.get_pixel(0, 0)[3], 0);
        let edge = raster.get_pixel(10, 20)[3];
        assert!(edge > 0 && edge < 255, "edge alpha {edge}");
        assert_eq!(raster.get_pixel(20, 20)[0], 9);
    }

    #[test]
    fn upscales_working_mask() {
        let mut raster = RgbaImage::from_pixel(80, 80, Rgba([9, 9, 9, 255]));
        apply_mask_to_alpha(&CpuOps::new(), &EditorConfig::default(), &mut raster, &labels()).unwrap();
        assert!(raster.get_pixel(40, 40)[3] >= 250);
        assert_eq!(raster.get_pixel(2, 2)[3], 0);
    }

    #[test]
    fn missing_morphology_still_produces_alpha() {
        let ops = CpuOps::new().with_capabilities(Capabilities {
            energy_cut: true,
            morphology: false,
        });
        let mut raster = RgbaImage::from_pixel(40, 40, Rgba([9, 9, 9, 255]));
        apply_mask_to_alpha(&ops, &EditorConfig::default(), &mut raster, &labels()).unwrap();
        assert!(raster.get_pixel(20, 20)[3] >= 250);
    }
}

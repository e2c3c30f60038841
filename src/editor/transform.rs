//! Non-recording transforms.
//!
//! These change the document and nothing else. The dispatcher calls them
//! for live edits and pushes history on success; replay calls them for each
//! logged command without pushing anything.

use image::RgbaImage;

use crate::command::{Command, ExtensionRegistry};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::error::{EditorError, Result};
use crate::geometry::{rotate_bound, Affine, Homography, Quad};
use crate::ops::{FlipAxis, ImageOps};
use crate::segmentation::SegmentationEngine;

/// Rotate counter-clockwise by `angle` degrees, growing the canvas to fit.
pub fn rotate(ops: &dyn ImageOps, document: &mut Document, angle: f64) -> Result<()> {
    let (w, h) = document.dimensions();
    let (matrix, size) = rotate_bound(w, h, angle);
    tracing::debug!("Rotate {}° {}x{} -> {}x{}", angle, w, h, size.0, size.1);
    let rotated = ops.warp_affine(document.raster(), &matrix, size)?;
    document.replace(rotated);
    Ok(())
}

/// Axis-aligned crop from the quad's top-left, top-right and bottom-left
/// corners. The bottom-right corner is ignored.
pub fn crop(ops: &dyn ImageOps, document: &mut Document, quad: &Quad) -> Result<()> {
    let l = quad.top_left.x;
    let t = quad.top_left.y;
    let r = quad.top_right.x;
    let b = quad.bottom_left.y;
    let size = output_size(r - l, b - t)?;
    tracing::debug!("Crop l={:.1} t={:.1} to {}x{}", l, t, size.0, size.1);
    let cropped = ops.warp_affine(document.raster(), &Affine::translation(-l, -t), size)?;
    document.replace(cropped);
    Ok(())
}

/// Keystone correction: map the quad onto an upright rectangle.
pub fn perspective_crop(ops: &dyn ImageOps, document: &mut Document, quad: &Quad) -> Result<()> {
    let width = (quad.bottom_right.x - quad.bottom_left.x).max(quad.top_right.x - quad.top_left.x);
    let height = (quad.bottom_left.y - quad.top_left.y).max(quad.bottom_right.y - quad.top_right.y);
    let size = output_size(width, height)?;

    let src = quad.corners().map(|p| (p.x, p.y));
    let dst = [
        (0.0, 0.0),
        (width - 1.0, 0.0),
        (width - 1.0, height - 1.0),
        (0.0, height - 1.0),
    ];
    let matrix = Homography::from_points(src, dst)
        .ok_or_else(|| EditorError::InvalidGeometry("crop corners are degenerate".into()))?;
    tracing::debug!("Perspective crop to {}x{}", size.0, size.1);
    let warped = ops.warp_perspective(document.raster(), &matrix, size)?;
    document.replace(warped);
    Ok(())
}

pub fn flip(ops: &dyn ImageOps, document: &mut Document, axis: FlipAxis) {
    ops.flip(document.raster_mut(), axis);
}

pub fn scale(ops: &dyn ImageOps, document: &mut Document, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(EditorError::InvalidGeometry(format!(
            "cannot scale to {width}x{height}"
        )));
    }
    let resized = ops.resize(document.raster(), width, height);
    document.replace(resized);
    Ok(())
}

fn output_size(width: f64, height: f64) -> Result<(u32, u32)> {
    let (w, h) = (width.round(), height.round());
    if !(w >= 1.0 && h >= 1.0) {
        return Err(EditorError::InvalidGeometry(format!(
            "crop region is {width:.1}x{height:.1}"
        )));
    }
    Ok((w as u32, h as u32))
}

/// What replay needs besides the document itself.
pub(crate) struct Replayer<'a> {
    pub ops: &'a dyn ImageOps,
    pub config: &'a EditorConfig,
    pub extensions: &'a ExtensionRegistry,
}

impl Replayer<'_> {
    /// Re-apply one logged command.
    pub fn apply(
        &self,
        document: &mut Document,
        cut: &mut SegmentationEngine,
        command: &Command,
    ) -> Result<()> {
        match command {
            Command::RotateLeft(angle) | Command::RotateRight(angle) => {
                rotate(self.ops, document, *angle)
            }
            Command::Crop(quad) => crop(self.ops, document, quad),
            Command::PerspectiveCrop(quad) => perspective_crop(self.ops, document, quad),
            Command::FlipHorizontal => {
                flip(self.ops, document, FlipAxis::Horizontal);
                Ok(())
            }
            Command::FlipVertical => {
                flip(self.ops, document, FlipAxis::Vertical);
                Ok(())
            }
            Command::Scale { width, height } => scale(self.ops, document, *width, *height),
            Command::RemoveBackground => {
                cut.initial_cut(self.ops, self.config, document.raster_mut())
            }
            Command::RefineBackground(strokes) => {
                cut.refine(self.ops, self.config, document.raster_mut(), strokes)
            }
            Command::Extension { tag, payload } => self.extensions.apply(tag, document, payload),
        }
    }

    /// Rebuild from the pristine source by applying `commands` in order.
    ///
    /// The cut session is rebuilt alongside, so a refine in the log finds
    /// the session its preceding removal created.
    pub fn replay(
        &self,
        base: &Document,
        commands: &[Command],
    ) -> Result<(Document, SegmentationEngine)> {
        let _span = tracing::debug_span!("replay", commands = commands.len()).entered();
        let mut document = base.pristine()?;
        let mut cut = SegmentationEngine::new();
        for command in commands {
            tracing::debug!("Replaying {}", command);
            self.apply(&mut document, &mut cut, command)?;
        }
        Ok((document, cut))
    }
}

/// Copy of `raster` encoded losslessly, the payload of recorded neural
/// results.
pub(crate) fn snapshot_payload(raster: &RgbaImage) -> Result<Vec<u8>> {
    crate::codec::encode(raster, crate::codec::OutputFormat::Png, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, OutputFormat};
    use crate::geometry::{ImagePoint, Rect};
    use crate::ops::CpuOps;
    use image::Rgba;

    fn document(w: u32, h: u32) -> Document {
        let img = RgbaImage::from_fn(w, h, |x, y| Rgba([x as u8, y as u8, 7, 255]));
        Document::open(codec::encode(&img, OutputFormat::Png, None).unwrap()).unwrap()
    }

    #[test]
    fn rotate_left_quarter_turn_swaps_extents() {
        let mut doc = document(100, 50);
        rotate(&CpuOps::new(), &mut doc, 90.0).unwrap();
        assert_eq!(doc.dimensions(), (50, 100));
    }

    #[test]
    fn crop_uses_three_corners() {
        let mut doc = document(40, 30);
        let mut quad = Quad::from_rect(Rect::new(5, 4, 20, 10));
        quad.bottom_right = ImagePoint::new(99.0, 99.0);
        crop(&CpuOps::new(), &mut doc, &quad).unwrap();
        assert_eq!(doc.dimensions(), (20, 10));
        assert_eq!(doc.raster().get_pixel(0, 0), &Rgba([5, 4, 7, 255]));
        assert_eq!(doc.raster().get_pixel(19, 9), &Rgba([24, 13, 7, 255]));
    }

    #[test]
    fn perspective_crop_of_rectangle_is_upright() {
        let mut doc = document(40, 30);
        let quad = Quad::from_rect(Rect::new(10, 5, 20, 15));
        perspective_crop(&CpuOps::new(), &mut doc, &quad).unwrap();
        assert_eq!(doc.dimensions(), (20, 15));
        assert_eq!(doc.raster().get_pixel(0, 0), &Rgba([10, 5, 7, 255]));
    }

    #[test]
    fn degenerate_crop_is_rejected() {
        let mut doc = document(10, 10);
        let quad = Quad::from_rect(Rect::new(5, 5, 0, 3));
        let err = crop(&CpuOps::new(), &mut doc, &quad).unwrap_err();
        assert!(matches!(err, EditorError::InvalidGeometry(_)));
        assert_eq!(doc.dimensions(), (10, 10));
        assert!(scale(&CpuOps::new(), &mut doc, 0, 4).is_err());
    }
}

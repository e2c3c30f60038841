use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgba, RgbImage, RgbaImage};

use super::{cut, Capabilities, CutInit, FlipAxis, ImageOps, MorphOp};
use crate::error::{Capability, EditorError, Result};
use crate::geometry::{Affine, Homography, Rect};
use crate::segmentation::CutModels;

/// Gradient magnitude (|gx| + |gy| of a Sobel pair) that counts as an edge
const EDGE_THRESHOLD: i32 = 96;

/// Pure-Rust backend built on the `image` crate.
#[derive(Debug, Clone, Default)]
pub struct CpuOps {
    capabilities: Capabilities,
}

impl CpuOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise (and enforce) a reduced feature set, mirroring builds of
    /// native vision libraries that ship without some modules.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl ImageOps for CpuOps {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn warp_affine(&self, src: &RgbaImage, transform: &Affine, size: (u32, u32)) -> Result<RgbaImage> {
        let inverse = transform
            .inverse()
            .ok_or_else(|| EditorError::InvalidGeometry("affine transform is singular".into()))?;
        Ok(warp(src, size, |x, y| Some(inverse.apply(x, y))))
    }

    fn warp_perspective(
        &self,
        src: &RgbaImage,
        transform: &Homography,
        size: (u32, u32),
    ) -> Result<RgbaImage> {
        let inverse = transform
            .inverse()
            .ok_or_else(|| EditorError::InvalidGeometry("perspective transform is singular".into()))?;
        Ok(warp(src, size, |x, y| inverse.apply(x, y)))
    }

    fn flip(&self, image: &mut RgbaImage, axis: FlipAxis) {
        match axis {
            FlipAxis::Horizontal => imageops::flip_horizontal_in_place(image),
            FlipAxis::Vertical => imageops::flip_vertical_in_place(image),
        }
    }

    fn resize(&self, src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
        if src.dimensions() == (width, height) {
            return src.clone();
        }
        imageops::resize(src, width, height, FilterType::Triangle)
    }

    fn resize_mask(&self, mask: &GrayImage, width: u32, height: u32) -> GrayImage {
        if mask.dimensions() == (width, height) {
            return mask.clone();
        }
        imageops::resize(mask, width, height, FilterType::Triangle)
    }

    fn gaussian_blur(&self, mask: &GrayImage, sigma: f32) -> GrayImage {
        imageops::blur(mask, sigma)
    }

    fn morphology(&self, mask: &GrayImage, op: MorphOp, kernel: u32) -> Result<GrayImage> {
        if !self.capabilities.morphology {
            return Err(EditorError::Unavailable(Capability::Morphology));
        }
        let offsets = ellipse_offsets(kernel);
        Ok(match op {
            MorphOp::Close => extremum(&extremum(mask, &offsets, true), &offsets, false),
            MorphOp::Open => extremum(&extremum(mask, &offsets, false), &offsets, true),
        })
    }

    fn energy_cut(
        &self,
        image: &RgbImage,
        mask: &mut GrayImage,
        init: CutInit,
        models: &mut CutModels,
        iterations: u32,
    ) -> Result<()> {
        if !self.capabilities.energy_cut {
            return Err(EditorError::Unavailable(Capability::EnergyCut));
        }
        if image.dimensions() != mask.dimensions() {
            return Err(EditorError::MaskSize {
                expected: image.dimensions(),
                actual: mask.dimensions(),
            });
        }
        cut::run(image, mask, init, models, iterations);
        Ok(())
    }

    fn detect_bounds(&self, image: &RgbaImage) -> Option<Rect> {
        let (w, h) = image.dimensions();
        if w < 3 || h < 3 {
            return None;
        }
        let luma = imageops::grayscale(image);
        let at = |x: u32, y: u32| luma.get_pixel(x, y)[0] as i32;

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0, 0);
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let gx = at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1)
                    - at(x - 1, y - 1)
                    - 2 * at(x - 1, y)
                    - at(x - 1, y + 1);
                let gy = at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1)
                    - at(x - 1, y - 1)
                    - 2 * at(x, y - 1)
                    - at(x + 1, y - 1);
                if gx.abs() + gy.abs() >= EDGE_THRESHOLD {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }
        if min_x > max_x || min_y > max_y {
            return None;
        }
        Some(Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    }
}

/// Inverse-mapped bilinear warp. `map` takes a destination pixel to its
/// source location; samples outside the source read as transparent black.
fn warp<F>(src: &RgbaImage, size: (u32, u32), map: F) -> RgbaImage
where
    F: Fn(f64, f64) -> Option<(f64, f64)>,
{
    let mut dst = RgbaImage::new(size.0, size.1);
    for (dx, dy, out) in dst.enumerate_pixels_mut() {
        if let Some((sx, sy)) = map(dx as f64, dy as f64) {
            *out = bilinear_sample(src, sx, sy);
        }
    }
    dst
}

fn bilinear_sample(img: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    if x0 < -1 || y0 < -1 || x0 >= w || y0 >= h {
        return Rgba([0, 0, 0, 0]);
    }
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let sample = |sx: i64, sy: i64| -> [f64; 4] {
        if sx < 0 || sy < 0 || sx >= w || sy >= h {
            [0.0; 4]
        } else {
            let p = img.get_pixel(sx as u32, sy as u32);
            [p[0] as f64, p[1] as f64, p[2] as f64, p[3] as f64]
        }
    };

    let tl = sample(x0, y0);
    let tr = sample(x0 + 1, y0);
    let bl = sample(x0, y0 + 1);
    let br = sample(x0 + 1, y0 + 1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = tl[c] + (tr[c] - tl[c]) * fx;
        let bot = bl[c] + (br[c] - bl[c]) * fx;
        out[c] = (top + (bot - top) * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Offsets of an elliptical structuring element with side `kernel`.
fn ellipse_offsets(kernel: u32) -> Vec<(i32, i32)> {
    let r = (kernel.max(1) / 2) as i32;
    let rr = (r as f64 + 0.5).powi(2);
    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if (dx * dx + dy * dy) as f64 <= rr {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

/// Dilation (`max = true`) or erosion over the structuring element.
/// Neighbours outside the image are ignored.
fn extremum(mask: &GrayImage, offsets: &[(i32, i32)], max: bool) -> GrayImage {
    let (w, h) = mask.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut value = mask.get_pixel(x, y)[0];
        for &(dx, dy) in offsets {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                continue;
            }
            let v = mask.get_pixel(nx as u32, ny as u32)[0];
            value = if max { value.max(v) } else { value.min(v) };
        }
        Luma([value])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 10) as u8, (y * 10) as u8, 0, 255]))
    }

    #[test]
    fn integer_translation_is_pixel_exact() {
        let src = gradient(10, 8);
        let out = CpuOps::new()
            .warp_affine(&src, &Affine::translation(-2.0, -3.0), (5, 4))
            .unwrap();
        for (x, y, p) in out.enumerate_pixels() {
            assert_eq!(p, src.get_pixel(x + 2, y + 3));
        }
    }

    #[test]
    fn flip_twice_is_identity() {
        let ops = CpuOps::new();
        let src = gradient(7, 5);
        let mut img = src.clone();
        ops.flip(&mut img, FlipAxis::Horizontal);
        assert_eq!(img.get_pixel(0, 0), src.get_pixel(6, 0));
        ops.flip(&mut img, FlipAxis::Horizontal);
        ops.flip(&mut img, FlipAxis::Vertical);
        assert_eq!(img.get_pixel(0, 0), src.get_pixel(0, 4));
        ops.flip(&mut img, FlipAxis::Vertical);
        assert_eq!(img, src);
    }

    #[test]
    fn close_fills_pinhole_and_open_removes_speck() {
        let ops = CpuOps::new();
        let mut mask = GrayImage::from_pixel(20, 20, Luma([255]));
        mask.put_pixel(10, 10, Luma([0]));
        let closed = ops.morphology(&mask, MorphOp::Close, 5).unwrap();
        assert_eq!(closed.get_pixel(10, 10)[0], 255);

        let mut mask = GrayImage::new(20, 20);
        mask.put_pixel(10, 10, Luma([255]));
        let opened = ops.morphology(&mask, MorphOp::Open, 5).unwrap();
        assert_eq!(opened.get_pixel(10, 10)[0], 0);
    }

    #[test]
    fn disabled_morphology_reports_unavailable() {
        let ops = CpuOps::new().with_capabilities(Capabilities {
            energy_cut: true,
            morphology: false,
        });
        let err = ops.morphology(&GrayImage::new(4, 4), MorphOp::Open, 5).unwrap_err();
        assert!(matches!(err, EditorError::Unavailable(Capability::Morphology)));
    }

    #[test]
    fn detect_bounds_finds_object() {
        let img = RgbaImage::from_fn(60, 40, |x, y| {
            if (20..40).contains(&x) && (10..30).contains(&y) {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let rect = CpuOps::new().detect_bounds(&img).unwrap();
        assert!(rect.x >= 18 && rect.x <= 20, "{rect:?}");
        assert!(rect.y >= 8 && rect.y <= 10, "{rect:?}");
        assert!(rect.x + rect.width >= 40 && rect.x + rect.width <= 42, "{rect:?}");
        assert!(CpuOps::new().detect_bounds(&RgbaImage::new(30, 30)).is_none());
    }
}

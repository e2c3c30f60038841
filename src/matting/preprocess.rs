use image::{imageops, GrayImage, Luma, RgbaImage};
use ndarray::Array4;

/// ImageNet channel statistics, what most salient-object models expect
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Preprocessor for converting RGBA images to model input tensors
#[derive(Debug, Clone)]
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    pub fn with_normalization(mut self, mean: [f32; 3], std: [f32; 3]) -> Self {
        self.mean = mean;
        self.std = std;
        self
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// Preprocess an image into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions
    /// 2. Scale to [0, 1] and apply per-channel mean/std
    /// 3. Transpose from HWC to NCHW format
    ///
    /// Alpha is ignored. Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, image: &RgbaImage) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized = if image.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            )
        } else {
            image.clone()
        };

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                let v = pixel[c] as f32 / 255.0;
                tensor[[0, c, y as usize, x as usize]] = (v - self.mean[c]) / self.std[c];
            }
        }
        tensor
    }

    /// Turn a raw model output into an alpha mask at `target` size.
    ///
    /// Values are min-max normalized first, since models differ in whether
    /// they emit logits, probabilities or something in between. A flat
    /// output becomes all background.
    pub fn postprocess_mask(
        raw: &[f32],
        mask_width: u32,
        mask_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> GrayImage {
        let _span = tracing::debug_span!("postprocess").entered();

        let (min, max) = raw
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = max - min;

        let mask = GrayImage::from_fn(mask_width, mask_height, |x, y| {
            let idx = (y * mask_width + x) as usize;
            let value = match raw.get(idx) {
                Some(v) if range > f32::EPSILON => (v - min) / range,
                _ => 0.0,
            };
            Luma([(value * 255.0).round().clamp(0.0, 255.0) as u8])
        });

        if (mask_width, mask_height) == (target_width, target_height) {
            return mask;
        }
        imageops::resize(
            &mask,
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        )
    }

    /// Render a mask as an opaque grayscale image for inspection
    pub fn mask_to_rgba(mask: &GrayImage) -> RgbaImage {
        RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
            let v = mask.get_pixel(x, y)[0];
            image::Rgba([v, v, v, 255])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn tensor_is_nchw_and_normalized() {
        let img = RgbaImage::from_fn(4, 2, |x, _| {
            if x == 0 {
                Rgba([255, 0, 0, 10])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let pre = Preprocessor::new(4, 2).with_normalization([0.5; 3], [0.5; 3]);
        let t = pre.preprocess(&img);
        assert_eq!(t.shape(), &[1, 3, 2, 4]);
        assert_eq!(t[[0, 0, 0, 0]], 1.0);
        assert_eq!(t[[0, 1, 0, 0]], -1.0);
        assert_eq!(t[[0, 2, 1, 3]], 1.0);
    }

    #[test]
    fn preprocess_resizes_to_target() {
        let img = RgbaImage::new(10, 6);
        let t = Preprocessor::new(8, 8).preprocess(&img);
        assert_eq!(t.shape(), &[1, 3, 8, 8]);
    }

    #[test]
    fn postprocess_stretches_range() {
        let raw = [-2.0, 0.0, 2.0, 2.0];
        let mask = Preprocessor::postprocess_mask(&raw, 2, 2, 2, 2);
        assert_eq!(mask.as_raw(), &vec![0, 128, 255, 255]);
    }

    #[test]
    fn flat_output_is_background() {
        let mask = Preprocessor::postprocess_mask(&[0.7; 16], 4, 4, 8, 6);
        assert_eq!(mask.dimensions(), (8, 6));
        assert!(mask.pixels().all(|p| p[0] == 0));
    }
}

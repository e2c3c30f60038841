//! Neural background removal with a user correction overlay.
//!
//! The session keeps the pristine source so every inference starts from the
//! same clean input, never from an already masked result.

#[cfg(feature = "onnx")]
mod onnx;
mod preprocess;
pub mod types;

#[cfg(feature = "onnx")]
pub use onnx::OnnxForegroundModel;
pub use preprocess::{Preprocessor, IMAGENET_MEAN, IMAGENET_STD};
pub use types::{Correction, ForegroundModel};

use image::{GrayImage, Luma, RgbaImage};

use crate::cancel::CancelToken;
use crate::error::{EditorError, Result, SessionKind};
use crate::segmentation::{paint_disk, BrushMode, BrushStroke};

#[derive(Debug, Clone)]
pub struct MlMaskSession {
    original_source: RgbaImage,
    mask: GrayImage,
    corrections: GrayImage,
}

impl MlMaskSession {
    pub fn original_source(&self) -> &RgbaImage {
        &self.original_source
    }

    /// Full-resolution alpha mask.
    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Overlay of [`Correction`] bytes, same size as the mask.
    pub fn corrections(&self) -> &GrayImage {
        &self.corrections
    }

    pub fn correction_at(&self, x: u32, y: u32) -> Correction {
        Correction::from_u8(self.corrections.get_pixel(x, y)[0])
    }

    /// Source pixels with the mask as alpha.
    pub fn composite(&self) -> RgbaImage {
        composite(&self.original_source, &self.mask)
    }
}

#[derive(Debug, Default)]
pub struct MattingEngine {
    session: Option<MlMaskSession>,
}

impl MattingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&MlMaskSession> {
        self.session.as_ref()
    }

    pub fn has_mask(&self) -> bool {
        self.session.is_some()
    }

    pub fn clear(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!("Cleared neural mask session");
        }
    }

    /// Run the model once on `source` and start a session from it.
    ///
    /// Returns the composited raster. Nothing is stored if `cancel` fires.
    pub fn segment(
        &mut self,
        source: &RgbaImage,
        model: &mut dyn ForegroundModel,
        cancel: &CancelToken,
    ) -> Result<RgbaImage> {
        let _span = tracing::debug_span!("neural_segment").entered();
        let mask = infer(model, source, cancel)?;

        let session = MlMaskSession {
            original_source: source.clone(),
            corrections: GrayImage::new(mask.width(), mask.height()),
            mask,
        };
        cancel.check()?;
        let composited = session.composite();

        cancel.check()?;
        self.session = Some(session);
        tracing::info!("Neural mask session created at {}x{}", source.width(), source.height());
        Ok(composited)
    }

    /// Infer again on the stored source and force the corrections onto the
    /// fresh mask.
    pub fn rerun_with_corrections(
        &mut self,
        model: &mut dyn ForegroundModel,
        cancel: &CancelToken,
    ) -> Result<RgbaImage> {
        let session = self
            .session
            .as_ref()
            .ok_or(EditorError::NoSession(SessionKind::Matting))?;

        let _span = tracing::debug_span!("neural_rerun").entered();
        let mut mask = infer(model, &session.original_source, cancel)?;
        merge_corrections(&mut mask, &session.corrections);
        cancel.check()?;
        let composited = composite(&session.original_source, &mask);

        cancel.check()?;
        if let Some(session) = self.session.as_mut() {
            session.mask = mask;
        }
        tracing::info!("Neural mask re-run with corrections");
        Ok(composited)
    }

    /// Paint strokes straight into the mask and the overlay. No inference.
    pub fn apply_brush_corrections(&mut self, strokes: &[BrushStroke]) -> Result<RgbaImage> {
        let session = self
            .session
            .as_mut()
            .ok_or(EditorError::NoSession(SessionKind::Matting))?;

        for stroke in strokes {
            let (alpha, correction) = match stroke.mode {
                BrushMode::Foreground => (255, Correction::ForcedForeground),
                BrushMode::Background => (0, Correction::ForcedBackground),
            };
            let r = stroke.radius as i64;
            for point in &stroke.points {
                let cx = point.x.round() as i64;
                let cy = point.y.round() as i64;
                paint_disk(&mut session.mask, cx, cy, r, alpha);
                paint_disk(&mut session.corrections, cx, cy, r, correction as u8);
            }
        }
        tracing::debug!("Applied {} correction strokes", strokes.len());
        Ok(session.composite())
    }
}

fn infer(model: &mut dyn ForegroundModel, source: &RgbaImage, cancel: &CancelToken) -> Result<GrayImage> {
    let mask = model
        .segment_foreground(source)
        .map_err(EditorError::Inference)?;
    cancel.check()?;
    if mask.dimensions() != source.dimensions() {
        return Err(EditorError::MaskSize {
            expected: source.dimensions(),
            actual: mask.dimensions(),
        });
    }
    Ok(mask)
}

fn merge_corrections(mask: &mut GrayImage, corrections: &GrayImage) {
    for (m, c) in mask.pixels_mut().zip(corrections.pixels()) {
        if let Some(alpha) = Correction::from_u8(c[0]).forced_alpha() {
            *m = Luma([alpha]);
        }
    }
}

fn composite(source: &RgbaImage, mask: &GrayImage) -> RgbaImage {
    let mut out = source.clone();
    for (pixel, m) in out.pixels_mut().zip(mask.pixels()) {
        pixel[3] = m[0];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ImagePoint;
    use image::Rgba;

    /// Left half foreground, right half background.
    struct HalfModel {
        calls: usize,
    }

    impl ForegroundModel for HalfModel {
        fn segment_foreground(&mut self, image: &RgbaImage) -> anyhow::Result<GrayImage> {
            self.calls += 1;
            let half = image.width() / 2;
            Ok(GrayImage::from_fn(image.width(), image.height(), |x, _| {
                Luma([if x < half { 255 } else { 0 }])
            }))
        }

        fn input_size(&self) -> (u32, u32) {
            (8, 8)
        }
    }

    struct Failing;

    impl ForegroundModel for Failing {
        fn segment_foreground(&mut self, _: &RgbaImage) -> anyhow::Result<GrayImage> {
            anyhow::bail!("no backend")
        }

        fn input_size(&self) -> (u32, u32) {
            (1, 1)
        }
    }

    fn source() -> RgbaImage {
        RgbaImage::from_pixel(20, 10, Rgba([50, 60, 70, 255]))
    }

    #[test]
    fn segment_composites_without_second_inference() {
        let mut engine = MattingEngine::new();
        let mut model = HalfModel { calls: 0 };
        let out = engine.segment(&source(), &mut model, &CancelToken::new()).unwrap();
        assert_eq!(model.calls, 1);
        assert_eq!(out.get_pixel(2, 2), &Rgba([50, 60, 70, 255]));
        assert_eq!(out.get_pixel(15, 2)[3], 0);
        let session = engine.session().unwrap();
        assert!(session.corrections().pixels().all(|p| p[0] == 0));
        assert_eq!(session.original_source(), &source());
    }

    #[test]
    fn brush_paints_mask_and_overlay() {
        let mut engine = MattingEngine::new();
        engine
            .segment(&source(), &mut HalfModel { calls: 0 }, &CancelToken::new())
            .unwrap();
        let stroke = BrushStroke::new(BrushMode::Foreground, 2, vec![ImagePoint::new(15.0, 5.0)]);
        let out = engine.apply_brush_corrections(&[stroke]).unwrap();

        let session = engine.session().unwrap();
        assert_eq!(session.correction_at(15, 5), Correction::ForcedForeground);
        assert_eq!(session.correction_at(17, 5), Correction::ForcedForeground);
        assert_eq!(session.correction_at(17, 7), Correction::Untouched);
        assert_eq!(out.get_pixel(15, 5)[3], 255);
        assert_eq!(out.get_pixel(18, 5)[3], 0);
    }

    #[test]
    fn corrections_survive_rerun() {
        let mut engine = MattingEngine::new();
        let mut model = HalfModel { calls: 0 };
        engine.segment(&source(), &mut model, &CancelToken::new()).unwrap();
        let stroke = BrushStroke::new(BrushMode::Background, 1, vec![ImagePoint::new(3.0, 3.0)]);
        engine.apply_brush_corrections(&[stroke]).unwrap();

        let out = engine.rerun_with_corrections(&mut model, &CancelToken::new()).unwrap();
        assert_eq!(model.calls, 2);
        assert_eq!(out.get_pixel(3, 3)[3], 0);
        assert_eq!(out.get_pixel(6, 3)[3], 255);
        assert_eq!(engine.session().unwrap().mask().get_pixel(3, 3)[0], 0);
    }

    #[test]
    fn rerun_needs_session() {
        let mut engine = MattingEngine::new();
        let err = engine
            .rerun_with_corrections(&mut HalfModel { calls: 0 }, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, EditorError::NoSession(SessionKind::Matting)));
        assert!(engine.apply_brush_corrections(&[]).is_err());
    }

    #[test]
    fn cancelled_segment_stores_nothing() {
        let mut engine = MattingEngine::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = engine
            .segment(&source(), &mut HalfModel { calls: 0 }, &cancel)
            .unwrap_err();
        assert!(matches!(err, EditorError::Cancelled));
        assert!(!engine.has_mask());
    }

    #[test]
    fn model_failure_is_inference_error() {
        let mut engine = MattingEngine::new();
        let err = engine
            .segment(&source(), &mut Failing, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, EditorError::Inference(_)));
        assert!(err.to_string().contains("no backend"));
    }
}

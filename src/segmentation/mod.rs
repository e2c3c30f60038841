//! Coarse background removal: a colour-model energy cut at a bounded working
//! resolution, refined by user brush strokes.

mod postprocess;
pub mod types;

pub use types::{BrushMode, BrushStroke, ColorModel, CutModels, Label, ViewStroke};

use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage};

use crate::config::EditorConfig;
use crate::error::{Capability, EditorError, Result, SessionKind};
use crate::geometry::Rect;
use crate::ops::{CutInit, ImageOps};

/// State carried from the initial cut into later refinements.
#[derive(Debug, Clone)]
pub struct SegmentationSession {
    mask: GrayImage,
    models: CutModels,
    scale_factor: f64,
    working_width: u32,
    working_height: u32,
    last_applied_strokes: Vec<BrushStroke>,
}

impl SegmentationSession {
    /// Label mask at working resolution (values are [`Label`] bytes).
    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    pub fn label_at(&self, x: u32, y: u32) -> Option<Label> {
        (x < self.working_width && y < self.working_height)
            .then(|| Label::from_u8(self.mask.get_pixel(x, y)[0]))
    }

    pub fn models(&self) -> &CutModels {
        &self.models
    }

    /// Working size divided by full size, `1.0` when no downscale happened.
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn working_dimensions(&self) -> (u32, u32) {
        (self.working_width, self.working_height)
    }

    pub fn last_applied_strokes(&self) -> &[BrushStroke] {
        &self.last_applied_strokes
    }
}

#[derive(Debug, Default)]
pub struct SegmentationEngine {
    session: Option<SegmentationSession>,
}

impl SegmentationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&SegmentationSession> {
        self.session.as_ref()
    }

    pub fn has_mask(&self) -> bool {
        self.session.is_some()
    }

    /// Drop the session. Safe to call when there is none.
    pub fn clear(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!("Cleared cut session");
        }
    }

    /// Cut the foreground out of `raster` and write it into the alpha channel.
    ///
    /// A previous session is replaced only once the new cut succeeded.
    pub fn initial_cut(
        &mut self,
        ops: &dyn ImageOps,
        config: &EditorConfig,
        raster: &mut RgbaImage,
    ) -> Result<()> {
        if !ops.capabilities().energy_cut {
            return Err(EditorError::Unavailable(Capability::EnergyCut));
        }

        let _span = tracing::debug_span!("initial_cut").entered();
        let (width, height) = raster.dimensions();
        let max_dim = width.max(height);
        let scale_factor = if max_dim > config.max_working_dimension {
            config.max_working_dimension as f64 / max_dim as f64
        } else {
            1.0
        };
        let working_width = ((width as f64 * scale_factor).round() as u32).max(1);
        let working_height = ((height as f64 * scale_factor).round() as u32).max(1);

        let inset_x = ((working_width as f64 * config.inset_fraction).floor() as u32).max(1);
        let inset_y = ((working_height as f64 * config.inset_fraction).floor() as u32).max(1);
        if working_width <= inset_x * 2 || working_height <= inset_y * 2 {
            return Err(EditorError::InvalidGeometry(format!(
                "{width}x{height} is too small to cut"
            )));
        }
        let rect = Rect::new(
            inset_x,
            inset_y,
            working_width - inset_x * 2,
            working_height - inset_y * 2,
        );
        tracing::debug!(
            "Cut at {}x{} (scale {:.3}), seed {:?}",
            working_width,
            working_height,
            scale_factor,
            rect
        );

        let rgb = to_rgb(&ops.resize(raster, working_width, working_height));
        let mut mask = GrayImage::new(working_width, working_height);
        let mut models = CutModels::default();
        ops.energy_cut(&rgb, &mut mask, CutInit::Rect(rect), &mut models, config.rect_iterations)?;
        ops.energy_cut(&rgb, &mut mask, CutInit::Mask, &mut models, config.mask_iterations)?;

        postprocess::apply_mask_to_alpha(ops, config, raster, &mask)?;

        self.session = Some(SegmentationSession {
            mask,
            models,
            scale_factor,
            working_width,
            working_height,
            last_applied_strokes: Vec::new(),
        });
        tracing::info!("Cut session created at {}x{}", working_width, working_height);
        Ok(())
    }

    /// Re-run the cut with user strokes painted onto the stored mask.
    ///
    /// Strokes are in full-resolution coordinates. The stored colour models
    /// seed the pass instead of being learned again.
    pub fn refine(
        &mut self,
        ops: &dyn ImageOps,
        config: &EditorConfig,
        raster: &mut RgbaImage,
        strokes: &[BrushStroke],
    ) -> Result<()> {
        let session = self
            .session
            .as_ref()
            .ok_or(EditorError::NoSession(SessionKind::Cut))?;
        if strokes.is_empty() {
            return Ok(());
        }

        let _span = tracing::debug_span!("refine_cut", strokes = strokes.len()).entered();
        let (ww, wh) = (session.working_width, session.working_height);
        let rgb = to_rgb(&ops.resize(raster, ww, wh));

        let mut mask = session.mask.clone();
        for stroke in strokes {
            paint_labels(&mut mask, stroke, session.scale_factor);
        }

        let mut models = session.models.clone();
        ops.energy_cut(&rgb, &mut mask, CutInit::Mask, &mut models, config.refine_iterations)?;

        postprocess::apply_mask_to_alpha(ops, config, raster, &mask)?;

        if let Some(session) = self.session.as_mut() {
            session.mask = mask;
            session.models = models;
            session.last_applied_strokes = strokes.to_vec();
        }
        tracing::info!("Refined cut with {} strokes", strokes.len());
        Ok(())
    }
}

/// Paint a stroke's disks as definite labels, scaling into working space.
fn paint_labels(mask: &mut GrayImage, stroke: &BrushStroke, scale_factor: f64) {
    let value = match stroke.mode {
        BrushMode::Foreground => Label::Foreground,
        BrushMode::Background => Label::Background,
    } as u8;
    let r = ((stroke.radius as f64 * scale_factor).round() as i64).max(1);
    for point in &stroke.points {
        let cx = (point.x * scale_factor).round() as i64;
        let cy = (point.y * scale_factor).round() as i64;
        paint_disk(mask, cx, cy, r, value);
    }
}

/// Fill every pixel with `dx² + dy² <= r²` around `(cx, cy)`, clipped to the
/// mask bounds. Disks entirely off the mask paint nothing.
pub(crate) fn paint_disk(mask: &mut GrayImage, cx: i64, cy: i64, r: i64, value: u8) {
    let (w, h) = (mask.width() as i64, mask.height() as i64);
    let r = r.max(0);
    let x_range = cx.saturating_sub(r).max(0)..=cx.saturating_add(r).min(w - 1);
    let y_range = cy.saturating_sub(r).max(0)..=cy.saturating_add(r).min(h - 1);
    let r_sq = r as f64 * r as f64;
    for y in y_range {
        let dy = y as f64 - cy as f64;
        for x in x_range.clone() {
            let dx = x as f64 - cx as f64;
            if dx * dx + dy * dy <= r_sq {
                mask.put_pixel(x as u32, y as u32, Luma([value]));
            }
        }
    }
}

fn to_rgb(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        Rgb([p[0], p[1], p[2]])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ImagePoint;
    use crate::ops::{Capabilities, CpuOps};
    use image::Rgba;

    /// A red object filling most of the frame, with a grey margin.
    fn scene(width: u32, height: u32, margin: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let inside = x >= margin && y >= margin && x < width - margin && y < height - margin;
            if inside {
                Rgba([210, 40 + (x % 3) as u8, 35, 255])
            } else {
                Rgba([120, 125, 130 + (y % 3) as u8, 255])
            }
        })
    }

    #[test]
    fn refine_without_session_fails() {
        let mut engine = SegmentationEngine::new();
        let mut raster = scene(40, 30, 8);
        let err = engine
            .refine(&CpuOps::new(), &EditorConfig::default(), &mut raster, &[])
            .unwrap_err();
        assert!(matches!(err, EditorError::NoSession(SessionKind::Cut)));
    }

    #[test]
    fn cut_requires_capability() {
        let ops = CpuOps::new().with_capabilities(Capabilities {
            energy_cut: false,
            morphology: true,
        });
        let mut engine = SegmentationEngine::new();
        let mut raster = scene(40, 30, 8);
        let before = raster.clone();
        let err = engine
            .initial_cut(&ops, &EditorConfig::default(), &mut raster)
            .unwrap_err();
        assert!(matches!(err, EditorError::Unavailable(Capability::EnergyCut)));
        assert!(!engine.has_mask());
        assert_eq!(raster, before);
    }

    #[test]
    fn cut_at_full_resolution_below_threshold() {
        let mut engine = SegmentationEngine::new();
        let mut raster = scene(400, 300, 30);
        engine
            .initial_cut(&CpuOps::new(), &EditorConfig::default(), &mut raster)
            .unwrap();

        let session = engine.session().unwrap();
        assert_eq!(session.scale_factor(), 1.0);
        assert_eq!(session.working_dimensions(), (400, 300));
        assert!(session.label_at(200, 150).unwrap().is_foreground());
        assert!(!session.label_at(5, 5).unwrap().is_foreground());
        assert!(raster.get_pixel(200, 150)[3] >= 250);
        assert_eq!(raster.get_pixel(2, 2)[3], 0);
    }

    #[test]
    fn background_stroke_relabels_without_new_cut() {
        let ops = CpuOps::new();
        let config = EditorConfig::default();
        let mut engine = SegmentationEngine::new();
        let mut raster = scene(400, 300, 30);
        engine.initial_cut(&ops, &config, &mut raster).unwrap();
        assert!(engine.session().unwrap().label_at(50, 50).unwrap().is_foreground());

        let stroke = BrushStroke::new(BrushMode::Background, 10, vec![ImagePoint::new(50.0, 50.0)]);
        engine.refine(&ops, &config, &mut raster, &[stroke.clone()]).unwrap();

        let session = engine.session().unwrap();
        assert_eq!(session.label_at(50, 50), Some(Label::Background));
        assert_eq!(session.label_at(50, 60), Some(Label::Background));
        assert!(session.label_at(200, 150).unwrap().is_foreground());
        assert_eq!(session.last_applied_strokes(), &[stroke]);
        assert!(!session.models().is_empty());
        assert!(raster.get_pixel(50, 50)[3] <= 5);
    }

    #[test]
    fn large_images_are_cut_at_working_resolution() {
        let ops = CpuOps::new();
        let config = EditorConfig::default().with_max_working_dimension(100);
        let mut engine = SegmentationEngine::new();
        let mut raster = scene(400, 200, 40);
        engine.initial_cut(&ops, &config, &mut raster).unwrap();

        let session = engine.session().unwrap();
        assert_eq!(session.working_dimensions(), (100, 50));
        assert!((session.scale_factor() - 0.25).abs() < 1e-9);

        // Full-resolution stroke lands at a quarter of its coordinates.
        let stroke = BrushStroke::new(BrushMode::Background, 8, vec![ImagePoint::new(200.0, 100.0)]);
        engine.refine(&ops, &config, &mut raster, &[stroke]).unwrap();
        let session = engine.session().unwrap();
        assert_eq!(session.label_at(50, 25), Some(Label::Background));
        assert_eq!(session.label_at(52, 25), Some(Label::Background));
        assert_ne!(session.label_at(53, 25), Some(Label::Background));
        assert_eq!(raster.dimensions(), (400, 200));
    }

    #[test]
    fn failed_cut_keeps_previous_session() {
        let ops = CpuOps::new();
        let config = EditorConfig::default();
        let mut engine = SegmentationEngine::new();
        let mut raster = scene(100, 80, 20);
        engine.initial_cut(&ops, &config, &mut raster).unwrap();
        let mask = engine.session().unwrap().mask().clone();

        let mut tiny = scene(2, 2, 0);
        let before = tiny.clone();
        let err = engine.initial_cut(&ops, &config, &mut tiny).unwrap_err();
        assert!(matches!(err, EditorError::InvalidGeometry(_)));
        assert_eq!(tiny, before);
        assert_eq!(engine.session().unwrap().mask(), &mask);
        assert_eq!(engine.session().unwrap().working_dimensions(), (100, 80));
    }

    #[test]
    fn far_off_disks_are_clipped_without_overflow() {
        let mut mask = GrayImage::new(8, 6);
        paint_disk(&mut mask, 1e30 as i64, 3, 4, 9);
        paint_disk(&mut mask, -1e30 as i64, -1e30 as i64, i64::MAX, 9);
        assert!(mask.pixels().all(|p| p[0] == 0));

        paint_disk(&mut mask, 4, 3, i64::MAX, 7);
        assert!(mask.pixels().all(|p| p[0] == 7));

        let mut mask = GrayImage::new(8, 6);
        paint_disk(&mut mask, 0, 0, 1, 5);
        assert_eq!(mask.get_pixel(1, 0)[0], 5);
        assert_eq!(mask.get_pixel(1, 1)[0], 0);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut engine = SegmentationEngine::new();
        engine.clear();
        let mut raster = scene(60, 40, 8);
        engine
            .initial_cut(&CpuOps::new(), &EditorConfig::default(), &mut raster)
            .unwrap();
        assert!(engine.has_mask());
        engine.clear();
        engine.clear();
        assert!(!engine.has_mask());
    }
}

//! The mode dispatcher: owns the document, the history and both
//! segmentation sessions, and turns mode changes into recorded edits.

mod mode;
pub mod transform;

pub use mode::Mode;

use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::codec::OutputFormat;
use crate::command::{
    Command, ExtensionHandler, ExtensionRegistry, ML_REFINE_BRUSH, ML_REFINE_RERUN,
    ML_REMOVE_BACKGROUND,
};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::error::{Capability, EditorError, Result, SessionKind};
use crate::geometry::{Quad, Rect, ViewQuad};
use crate::history::History;
use crate::matting::{ForegroundModel, MattingEngine};
use crate::ops::{CpuOps, FlipAxis, ImageOps};
use crate::segmentation::{BrushStroke, SegmentationEngine, ViewStroke};
use transform::Replayer;

/// Rotation step used until [`Editor::set_angle`] is called.
pub const DEFAULT_ANGLE: f64 = 90.0;

pub struct Editor {
    config: EditorConfig,
    ops: Box<dyn ImageOps>,
    document: Document,
    history: History,
    cut: SegmentationEngine,
    matting: MattingEngine,
    model: Option<Box<dyn ForegroundModel>>,
    extensions: ExtensionRegistry,
    mode: Mode,
    angle: f64,
    scale: Option<(u32, u32)>,
    crop_quad: Option<Quad>,
    crop_suggestion: Option<Quad>,
    pending_strokes: Vec<BrushStroke>,
    pending_corrections: Vec<BrushStroke>,
}

impl Editor {
    pub fn new(document: Document) -> Self {
        Self {
            config: EditorConfig::default(),
            ops: Box::new(CpuOps::new()),
            document,
            history: History::new(),
            cut: SegmentationEngine::new(),
            matting: MattingEngine::new(),
            model: None,
            extensions: ExtensionRegistry::default(),
            mode: Mode::Idle,
            angle: DEFAULT_ANGLE,
            scale: None,
            crop_quad: None,
            crop_suggestion: None,
            pending_strokes: Vec::new(),
            pending_corrections: Vec::new(),
        }
    }

    /// Decode `bytes` and start editing it.
    pub fn open(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        Ok(Self::new(Document::open(bytes)?))
    }

    pub fn with_config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_ops(mut self, ops: impl ImageOps + 'static) -> Self {
        self.ops = Box::new(ops);
        self
    }

    pub fn with_model(mut self, model: impl ForegroundModel + 'static) -> Self {
        self.model = Some(Box::new(model));
        self
    }

    /// Handle extension commands tagged `tag`, both when committed and on
    /// replay.
    pub fn register_extension(&mut self, tag: impl Into<String>, handler: impl ExtensionHandler + 'static) {
        self.extensions.register(tag, handler);
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn segmentation(&self) -> &SegmentationEngine {
        &self.cut
    }

    pub fn matting(&self) -> &MattingEngine {
        &self.matting
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f64) {
        self.angle = angle;
    }

    pub fn set_scale(&mut self, width: u32, height: u32) {
        self.scale = Some((width, height));
    }

    /// Quad proposed when crop mode was entered, in image space.
    pub fn crop_suggestion(&self) -> Option<&Quad> {
        self.crop_suggestion.as_ref()
    }

    pub fn pending_strokes(&self) -> &[BrushStroke] {
        &self.pending_strokes
    }

    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>> {
        self.document.encode(format)
    }

    /// Enter `mode` and run whatever it does.
    ///
    /// Setting the mode that is already active returns to `Idle`. Any
    /// failure also leaves the editor in `Idle`.
    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        if mode == self.mode && mode != Mode::Idle {
            tracing::debug!("Leaving {}", mode);
            self.enter_idle();
            return Ok(());
        }
        if self.mode.is_interactive() {
            tracing::debug!("Abandoning {}", self.mode);
            self.crop_quad = None;
            self.pending_strokes.clear();
        }
        tracing::info!("Mode {}", mode);
        let result = self.dispatch(mode);
        self.settle_on_error(result)
    }

    fn dispatch(&mut self, mode: Mode) -> Result<()> {
        match mode {
            Mode::Idle => {
                self.enter_idle();
                Ok(())
            }
            Mode::Crop | Mode::PerspectiveCrop => {
                let (w, h) = self.document.dimensions();
                let bounds = self
                    .ops
                    .detect_bounds(self.document.raster())
                    .unwrap_or(Rect::new(0, 0, w, h));
                tracing::debug!("Suggested crop {:?}", bounds);
                self.crop_suggestion = Some(Quad::from_rect(bounds));
                self.crop_quad = None;
                self.mode = mode;
                Ok(())
            }
            Mode::RotateLeft | Mode::RotateRight => {
                let angle = self.rotation_angle(&mode);
                self.mode = mode;
                transform::rotate(self.ops.as_ref(), &mut self.document, angle)?;
                self.push_history();
                self.mode = Mode::Idle;
                Ok(())
            }
            Mode::FlipHorizontal | Mode::FlipVertical => {
                let axis = if mode == Mode::FlipHorizontal {
                    FlipAxis::Horizontal
                } else {
                    FlipAxis::Vertical
                };
                self.mode = mode;
                transform::flip(self.ops.as_ref(), &mut self.document, axis);
                self.push_history();
                self.mode = Mode::Preview;
                Ok(())
            }
            Mode::Scale => {
                let (width, height) = self
                    .scale
                    .ok_or_else(|| EditorError::InvalidGeometry("no target size set".into()))?;
                self.mode = mode;
                transform::scale(self.ops.as_ref(), &mut self.document, width, height)?;
                self.push_history();
                self.mode = Mode::Preview;
                Ok(())
            }
            Mode::RemoveBackground => {
                self.mode = mode;
                self.cut
                    .initial_cut(self.ops.as_ref(), &self.config, self.document.raster_mut())?;
                self.push_history();
                self.mode = Mode::Preview;
                Ok(())
            }
            Mode::RefineBackground => {
                if !self.cut.has_mask() {
                    return Err(EditorError::NoSession(SessionKind::Cut));
                }
                self.pending_strokes.clear();
                self.mode = mode;
                Ok(())
            }
            Mode::Undo | Mode::Redo => {
                self.mode = mode.clone();
                if mode == Mode::Undo {
                    self.undo()?;
                } else {
                    self.redo()?;
                }
                self.mode = if self.history.pointer() == 0 {
                    Mode::Idle
                } else {
                    Mode::Preview
                };
                Ok(())
            }
            Mode::FullReset => {
                self.mode = mode;
                self.full_reset()
            }
            Mode::Preview | Mode::Custom(_) => {
                self.mode = mode;
                Ok(())
            }
        }
    }

    /// The command that records the current mode, or `None` for modes that
    /// are never recorded.
    ///
    /// # Panics
    ///
    /// For modes with nothing to record: `FullReset`, `Preview`, a custom
    /// mode, or a crop that has not been committed.
    pub fn history_entry(&self) -> Option<Command> {
        match &self.mode {
            Mode::Undo | Mode::Redo | Mode::Idle => None,
            Mode::RotateLeft => Some(Command::RotateLeft(self.rotation_angle(&self.mode))),
            Mode::RotateRight => Some(Command::RotateRight(self.rotation_angle(&self.mode))),
            Mode::Crop => Some(Command::Crop(self.committed_quad())),
            Mode::PerspectiveCrop => Some(Command::PerspectiveCrop(self.committed_quad())),
            Mode::FlipHorizontal => Some(Command::FlipHorizontal),
            Mode::FlipVertical => Some(Command::FlipVertical),
            Mode::Scale => {
                let (width, height) = self
                    .scale
                    .unwrap_or_else(|| panic!("scale recorded without a target size"));
                Some(Command::Scale { width, height })
            }
            Mode::RemoveBackground => Some(Command::RemoveBackground),
            Mode::RefineBackground => Some(Command::RefineBackground(self.pending_strokes.clone())),
            other @ (Mode::FullReset | Mode::Preview | Mode::Custom(_)) => {
                panic!("mode {other} has no history entry")
            }
        }
    }

    /// Record the current mode's edit. No-op for unrecorded modes.
    pub fn push_history(&mut self) {
        if let Some(command) = self.history_entry() {
            self.history.push(command);
        }
    }

    /// Apply the crop dragged in the preview. `ratio` is preview size
    /// divided by image size at the time of the drag.
    pub fn commit_crop(&mut self, quad: &ViewQuad, ratio: f64) -> Result<()> {
        let result = self.commit_crop_inner(quad, ratio);
        self.settle_on_error(result)
    }

    fn commit_crop_inner(&mut self, quad: &ViewQuad, ratio: f64) -> Result<()> {
        if !matches!(self.mode, Mode::Crop | Mode::PerspectiveCrop) {
            return Err(self.wrong_mode("commit a crop"));
        }
        let quad = quad.to_image(ratio)?;
        if self.mode == Mode::Crop {
            transform::crop(self.ops.as_ref(), &mut self.document, &quad)?;
        } else {
            transform::perspective_crop(self.ops.as_ref(), &mut self.document, &quad)?;
        }
        self.crop_quad = Some(quad);
        self.push_history();
        self.enter_idle();
        Ok(())
    }

    /// Queue a refine stroke drawn in the preview.
    pub fn add_refine_stroke(&mut self, stroke: ViewStroke, ratio: f64) -> Result<()> {
        self.require_refine_mode("add a refine stroke")?;
        let stroke = self.to_image_stroke(stroke, ratio)?;
        self.pending_strokes.push(stroke);
        Ok(())
    }

    /// Run the refine pass with the queued strokes and record it.
    pub fn apply_refine(&mut self) -> Result<()> {
        let result = self.apply_refine_inner();
        self.settle_on_error(result)
    }

    fn apply_refine_inner(&mut self) -> Result<()> {
        self.require_refine_mode("apply refine strokes")?;
        if self.pending_strokes.is_empty() {
            self.mode = Mode::Preview;
            return Ok(());
        }
        self.cut.refine(
            self.ops.as_ref(),
            &self.config,
            self.document.raster_mut(),
            &self.pending_strokes,
        )?;
        self.push_history();
        self.pending_strokes.clear();
        self.mode = Mode::Preview;
        Ok(())
    }

    pub fn cancel_refine(&mut self) {
        tracing::debug!("Dropping {} refine strokes", self.pending_strokes.len());
        self.enter_idle();
    }

    /// Neural background removal on the current raster.
    pub fn remove_background_neural(&mut self, cancel: &CancelToken) -> Result<()> {
        let result = self.remove_background_neural_inner(cancel);
        self.settle_on_error(result)
    }

    fn remove_background_neural_inner(&mut self, cancel: &CancelToken) -> Result<()> {
        let model = self
            .model
            .as_deref_mut()
            .ok_or(EditorError::Unavailable(Capability::NeuralMask))?;
        let composited = self.matting.segment(self.document.raster(), model, cancel)?;
        self.pending_corrections.clear();
        self.commit_raster(ML_REMOVE_BACKGROUND, composited)
    }

    /// Queue a correction stroke for the neural mask.
    pub fn add_correction_stroke(&mut self, stroke: ViewStroke, ratio: f64) -> Result<()> {
        if !self.matting.has_mask() {
            return Err(EditorError::NoSession(SessionKind::Matting));
        }
        let stroke = self.to_image_stroke(stroke, ratio)?;
        self.pending_corrections.push(stroke);
        Ok(())
    }

    /// Paint the queued corrections into the neural mask. No inference.
    pub fn apply_corrections(&mut self) -> Result<()> {
        let result = self.apply_corrections_inner();
        self.settle_on_error(result)
    }

    fn apply_corrections_inner(&mut self) -> Result<()> {
        if !self.matting.has_mask() {
            return Err(EditorError::NoSession(SessionKind::Matting));
        }
        if self.pending_corrections.is_empty() {
            self.mode = Mode::Preview;
            return Ok(());
        }
        let composited = self.matting.apply_brush_corrections(&self.pending_corrections)?;
        self.pending_corrections.clear();
        self.commit_raster(ML_REFINE_BRUSH, composited)
    }

    pub fn cancel_corrections(&mut self) {
        tracing::debug!("Dropping {} correction strokes", self.pending_corrections.len());
        self.pending_corrections.clear();
    }

    pub fn pending_corrections(&self) -> &[BrushStroke] {
        &self.pending_corrections
    }

    /// Infer again from the pristine source, keeping the user's corrections.
    pub fn rerun_neural(&mut self, cancel: &CancelToken) -> Result<()> {
        let result = self.rerun_neural_inner(cancel);
        self.settle_on_error(result)
    }

    fn rerun_neural_inner(&mut self, cancel: &CancelToken) -> Result<()> {
        if !self.matting.has_mask() {
            return Err(EditorError::NoSession(SessionKind::Matting));
        }
        let model = self
            .model
            .as_deref_mut()
            .ok_or(EditorError::Unavailable(Capability::NeuralMask))?;
        let composited = self.matting.rerun_with_corrections(model, cancel)?;
        self.commit_raster(ML_REFINE_RERUN, composited)
    }

    /// Apply a registered extension and record it.
    ///
    /// The document is only replaced when the handler succeeds.
    pub fn commit_extension(&mut self, tag: &str, payload: impl Into<Arc<[u8]>>) -> Result<()> {
        let result = self.commit_extension_inner(tag, payload.into());
        self.settle_on_error(result)
    }

    fn commit_extension_inner(&mut self, tag: &str, payload: Arc<[u8]>) -> Result<()> {
        let mut document = self.document.clone();
        self.extensions.apply(tag, &mut document, &payload)?;
        self.document = document;
        self.history.push(Command::Extension {
            tag: tag.to_string(),
            payload,
        });
        self.mode = Mode::Preview;
        Ok(())
    }

    /// Step the log back one entry, rebuilding the raster by replay.
    pub fn undo(&mut self) -> Result<()> {
        let target = self.history.undo_target()?;
        self.rebuild(target)?;
        self.history.set_pointer(target);
        tracing::info!("Undo to {}/{}", target, self.history.len());
        Ok(())
    }

    /// Step the log forward one entry, replaying from the source.
    pub fn redo(&mut self) -> Result<()> {
        let target = self.history.redo_target()?;
        self.rebuild(target)?;
        self.history.set_pointer(target);
        tracing::info!("Redo to {}/{}", target, self.history.len());
        Ok(())
    }

    /// Drop the coarse cut session, leaving the neural one and the raster.
    pub fn clear_cut_session(&mut self) {
        self.cut.clear();
        self.pending_strokes.clear();
        if self.mode == Mode::RefineBackground {
            self.mode = Mode::Idle;
        }
    }

    /// Drop the neural session and its queued corrections.
    pub fn clear_neural_session(&mut self) {
        self.matting.clear();
        self.pending_corrections.clear();
    }

    /// Drop every edit, both sessions and the log.
    pub fn full_reset(&mut self) -> Result<()> {
        self.document.reset()?;
        self.history.clear();
        self.cut.clear();
        self.matting.clear();
        self.enter_idle();
        tracing::info!("Full reset");
        Ok(())
    }

    /// Make the document reflect `commands[..pointer]`. State is only
    /// replaced once the whole prefix replayed cleanly.
    fn rebuild(&mut self, pointer: usize) -> Result<()> {
        if pointer == 0 {
            self.document.reset()?;
            self.cut.clear();
            return Ok(());
        }
        let replayer = Replayer {
            ops: self.ops.as_ref(),
            config: &self.config,
            extensions: &self.extensions,
        };
        let (document, cut) = replayer.replay(&self.document, &self.history.commands()[..pointer])?;
        self.document = document;
        self.cut = cut;
        Ok(())
    }

    fn commit_raster(&mut self, tag: &str, raster: image::RgbaImage) -> Result<()> {
        let payload = transform::snapshot_payload(&raster)?;
        self.document.replace(raster);
        self.history.push(Command::Extension {
            tag: tag.to_string(),
            payload: payload.into(),
        });
        self.mode = Mode::Preview;
        Ok(())
    }

    fn rotation_angle(&self, mode: &Mode) -> f64 {
        match mode {
            Mode::RotateRight => (360.0 - self.angle).rem_euclid(360.0),
            _ => self.angle.rem_euclid(360.0),
        }
    }

    fn committed_quad(&self) -> Quad {
        self.crop_quad
            .unwrap_or_else(|| panic!("crop recorded before a quad was committed"))
    }

    fn wrong_mode(&self, action: &'static str) -> EditorError {
        EditorError::WrongMode {
            action,
            mode: self.mode.clone(),
        }
    }

    fn require_refine_mode(&self, action: &'static str) -> Result<()> {
        if !self.cut.has_mask() {
            return Err(EditorError::NoSession(SessionKind::Cut));
        }
        if self.mode != Mode::RefineBackground {
            return Err(self.wrong_mode(action));
        }
        Ok(())
    }

    fn to_image_stroke(&self, stroke: ViewStroke, ratio: f64) -> Result<BrushStroke> {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(EditorError::InvalidGeometry(format!(
                "resize ratio must be positive, got {ratio}"
            )));
        }
        let stroke = ViewStroke {
            size: self.config.clamp_brush(stroke.size),
            ..stroke
        };
        Ok(stroke.to_image(ratio))
    }

    fn enter_idle(&mut self) {
        self.mode = Mode::Idle;
        self.crop_quad = None;
        self.crop_suggestion = None;
        self.pending_strokes.clear();
        self.pending_corrections.clear();
    }

    fn settle_on_error(&mut self, result: Result<()>) -> Result<()> {
        if let Err(err) = &result {
            tracing::warn!("{} failed: {}", self.mode, err);
            self.enter_idle();
        }
        result
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("mode", &self.mode)
            .field("dimensions", &self.document.dimensions())
            .field("history", &self.history)
            .field("cut_session", &self.cut.has_mask())
            .field("neural_session", &self.matting.has_mask())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::geometry::ViewPoint;
    use image::{Rgba, RgbaImage};
    use pretty_assertions::assert_eq;

    fn editor(w: u32, h: u32) -> Editor {
        let img = RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 3) as u8, (y * 5) as u8, 40, 255]));
        Editor::open(codec::encode(&img, OutputFormat::Png, None).unwrap()).unwrap()
    }

    #[test]
    fn rotate_right_records_complement() {
        let mut ed = editor(30, 20);
        ed.set_angle(90.0);
        ed.set_mode(Mode::RotateRight).unwrap();
        assert_eq!(ed.history().commands(), &[Command::RotateRight(270.0)]);
        assert_eq!(ed.mode(), &Mode::Idle);
        assert_eq!(ed.document().dimensions(), (20, 30));

        ed.set_angle(-90.0);
        ed.set_mode(Mode::RotateLeft).unwrap();
        assert_eq!(ed.history().commands()[1], Command::RotateLeft(270.0));
    }

    #[test]
    fn fire_and_settle_modes_land_in_preview() {
        let mut ed = editor(30, 20);
        ed.set_mode(Mode::FlipHorizontal).unwrap();
        assert_eq!(ed.mode(), &Mode::Preview);
        ed.set_scale(15, 10);
        ed.set_mode(Mode::Scale).unwrap();
        assert_eq!(ed.document().dimensions(), (15, 10));
        assert_eq!(
            ed.history().commands(),
            &[Command::FlipHorizontal, Command::Scale { width: 15, height: 10 }]
        );
    }

    #[test]
    fn same_mode_twice_toggles_to_idle() {
        let mut ed = editor(30, 20);
        ed.set_mode(Mode::Crop).unwrap();
        assert!(ed.crop_suggestion().is_some());
        ed.set_mode(Mode::Crop).unwrap();
        assert_eq!(ed.mode(), &Mode::Idle);
        assert!(ed.crop_suggestion().is_none());
        assert!(ed.history().is_empty());
    }

    #[test]
    fn crop_commits_in_image_space() {
        let mut ed = editor(40, 30);
        ed.set_mode(Mode::Crop).unwrap();
        let quad = Quad::from_rect(Rect::new(4, 6, 20, 10)).to_view(0.5);
        ed.commit_crop(&quad, 0.5).unwrap();
        assert_eq!(ed.document().dimensions(), (20, 10));
        assert_eq!(ed.mode(), &Mode::Idle);
        assert_eq!(
            ed.history().commands(),
            &[Command::Crop(Quad::from_rect(Rect::new(4, 6, 20, 10)))]
        );
    }

    #[test]
    fn commit_crop_outside_crop_mode_fails() {
        let mut ed = editor(40, 30);
        let quad = Quad::from_rect(Rect::new(0, 0, 10, 10)).to_view(1.0);
        let err = ed.commit_crop(&quad, 1.0).unwrap_err();
        assert!(matches!(err, EditorError::WrongMode { mode: Mode::Idle, .. }));
        assert!(ed.history().is_empty());
    }

    #[test]
    fn refine_without_cut_returns_to_idle() {
        let mut ed = editor(40, 30);
        let err = ed.set_mode(Mode::RefineBackground).unwrap_err();
        assert!(matches!(err, EditorError::NoSession(SessionKind::Cut)));
        assert_eq!(ed.mode(), &Mode::Idle);
    }

    #[test]
    fn refine_strokes_are_clamped_and_recorded() {
        let mut ed = editor(60, 40);
        ed.set_mode(Mode::RemoveBackground).unwrap();
        ed.set_mode(Mode::RefineBackground).unwrap();
        let stroke = ViewStroke::new(
            crate::segmentation::BrushMode::Background,
            500,
            vec![ViewPoint::new(2.0, 2.0)],
        );
        ed.add_refine_stroke(stroke, 1.0).unwrap();
        assert_eq!(ed.pending_strokes()[0].radius, 50);
        ed.apply_refine().unwrap();
        assert_eq!(ed.mode(), &Mode::Preview);
        assert!(matches!(
            ed.history().commands().last(),
            Some(Command::RefineBackground(strokes)) if strokes.len() == 1
        ));
    }

    #[test]
    fn refine_strokes_outside_refine_mode_name_the_mode() {
        let mut ed = editor(60, 40);
        ed.set_mode(Mode::RemoveBackground).unwrap();
        let stroke = ViewStroke::new(
            crate::segmentation::BrushMode::Foreground,
            10,
            vec![ViewPoint::new(30.0, 20.0)],
        );
        let err = ed.add_refine_stroke(stroke, 1.0).unwrap_err();
        assert!(matches!(err, EditorError::WrongMode { mode: Mode::Preview, .. }));
        let err = ed.apply_refine().unwrap_err();
        assert_eq!(err.to_string(), "cannot apply refine strokes in preview mode");
        assert!(ed.segmentation().has_mask());
    }

    #[test]
    fn leaving_refine_mode_drops_queued_strokes() {
        let mut ed = editor(60, 40);
        ed.set_mode(Mode::RemoveBackground).unwrap();
        ed.set_mode(Mode::RefineBackground).unwrap();
        let stroke = ViewStroke::new(
            crate::segmentation::BrushMode::Background,
            10,
            vec![ViewPoint::new(2.0, 2.0)],
        );
        ed.add_refine_stroke(stroke, 1.0).unwrap();
        ed.set_mode(Mode::FlipHorizontal).unwrap();
        assert!(ed.pending_strokes().is_empty());
        assert_eq!(ed.history().len(), 2);
    }

    #[test]
    fn failing_extension_leaves_raster_untouched() {
        let mut ed = editor(10, 10);
        ed.register_extension("half-done", |doc: &mut Document, _: &[u8]| -> Result<()> {
            for p in doc.raster_mut().pixels_mut() {
                p[3] = 0;
            }
            Err(EditorError::InvalidGeometry("gave up".into()))
        });
        ed.set_mode(Mode::Crop).unwrap();
        let before = ed.document().raster().clone();

        assert!(ed.commit_extension("half-done", Vec::new()).is_err());
        assert!(ed.document().raster() == &before);
        assert!(ed.history().is_empty());
        assert_eq!(ed.mode(), &Mode::Idle);
        assert!(ed.crop_suggestion().is_none());
    }

    #[test]
    fn custom_mode_is_a_no_op() {
        let mut ed = editor(20, 20);
        ed.set_mode("sepia".parse().unwrap()).unwrap();
        assert_eq!(ed.mode(), &Mode::Custom("sepia".into()));
        assert!(ed.history().is_empty());
    }

    #[test]
    #[should_panic(expected = "has no history entry")]
    fn recording_preview_panics() {
        let mut ed = editor(20, 20);
        ed.set_mode(Mode::Preview).unwrap();
        ed.push_history();
    }

    #[test]
    #[should_panic(expected = "before a quad was committed")]
    fn recording_uncommitted_crop_panics() {
        let mut ed = editor(20, 20);
        ed.set_mode(Mode::Crop).unwrap();
        ed.push_history();
    }

    #[test]
    fn neural_removal_needs_a_model() {
        let mut ed = editor(20, 20);
        let err = ed.remove_background_neural(&CancelToken::new()).unwrap_err();
        assert!(matches!(err, EditorError::Unavailable(Capability::NeuralMask)));
        assert_eq!(ed.mode(), &Mode::Idle);
    }

    #[test]
    fn full_reset_clears_everything() {
        let mut ed = editor(40, 30);
        ed.set_mode(Mode::RotateLeft).unwrap();
        ed.set_mode(Mode::RemoveBackground).unwrap();
        ed.set_mode(Mode::FullReset).unwrap();
        assert_eq!(ed.mode(), &Mode::Idle);
        assert!(ed.history().is_empty());
        assert!(!ed.segmentation().has_mask());
        assert_eq!(ed.document().dimensions(), (40, 30));
        assert!(ed.document().raster().pixels().all(|p| p[3] == 255));
    }
}

//! Recorded edit commands and the registry for extension commands.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::codec;
use crate::document::Document;
use crate::error::{EditorError, Result};
use crate::geometry::Quad;
use crate::segmentation::BrushStroke;

/// Tag of the neural background removal result.
pub const ML_REMOVE_BACKGROUND: &str = "ml-remove-background";
/// Tag of a neural mask after brush corrections.
pub const ML_REFINE_BRUSH: &str = "ml-refine-brush";
/// Tag of a neural mask re-run with corrections merged.
pub const ML_REFINE_RERUN: &str = "ml-refine-rerun";

/// One entry of the edit log.
///
/// Each variant carries what is needed to re-derive its result from the
/// original raster, in image-space coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Counter-clockwise angle in degrees, already reduced to `[0, 360)`
    RotateLeft(f64),
    /// Recorded with the complementary angle `(360 - θ) mod 360`
    RotateRight(f64),
    Crop(Quad),
    PerspectiveCrop(Quad),
    FlipHorizontal,
    FlipVertical,
    Scale { width: u32, height: u32 },
    RemoveBackground,
    RefineBackground(Vec<BrushStroke>),
    Extension { tag: String, payload: Arc<[u8]> },
}

impl Command {
    pub fn name(&self) -> &str {
        match self {
            Command::RotateLeft(_) => "rotate-left",
            Command::RotateRight(_) => "rotate-right",
            Command::Crop(_) => "crop",
            Command::PerspectiveCrop(_) => "perspective-crop",
            Command::FlipHorizontal => "flip-horizontal",
            Command::FlipVertical => "flip-vertical",
            Command::Scale { .. } => "scale",
            Command::RemoveBackground => "remove-background",
            Command::RefineBackground(_) => "refine-background",
            Command::Extension { tag, .. } => tag.as_str(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::RotateLeft(angle) | Command::RotateRight(angle) => {
                write!(f, "{}({})", self.name(), angle)
            }
            Command::Scale { width, height } => write!(f, "scale({width}x{height})"),
            Command::RefineBackground(strokes) => {
                write!(f, "refine-background({} strokes)", strokes.len())
            }
            Command::Extension { tag, payload } => write!(f, "{tag}({} bytes)", payload.len()),
            _ => f.write_str(self.name()),
        }
    }
}

/// Re-applies an extension command during replay.
pub trait ExtensionHandler {
    fn apply(&self, document: &mut Document, payload: &[u8]) -> Result<()>;
}

impl<F> ExtensionHandler for F
where
    F: Fn(&mut Document, &[u8]) -> Result<()>,
{
    fn apply(&self, document: &mut Document, payload: &[u8]) -> Result<()> {
        self(document, payload)
    }
}

/// Replaces the raster with the image encoded in the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceRaster;

impl ExtensionHandler for ReplaceRaster {
    fn apply(&self, document: &mut Document, payload: &[u8]) -> Result<()> {
        document.replace(codec::decode(payload)?);
        Ok(())
    }
}

/// Extension handlers keyed by command tag.
pub struct ExtensionRegistry {
    handlers: HashMap<String, Box<dyn ExtensionHandler>>,
}

impl ExtensionRegistry {
    /// A registry with no handlers at all.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Replaces any handler already registered under `tag`.
    pub fn register(&mut self, tag: impl Into<String>, handler: impl ExtensionHandler + 'static) {
        let tag = tag.into();
        tracing::debug!("Registered extension handler `{}`", tag);
        self.handlers.insert(tag, Box::new(handler));
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }

    pub fn apply(&self, tag: &str, document: &mut Document, payload: &[u8]) -> Result<()> {
        match self.handlers.get(tag) {
            Some(handler) => handler.apply(document, payload),
            None => {
                tracing::error!("No handler for extension command `{}`", tag);
                Err(EditorError::UnregisteredExtension(tag.to_string()))
            }
        }
    }
}

impl Default for ExtensionRegistry {
    /// The neural removal tags, all replayed as raster replacement.
    fn default() -> Self {
        let mut registry = Self::empty();
        for tag in [ML_REMOVE_BACKGROUND, ML_REFINE_BRUSH, ML_REFINE_RERUN] {
            registry.register(tag, ReplaceRaster);
        }
        registry
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&String> = self.handlers.keys().collect();
        tags.sort();
        f.debug_struct("ExtensionRegistry").field("tags", &tags).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::OutputFormat;
    use image::{Rgba, RgbaImage};

    fn document() -> Document {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        Document::open(codec::encode(&img, OutputFormat::Png, None).unwrap()).unwrap()
    }

    #[test]
    fn builtin_tags_replace_raster() {
        let registry = ExtensionRegistry::default();
        let replacement = RgbaImage::from_pixel(5, 4, Rgba([9, 9, 9, 0]));
        let payload = codec::encode(&replacement, OutputFormat::Png, None).unwrap();

        let mut doc = document();
        registry.apply(ML_REFINE_BRUSH, &mut doc, &payload).unwrap();
        assert_eq!(doc.raster(), &replacement);
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let registry = ExtensionRegistry::default();
        let err = registry.apply("sharpen", &mut document(), &[]).unwrap_err();
        assert!(matches!(err, EditorError::UnregisteredExtension(tag) if tag == "sharpen"));
    }

    #[test]
    fn closures_are_handlers() {
        let mut registry = ExtensionRegistry::empty();
        registry.register("invert-alpha", |doc: &mut Document, _: &[u8]| -> Result<()> {
            for p in doc.raster_mut().pixels_mut() {
                p[3] = 255 - p[3];
            }
            Ok(())
        });
        let mut doc = document();
        registry.apply("invert-alpha", &mut doc, &[]).unwrap();
        assert_eq!(doc.raster().get_pixel(0, 0)[3], 0);
        assert!(!registry.contains(ML_REMOVE_BACKGROUND));
    }

    #[test]
    fn display_names_parameters() {
        assert_eq!(Command::RotateLeft(90.0).to_string(), "rotate-left(90)");
        assert_eq!(Command::Scale { width: 4, height: 3 }.to_string(), "scale(4x3)");
        assert_eq!(Command::FlipVertical.to_string(), "flip-vertical");
    }
}

//! Image editor core: a replayable edit history over a retained RGBA
//! raster, plus coarse (energy cut) and neural background removal sessions.

pub mod cancel;
pub mod codec;
pub mod command;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod history;
pub mod matting;
pub mod ops;
pub mod segmentation;

pub use cancel::CancelToken;
pub use codec::OutputFormat;
pub use command::{Command, ExtensionHandler, ExtensionRegistry};
pub use config::EditorConfig;
pub use document::Document;
pub use editor::{Editor, Mode};
pub use error::{EditorError, Result};
pub use geometry::{ImagePoint, Quad, ViewPoint, ViewQuad};
pub use history::History;
pub use matting::{ForegroundModel, MattingEngine};
pub use ops::{CpuOps, ImageOps};
pub use segmentation::{BrushMode, BrushStroke, SegmentationEngine, ViewStroke};

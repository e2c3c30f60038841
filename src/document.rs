use std::sync::Arc;

use image::{ImageFormat, RgbaImage};

use crate::codec::{self, OutputFormat};
use crate::error::Result;

/// The raster being edited plus the source it was decoded from.
///
/// The source bytes are kept verbatim so the document can always be rebuilt
/// from pixel zero; that is what undo, redo and full reset do.
#[derive(Debug, Clone)]
pub struct Document {
    source: Arc<[u8]>,
    source_format: Option<ImageFormat>,
    original_dimensions: (u32, u32),
    raster: RgbaImage,
}

impl Document {
    pub fn open(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let source: Arc<[u8]> = bytes.into();
        let raster = codec::decode(&source)?;
        let source_format = codec::detect_format(&source);
        let original_dimensions = raster.dimensions();
        tracing::info!(
            "Opened {}x{} document ({:?})",
            original_dimensions.0,
            original_dimensions.1,
            source_format
        );
        Ok(Self {
            source,
            source_format,
            original_dimensions,
            raster,
        })
    }

    /// A new document decoded from the same source, unedited.
    pub fn pristine(&self) -> Result<Self> {
        let raster = codec::decode(&self.source)?;
        Ok(Self {
            source: Arc::clone(&self.source),
            source_format: self.source_format,
            original_dimensions: self.original_dimensions,
            raster,
        })
    }

    /// Drop all edits by decoding the source again.
    pub fn reset(&mut self) -> Result<()> {
        self.raster = codec::decode(&self.source)?;
        Ok(())
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn raster_mut(&mut self) -> &mut RgbaImage {
        &mut self.raster
    }

    pub fn replace(&mut self, raster: RgbaImage) {
        self.raster = raster;
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.raster.dimensions()
    }

    pub fn original_dimensions(&self) -> (u32, u32) {
        self.original_dimensions
    }

    pub fn source_bytes(&self) -> &[u8] {
        &self.source
    }

    pub fn source_format(&self) -> Option<ImageFormat> {
        self.source_format
    }

    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>> {
        codec::encode(&self.raster, format, self.source_format)
    }
}

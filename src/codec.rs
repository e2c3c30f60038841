//! Raster decode/encode.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, RgbaImage};

use crate::error::{EditorError, Result};

/// Quality used when a lossy source is re-encoded in its own format.
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Target format for [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    /// Lossless WebP
    WebP,
    Jpeg { quality: u8 },
    /// Re-encode in whatever format the document was loaded from
    KeepSource,
}

pub fn decode(bytes: &[u8]) -> Result<RgbaImage> {
    let image = image::load_from_memory(bytes).map_err(EditorError::Decode)?;
    Ok(image.to_rgba8())
}

/// Sniff the container format from magic bytes.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

pub fn encode(
    raster: &RgbaImage,
    format: OutputFormat,
    source_format: Option<ImageFormat>,
) -> Result<Vec<u8>> {
    let format = match format {
        OutputFormat::KeepSource => match source_format {
            Some(ImageFormat::Jpeg) => OutputFormat::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            },
            Some(ImageFormat::WebP) => OutputFormat::WebP,
            _ => OutputFormat::Png,
        },
        other => other,
    };

    let (width, height) = raster.dimensions();
    let mut buf = Vec::new();
    match format {
        OutputFormat::Png | OutputFormat::KeepSource => PngEncoder::new(&mut buf)
            .write_image(raster.as_raw(), width, height, ExtendedColorType::Rgba8)
            .map_err(EditorError::Encode)?,
        OutputFormat::WebP => WebPEncoder::new_lossless(&mut buf)
            .write_image(raster.as_raw(), width, height, ExtendedColorType::Rgba8)
            .map_err(EditorError::Encode)?,
        OutputFormat::Jpeg { quality } => {
            // JPEG has no alpha channel
            let rgb = image::DynamicImage::ImageRgba8(raster.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(EditorError::Encode)?
        }
    }
    Ok(buf)
}

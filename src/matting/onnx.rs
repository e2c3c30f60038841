use super::preprocess::Preprocessor;
use super::types::ForegroundModel;
use anyhow::{bail, Context, Result};
use image::{GrayImage, RgbaImage};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;

/// Salient-object segmentation model loaded from an ONNX file
///
/// Expects a single `[1, 3, H, W]` image input and takes the first output as
/// a `[1, 1, H, W]` (or `[1, H, W]`) foreground map. U2-Net, ISNet and
/// similar background-removal exports fit this shape.
pub struct OnnxForegroundModel {
    session: Session,
    preprocessor: Preprocessor,
}

impl OnnxForegroundModel {
    /// Create a model from an ONNX file
    ///
    /// # Default Configuration
    /// - Input size: 320x320 with ImageNet normalization
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        Self::with_preprocessor(model_path, Preprocessor::new(320, 320))
    }

    pub fn with_preprocessor<P: AsRef<Path>>(model_path: P, preprocessor: Preprocessor) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading foreground model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!("Foreground model loaded successfully");

        Ok(Self {
            session,
            preprocessor,
        })
    }
}

impl ForegroundModel for OnnxForegroundModel {
    fn segment_foreground(&mut self, image: &RgbaImage) -> Result<GrayImage> {
        let _span = tracing::debug_span!("onnx_segment").entered();

        let tensor = self.preprocessor.preprocess(image);
        let shape = [1usize, 3, tensor.shape()[2], tensor.shape()[3]];
        let input = Tensor::from_array((shape, tensor.into_raw_vec()))?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![input])
            .context("Failed to run inference")?;
        drop(_infer_span);

        let (out_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Model output is not an f32 tensor")?;
        let dims: &[i64] = out_shape;
        let (mask_height, mask_width) = match dims {
            [.., h, w] => (*h as u32, *w as u32),
            _ => bail!("Unexpected model output shape {:?}", dims),
        };

        let (width, height) = image.dimensions();
        Ok(Preprocessor::postprocess_mask(
            data,
            mask_width,
            mask_height,
            width,
            height,
        ))
    }

    fn input_size(&self) -> (u32, u32) {
        self.preprocessor.target_size()
    }
}

//! ONNX face embedding model
//!
//! The model takes a `1x3xSxS` RGB tensor scaled to `[-1, 1]` and yields:
//! - output 0: the `1xD` face descriptor
//! - output 1 (optional): confidence that a face is present

use crate::{DetectorConfig, DetectorError, EmbeddingExtractor};
use async_trait::async_trait;
use camera_capture::VideoFrame;
use face_store::Embedding;
use image::imageops;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, info};

type EmbeddingPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Face embedder running an ONNX model with tract
pub struct OnnxFaceEmbedder {
    model: Arc<EmbeddingPlan>,
    input_size: u32,
    min_face_confidence: f32,
}

impl OnnxFaceEmbedder {
    /// Load the embedding model named in the configuration
    pub fn load(config: &DetectorConfig) -> Result<Self, DetectorError> {
        let path = config
            .embedding_model_path
            .as_deref()
            .ok_or_else(|| DetectorError::ModelLoad("No embedding model configured".to_string()))?;
        Self::from_path(path, config.embedding_input_size, config.min_face_confidence)
    }

    pub fn from_path(
        path: &Path,
        input_size: u32,
        min_face_confidence: f32,
    ) -> Result<Self, DetectorError> {
        info!("Loading face embedding model from {}", path.display());
        let size = input_size as usize;

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, 3, size, size]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| DetectorError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            model: Arc::new(model),
            input_size,
            min_face_confidence,
        })
    }
}

/// Resize and normalize a frame into an NCHW tensor
fn preprocess(frame: &VideoFrame, size: u32) -> Result<Tensor, DetectorError> {
    let rgb = frame
        .to_rgb_image()
        .map_err(|e| DetectorError::Extraction(e.to_string()))?;
    let resized = imageops::resize(&rgb, size, size, imageops::FilterType::Triangle);

    let s = size as usize;
    let input = tract_ndarray::Array4::from_shape_fn((1, 3, s, s), |(_, c, y, x)| {
        resized.get_pixel(x as u32, y as u32)[c] as f32 / 127.5 - 1.0
    });
    Ok(input.into())
}

/// Turn raw model outputs into a descriptor, or a typed failure
fn postprocess(
    descriptor: Vec<f32>,
    face_confidence: Option<f32>,
    min_face_confidence: f32,
) -> Result<Embedding, DetectorError> {
    if let Some(confidence) = face_confidence {
        if confidence < min_face_confidence {
            debug!("Face confidence {:.3} below {}", confidence, min_face_confidence);
            return Err(DetectorError::NoFaceDetected);
        }
    }

    if descriptor.is_empty() {
        return Err(DetectorError::Extraction("Model produced an empty descriptor".to_string()));
    }
    if descriptor.iter().any(|v| !v.is_finite()) {
        return Err(DetectorError::Extraction("Descriptor contains non-finite values".to_string()));
    }

    Ok(Embedding::new(descriptor))
}

fn run_model(
    model: &EmbeddingPlan,
    frame: &VideoFrame,
    input_size: u32,
    min_face_confidence: f32,
) -> Result<Embedding, DetectorError> {
    let input = preprocess(frame, input_size)?;
    let outputs = model
        .run(tvec!(input.into()))
        .map_err(|e| DetectorError::Extraction(e.to_string()))?;

    let descriptor: Vec<f32> = outputs
        .first()
        .ok_or_else(|| DetectorError::Extraction("Model produced no outputs".to_string()))?
        .to_array_view::<f32>()
        .map_err(|e| DetectorError::Extraction(e.to_string()))?
        .iter()
        .copied()
        .collect();

    let face_confidence = match outputs.get(1) {
        Some(scores) => scores
            .to_array_view::<f32>()
            .map_err(|e| DetectorError::Extraction(e.to_string()))?
            .iter()
            .copied()
            .next(),
        None => None,
    };

    postprocess(descriptor, face_confidence, min_face_confidence)
}

#[async_trait]
impl EmbeddingExtractor for OnnxFaceEmbedder {
    async fn extract(&self, frame: &VideoFrame) -> Result<Embedding, DetectorError> {
        let start = Instant::now();
        let model = Arc::clone(&self.model);
        let frame = frame.clone();
        let (input_size, min_face_confidence) = (self.input_size, self.min_face_confidence);

        let embedding = tokio::task::spawn_blocking(move || {
            run_model(&model, &frame, input_size, min_face_confidence)
        })
        .await
        .map_err(|e| DetectorError::Extraction(format!("Embedding task failed: {}", e)))??;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            dimension = embedding.len(),
            "Extracted face embedding"
        );
        Ok(embedding)
    }
}

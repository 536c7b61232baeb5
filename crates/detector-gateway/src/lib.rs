//! Detector Gateway
//!
//! Thin async boundary to the two model services the agent depends on:
//! - Face embedding extraction (local ONNX model)
//! - Drowsiness / eye-state classification (remote HTTP detector)
//!
//! Both are opaque: callers only see typed results or typed failures.

pub mod http;
pub mod monitoring;
pub mod onnx;

pub use http::HttpDrowsinessClassifier;
pub use monitoring::{DrowsinessStatus, EyeState, MonitoringResult};
pub use onnx::OnnxFaceEmbedder;

use async_trait::async_trait;
use camera_capture::VideoFrame;
use face_store::Embedding;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Detector error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("No face detected")]
    NoFaceDetected,

    #[error("Embedding extraction failed: {0}")]
    Extraction(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Produces one embedding for the most prominent face in a frame
#[async_trait]
pub trait EmbeddingExtractor: Send + Sync {
    async fn extract(&self, frame: &VideoFrame) -> Result<Embedding, DetectorError>;
}

/// Classifies a JPEG still for drowsiness and per-eye state
#[async_trait]
pub trait DrowsinessClassifier: Send + Sync {
    async fn classify(&self, jpeg: Vec<u8>) -> Result<MonitoringResult, DetectorError>;
}

/// Detector configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Base URL of the drowsiness detector service
    pub classifier_url: String,
    /// Classifier request timeout (milliseconds)
    pub request_timeout_ms: u64,
    /// Face embedding model (ONNX). Identity features are disabled without it.
    pub embedding_model_path: Option<PathBuf>,
    /// Square input size of the embedding model
    pub embedding_input_size: u32,
    /// Minimum face confidence reported by the model
    pub min_face_confidence: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            classifier_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_ms: 10_000,
            embedding_model_path: None,
            embedding_input_size: 150,
            min_face_confidence: 0.5,
        }
    }
}

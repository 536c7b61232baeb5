//! Camera Capture Library for the Drowsiness Monitor
//!
//! Provides the single shared video stream that monitoring and identity
//! operations take still frames from:
//! - Latest-frame stream fed by an external camera driver
//! - Image-directory playback source for bench setups
//! - JPEG encoding for frames shipped to remote detectors

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{FrameSource, ImageDirectorySource, SharedFrameSource};

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera source: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("No frame available yet")]
    NoFrame,

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Frame encoding failed: {0}")]
    Encode(String),
}

/// Camera configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Directory of still images played back as the camera stream.
    /// When unset, frames must be published into a [`SharedFrameSource`].
    pub frames_dir: Option<PathBuf>,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// JPEG quality used for frames uploaded to the classifier (1-100)
    pub jpeg_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            frames_dir: None,
            width: 640,
            height: 480,
            jpeg_quality: 85,
        }
    }
}

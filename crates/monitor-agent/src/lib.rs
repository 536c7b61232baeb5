//! Monitor Agent
//!
//! Session object tying the camera stream, the mode coordinator and the
//! detector models together:
//! - Enrollment of a named face into the gallery
//! - Recognition of the current face against the gallery
//! - Periodic drowsiness monitoring while no identity activity runs
//!
//! Every identity outcome, success or failure, is turned into the message
//! shown to the user.

mod agent;
mod status;

pub use agent::Agent;
pub use status::{AgentStatus, AlarmStatus, FaceSummary};

use camera_capture::CameraError;
use detector_gateway::DetectorError;
use face_store::StorageError;
use mode_coordinator::{Mode, TransitionError};
use serde::Serialize;
use thiserror::Error;

/// User-initiated identity activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityAction {
    Enroll,
    Recognize,
}

/// Identity operation errors
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("{0}")]
    Busy(#[from] TransitionError),

    #[error("Name must not be blank")]
    InvalidName,

    #[error("Face embedding model is unavailable")]
    ModelUnavailable,

    #[error("No face detected")]
    NoFaceDetected,

    #[error("Embedding extraction failed: {0}")]
    Extraction(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    /// The activity was cancelled while the detector was running
    #[error("Operation was cancelled")]
    Superseded,
}

impl From<DetectorError> for IdentityError {
    fn from(e: DetectorError) -> Self {
        match e {
            DetectorError::NoFaceDetected => IdentityError::NoFaceDetected,
            DetectorError::ModelLoad(_) => IdentityError::ModelUnavailable,
            DetectorError::Extraction(msg) | DetectorError::Network(msg) => {
                IdentityError::Extraction(msg)
            }
        }
    }
}

impl IdentityError {
    /// Message shown to the user for a failed `action`
    pub fn user_message(&self, action: IdentityAction) -> String {
        match self {
            IdentityError::Busy(TransitionError::Busy { active, .. }) => {
                format!("Camera is busy ({}). Please try again.", active)
            }
            IdentityError::Busy(_) => "Camera is busy. Please try again.".to_string(),
            IdentityError::InvalidName => "Please enter a name.".to_string(),
            IdentityError::ModelUnavailable => "Face recognition is unavailable.".to_string(),
            IdentityError::NoFaceDetected => {
                "No face detected. Please ensure your face is clearly visible.".to_string()
            }
            IdentityError::Superseded => "Operation cancelled.".to_string(),
            IdentityError::Extraction(_) | IdentityError::Storage(_) | IdentityError::Camera(_) => {
                match action {
                    IdentityAction::Enroll => "Failed to scan face. Please try again.",
                    IdentityAction::Recognize => "Failed to recognize face. Please try again.",
                }
                .to_string()
            }
        }
    }
}

/// Message shown when the user cancels `mode`
pub fn cancelled_message(mode: Mode) -> &'static str {
    match mode {
        Mode::Scanning => "Face scan cancelled",
        _ => "Recognition cancelled",
    }
}

/// Monitoring tick errors
#[derive(Error, Debug)]
pub enum MonitoringError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Detector error: {0}")]
    Detector(#[from] DetectorError),
}

/// Committed enrollment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrollment {
    pub name: String,
    /// Gallery size after the enrollment
    pub total_faces: usize,
}

impl Enrollment {
    pub fn message(&self) -> String {
        format!("Successfully registered {}", self.name)
    }
}

/// Recognition outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Recognition {
    Match { name: String, distance: f32 },
    Unknown,
    EmptyGallery,
}

impl Recognition {
    pub fn message(&self) -> String {
        match self {
            Recognition::Match { name, .. } => format!("Welcome back, {}!", name),
            Recognition::Unknown => "Unknown face detected".to_string(),
            Recognition::EmptyGallery => {
                "No known faces stored. Please scan a face first.".to_string()
            }
        }
    }
}

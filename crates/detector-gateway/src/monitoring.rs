//! Drowsiness classification results

use crate::DetectorError;
use serde::{Deserialize, Serialize};

/// Driver drowsiness status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DrowsinessStatus {
    Awake,
    Drowsy,
    /// The last monitoring request failed
    Error,
}

/// Per-eye state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum EyeState {
    Open,
    Closed,
    #[default]
    Unknown,
}

impl EyeState {
    fn from_label(label: &str) -> Self {
        match label {
            "Open" => EyeState::Open,
            "Close" | "Closed" => EyeState::Closed,
            _ => EyeState::Unknown,
        }
    }
}

/// Result of one monitoring tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonitoringResult {
    pub status: DrowsinessStatus,
    /// `[left, right]`
    pub eye_states: [EyeState; 2],
}

impl MonitoringResult {
    /// Explicit error indicator shown instead of stale data
    pub fn error() -> Self {
        Self {
            status: DrowsinessStatus::Error,
            eye_states: [EyeState::Unknown; 2],
        }
    }

    pub fn left_eye(&self) -> EyeState {
        self.eye_states[0]
    }

    pub fn right_eye(&self) -> EyeState {
        self.eye_states[1]
    }
}

/// Response body of the detector's `/detect` endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct DetectResponse {
    pub status: String,
    #[serde(default)]
    pub eye_states: Vec<String>,
}

impl TryFrom<DetectResponse> for MonitoringResult {
    type Error = DetectorError;

    fn try_from(response: DetectResponse) -> Result<Self, Self::Error> {
        let status = match response.status.as_str() {
            "Drowsy" => DrowsinessStatus::Drowsy,
            "Alert" | "Awake" => DrowsinessStatus::Awake,
            other => {
                return Err(DetectorError::Network(format!(
                    "Malformed response: unknown status {:?}",
                    other
                )))
            }
        };

        let eye = |i: usize| {
            response
                .eye_states
                .get(i)
                .map(|label| EyeState::from_label(label))
                .unwrap_or_default()
        };

        Ok(Self {
            status,
            eye_states: [eye(0), eye(1)],
        })
    }
}

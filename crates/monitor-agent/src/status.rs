//! Status display types

use chrono::{DateTime, Utc};
use detector_gateway::MonitoringResult;
use face_store::FaceRecord;
use mode_coordinator::Mode;
use serde::Serialize;

/// What the status display shows
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub mode: Mode,
    /// Latest monitoring result, `None` until the first tick completes
    pub monitoring: Option<MonitoringResult>,
    /// Message of the last identity operation
    pub face_message: Option<String>,
    /// False when the embedding model failed to load
    pub identity_available: bool,
    pub enrolled_faces: usize,
    pub alarm: AlarmStatus,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AlarmStatus {
    /// The latest tick sounded the alarm and it has not been acknowledged
    pub active: bool,
    pub fire_count: usize,
    pub acknowledged: bool,
}

/// One stored face, without its embedding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceSummary {
    pub index: usize,
    pub name: String,
    pub enrolled_at: DateTime<Utc>,
}

impl FaceSummary {
    pub(crate) fn new(index: usize, record: &FaceRecord) -> Self {
        Self {
            index,
            name: record.name().to_string(),
            enrolled_at: record.enrolled_at(),
        }
    }
}

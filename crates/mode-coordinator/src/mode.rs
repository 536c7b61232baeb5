//! Modes and the transition table

use serde::Serialize;
use std::fmt;

/// Exclusive activity currently permitted to use the camera and detectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Mode {
    #[default]
    Idle,
    Monitoring,
    Scanning,
    Recognizing,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::Monitoring => "monitoring",
            Mode::Scanning => "scanning",
            Mode::Recognizing => "recognizing",
        }
    }

    /// User-initiated identity activity
    pub fn is_foreground(&self) -> bool {
        matches!(self, Mode::Scanning | Mode::Recognizing)
    }

    /// Whether the machine may move from `self` to `to`.
    ///
    /// A foreground activity may take over from Monitoring; the periodic
    /// tick never takes over from anything.
    pub fn permits(self, to: Mode) -> bool {
        use Mode::*;
        matches!(
            (self, to),
            (Idle, Monitoring)
                | (Idle, Scanning)
                | (Idle, Recognizing)
                | (Monitoring, Scanning)
                | (Monitoring, Recognizing)
                | (Monitoring, Idle)
                | (Scanning, Idle)
                | (Recognizing, Idle)
        )
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode together with the epoch it was entered at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ModeSnapshot {
    pub mode: Mode,
    pub epoch: u64,
}

//! Drowsiness Alarm Implementation

use detector_gateway::DrowsinessStatus;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Alarm configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Sound the alarm at all
    pub enabled: bool,
    /// Consecutive drowsy ticks before the alarm fires (default: 1)
    pub consecutive_drowsy_ticks: u32,
    /// Minimum time between two alarms (seconds)
    pub cooldown_seconds: u64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            consecutive_drowsy_ticks: 1,
            cooldown_seconds: 5,
        }
    }
}

/// Snapshot of the alarm
#[derive(Debug, Clone, Copy, Default)]
pub struct AlarmState {
    /// Current run of drowsy ticks
    pub drowsy_streak: u32,
    /// Last time the alarm fired
    pub last_fired: Option<Instant>,
    /// Number of times fired
    pub fire_count: usize,
    /// Whether the last alarm was acknowledged
    pub acknowledged: bool,
}

/// Debounced, rate-limited drowsiness alarm
pub struct DrowsinessAlarm {
    config: AlarmConfig,
    state: AlarmState,
}

impl DrowsinessAlarm {
    pub fn new(config: AlarmConfig) -> Self {
        info!("Creating drowsiness alarm with config: {:?}", config);
        Self {
            config,
            state: AlarmState::default(),
        }
    }

    /// Feed one monitoring status; returns true when the alarm should sound
    pub fn observe(&mut self, status: DrowsinessStatus) -> bool {
        self.observe_at(status, Instant::now())
    }

    pub fn observe_at(&mut self, status: DrowsinessStatus, now: Instant) -> bool {
        match status {
            DrowsinessStatus::Awake => {
                self.state.drowsy_streak = 0;
                return false;
            }
            // A failed tick says nothing about the driver
            DrowsinessStatus::Error => return false,
            DrowsinessStatus::Drowsy => {
                self.state.drowsy_streak = self.state.drowsy_streak.saturating_add(1);
            }
        }

        if !self.config.enabled {
            return false;
        }

        if self.state.drowsy_streak < self.config.consecutive_drowsy_ticks.max(1) {
            debug!(
                "Drowsy tick {}/{}",
                self.state.drowsy_streak, self.config.consecutive_drowsy_ticks
            );
            return false;
        }

        if let Some(last) = self.state.last_fired {
            let cooldown = Duration::from_secs(self.config.cooldown_seconds);
            if now.saturating_duration_since(last) < cooldown {
                debug!("Alarm suppressed: in cooldown period");
                return false;
            }
        }

        self.state.last_fired = Some(now);
        self.state.fire_count += 1;
        self.state.acknowledged = false;
        metrics::counter!("drowsiness_alarms_total").increment(1);
        warn!(
            "Drowsiness alarm (streak: {}, count: {})",
            self.state.drowsy_streak, self.state.fire_count
        );
        true
    }

    /// Acknowledge the last alarm; returns false if none has fired
    pub fn acknowledge(&mut self) -> bool {
        if self.state.fire_count == 0 {
            return false;
        }
        self.state.acknowledged = true;
        info!("Drowsiness alarm acknowledged");
        true
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn fire_count(&self) -> usize {
        self.state.fire_count
    }

    pub fn reset(&mut self) {
        self.state = AlarmState::default();
    }
}

impl Default for DrowsinessAlarm {
    fn default() -> Self {
        Self::new(AlarmConfig::default())
    }
}

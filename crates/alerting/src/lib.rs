//! Alerting System
//!
//! Turns the stream of monitoring results into alarm decisions:
//! - Debounce: require N consecutive drowsy ticks
//! - Cooldown: suppress repeats while the driver is still being alerted

mod alarm;

pub use alarm::{AlarmConfig, AlarmState, DrowsinessAlarm};

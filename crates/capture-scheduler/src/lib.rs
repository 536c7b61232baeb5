//! Capture Scheduler for Periodic Drowsiness Monitoring
//!
//! Fires a monitoring tick at a fixed interval while no other activity
//! holds the camera. Busy ticks are skipped for good, never queued.

mod scheduler;

pub use scheduler::{CaptureScheduler, SchedulerConfig};

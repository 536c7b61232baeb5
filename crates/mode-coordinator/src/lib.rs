//! Mode Coordination
//!
//! Arbitrates which activity may use the shared camera stream and the
//! detector models at any instant:
//! - Idle: camera streaming, periodic monitoring tick allowed
//! - Monitoring: one drowsiness request in flight
//! - Scanning: user-initiated enrollment
//! - Recognizing: user-initiated identity match
//!
//! An activity holds a [`ModeLease`] for as long as it runs. Releasing or
//! dropping the lease returns the machine to Idle, and every transition
//! bumps an epoch so results from a cancelled activity can be recognised
//! as stale.

mod coordinator;
mod mode;

pub use coordinator::{ModeCoordinator, ModeLease};
pub use mode::{Mode, ModeSnapshot};

use thiserror::Error;

/// Transition errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{requested} rejected: {active} is in progress")]
    Busy { requested: Mode, active: Mode },

    #[error("{0} is not an activity that can be started")]
    NotAnActivity(Mode),
}

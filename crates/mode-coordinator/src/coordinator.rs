//! Coordinator and activity leases

use crate::{Mode, ModeSnapshot, TransitionError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

/// Single owner of the process-wide mode.
///
/// Cloning yields another handle to the same state machine.
#[derive(Clone)]
pub struct ModeCoordinator {
    state: Arc<watch::Sender<ModeSnapshot>>,
}

impl ModeCoordinator {
    /// Create a coordinator in Idle
    pub fn new() -> Self {
        let (state, _) = watch::channel(ModeSnapshot::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        self.state.borrow().mode
    }

    /// Current mode and epoch
    pub fn snapshot(&self) -> ModeSnapshot {
        *self.state.borrow()
    }

    /// Watch mode changes
    pub fn subscribe(&self) -> watch::Receiver<ModeSnapshot> {
        self.state.subscribe()
    }

    /// Start an activity.
    ///
    /// Succeeds from Idle. Scanning and Recognizing also take over from a
    /// running Monitoring tick, whose lease stops being current. A rejected
    /// request is dropped; nothing is queued.
    pub fn try_begin(&self, mode: Mode) -> Result<ModeLease, TransitionError> {
        if mode == Mode::Idle {
            return Err(TransitionError::NotAnActivity(mode));
        }

        let mut outcome = Err(TransitionError::NotAnActivity(mode));
        let mut preempted = false;
        self.state.send_if_modified(|state| {
            if !state.mode.permits(mode) {
                outcome = Err(TransitionError::Busy {
                    requested: mode,
                    active: state.mode,
                });
                return false;
            }
            preempted = state.mode == Mode::Monitoring;
            state.mode = mode;
            state.epoch += 1;
            outcome = Ok(state.epoch);
            true
        });

        let epoch = match outcome {
            Ok(epoch) => epoch,
            Err(e) => {
                metrics::counter!("mode_transitions_rejected_total", "requested" => mode.as_str())
                    .increment(1);
                debug!("{}", e);
                return Err(e);
            }
        };
        if preempted {
            metrics::counter!("monitoring_preempted_total").increment(1);
            info!("{} took over from an in-flight monitoring tick", mode);
        }

        let lease = ModeLease {
            coordinator: self.clone(),
            mode,
            epoch,
            id: Uuid::new_v4(),
            started_at: Instant::now(),
            released: false,
        };
        debug!(operation = %lease.id, epoch, "Entered {}", mode);
        Ok(lease)
    }

    /// Abort the running Scanning or Recognizing activity.
    ///
    /// The in-flight detector call is not interrupted; its lease simply
    /// stops being current. Returns the cancelled mode.
    pub fn cancel(&self) -> Option<Mode> {
        let mut cancelled = None;
        self.state.send_if_modified(|state| {
            if !state.mode.is_foreground() {
                return false;
            }
            cancelled = Some(state.mode);
            state.mode = Mode::Idle;
            state.epoch += 1;
            true
        });

        if let Some(mode) = cancelled {
            info!("Cancelled {}", mode);
        }
        cancelled
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.state.borrow().epoch == epoch
    }

    fn release(&self, mode: Mode, epoch: u64) -> bool {
        self.state.send_if_modified(|state| {
            if state.epoch != epoch {
                return false;
            }
            debug_assert_eq!(state.mode, mode);
            state.mode = Mode::Idle;
            state.epoch += 1;
            true
        })
    }
}

impl Default for ModeCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Permission to run one activity.
///
/// The machine returns to Idle when the lease is finished or dropped, unless
/// the activity was cancelled in the meantime.
#[must_use = "dropping the lease ends the activity immediately"]
pub struct ModeLease {
    coordinator: ModeCoordinator,
    mode: Mode,
    epoch: u64,
    id: Uuid,
    started_at: Instant,
    released: bool,
}

impl ModeLease {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Operation id for log correlation
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whether the machine is still in the mode this lease was granted for.
    ///
    /// Results produced under a lease that is no longer current are stale.
    pub fn is_current(&self) -> bool {
        self.coordinator.is_current(self.epoch)
    }

    /// End the activity. Returns false if it had already been cancelled.
    pub fn finish(mut self) -> bool {
        self.released = true;
        self.end()
    }

    fn end(&self) -> bool {
        let released = self.coordinator.release(self.mode, self.epoch);
        if released {
            debug!(
                operation = %self.id,
                elapsed_ms = self.started_at.elapsed().as_millis() as u64,
                "Left {}",
                self.mode
            );
        } else {
            debug!(operation = %self.id, "{} lease was already superseded", self.mode);
        }
        released
    }
}

impl Drop for ModeLease {
    fn drop(&mut self) {
        if !self.released {
            self.end();
        }
    }
}

impl std::fmt::Debug for ModeLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeLease")
            .field("mode", &self.mode)
            .field("epoch", &self.epoch)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_begin_from_idle() {
        let coordinator = ModeCoordinator::new();
        let lease = coordinator.try_begin(Mode::Scanning).unwrap();
        assert_eq!(coordinator.mode(), Mode::Scanning);
        assert!(lease.is_current());
        assert!(lease.finish());
        assert_eq!(coordinator.mode(), Mode::Idle);
    }

    #[test]
    fn test_scanning_rejected_while_recognizing() {
        let coordinator = ModeCoordinator::new();
        let _recognizing = coordinator.try_begin(Mode::Recognizing).unwrap();

        let err = coordinator.try_begin(Mode::Scanning).unwrap_err();
        assert_eq!(
            err,
            TransitionError::Busy {
                requested: Mode::Scanning,
                active: Mode::Recognizing
            }
        );
        assert_eq!(coordinator.mode(), Mode::Recognizing);
    }

    #[test]
    fn test_foreground_preempts_monitoring() {
        let coordinator = ModeCoordinator::new();
        let monitoring = coordinator.try_begin(Mode::Monitoring).unwrap();

        let scanning = coordinator.try_begin(Mode::Scanning).unwrap();
        assert_eq!(coordinator.mode(), Mode::Scanning);
        assert!(!monitoring.is_current());
        assert!(scanning.is_current());

        // The late monitoring lease must not release the scan
        assert!(!monitoring.finish());
        assert_eq!(coordinator.mode(), Mode::Scanning);
        assert!(scanning.finish());
        assert_eq!(coordinator.mode(), Mode::Idle);
    }

    #[test]
    fn test_recognizing_rejected_while_scanning() {
        let coordinator = ModeCoordinator::new();
        let _scanning = coordinator.try_begin(Mode::Scanning).unwrap();

        let err = coordinator.try_begin(Mode::Recognizing).unwrap_err();
        assert_eq!(
            err,
            TransitionError::Busy {
                requested: Mode::Recognizing,
                active: Mode::Scanning
            }
        );
    }

    #[test]
    fn test_monitoring_rejected_while_scanning() {
        let coordinator = ModeCoordinator::new();
        let _scanning = coordinator.try_begin(Mode::Scanning).unwrap();
        assert!(coordinator.try_begin(Mode::Monitoring).is_err());
        assert_eq!(coordinator.mode(), Mode::Scanning);
    }

    #[test]
    fn test_idle_is_not_an_activity() {
        let coordinator = ModeCoordinator::new();
        assert_eq!(
            coordinator.try_begin(Mode::Idle).unwrap_err(),
            TransitionError::NotAnActivity(Mode::Idle)
        );
    }

    #[test]
    fn test_dropped_lease_returns_to_idle() {
        let coordinator = ModeCoordinator::new();
        {
            let _lease = coordinator.try_begin(Mode::Monitoring).unwrap();
            assert_eq!(coordinator.mode(), Mode::Monitoring);
        }
        assert_eq!(coordinator.mode(), Mode::Idle);
    }

    #[test]
    fn test_cancel_makes_lease_stale() {
        let coordinator = ModeCoordinator::new();
        let stale = coordinator.try_begin(Mode::Scanning).unwrap();

        assert_eq!(coordinator.cancel(), Some(Mode::Scanning));
        assert_eq!(coordinator.mode(), Mode::Idle);
        assert!(!stale.is_current());

        // A new activity starts before the stale one resolves
        let fresh = coordinator.try_begin(Mode::Recognizing).unwrap();
        assert!(!stale.finish());
        assert_eq!(coordinator.mode(), Mode::Recognizing);
        assert!(fresh.is_current());
    }

    #[test]
    fn test_cancel_ignores_monitoring() {
        let coordinator = ModeCoordinator::new();
        let lease = coordinator.try_begin(Mode::Monitoring).unwrap();
        assert_eq!(coordinator.cancel(), None);
        assert!(lease.is_current());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let coordinator = ModeCoordinator::new();
        let mut rx = coordinator.subscribe();

        let lease = coordinator.try_begin(Mode::Recognizing).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().mode, Mode::Recognizing);

        drop(lease);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().mode, Mode::Idle);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Begin(Mode),
        Finish(usize),
        Cancel,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            prop_oneof![
                Just(Mode::Idle),
                Just(Mode::Monitoring),
                Just(Mode::Scanning),
                Just(Mode::Recognizing)
            ]
            .prop_map(Op::Begin),
            (0usize..4).prop_map(Op::Finish),
            Just(Op::Cancel),
        ]
    }

    proptest! {
        #[test]
        fn prop_at_most_one_current_activity(ops in prop::collection::vec(arb_op(), 1..40)) {
            let coordinator = ModeCoordinator::new();
            let mut leases: Vec<ModeLease> = Vec::new();

            for op in ops {
                match op {
                    Op::Begin(mode) => {
                        let before = coordinator.mode();
                        match coordinator.try_begin(mode) {
                            Ok(lease) => {
                                prop_assert!(before.permits(mode));
                                leases.push(lease);
                            }
                            Err(_) => prop_assert!(!before.permits(mode) || mode == Mode::Idle),
                        }
                    }
                    Op::Finish(i) => {
                        if !leases.is_empty() {
                            let lease = leases.remove(i % leases.len());
                            lease.finish();
                        }
                    }
                    Op::Cancel => {
                        coordinator.cancel();
                    }
                }

                let current: Vec<&ModeLease> = leases.iter().filter(|l| l.is_current()).collect();
                prop_assert!(current.len() <= 1);
                match current.first() {
                    Some(lease) => prop_assert_eq!(coordinator.mode(), lease.mode()),
                    None => prop_assert_eq!(coordinator.mode(), Mode::Idle),
                }
            }
        }
    }
}

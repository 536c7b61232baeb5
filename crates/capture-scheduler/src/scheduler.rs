//! Capture Scheduler Implementation

use mode_coordinator::{Mode, ModeCoordinator, ModeLease};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for the capture scheduler
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval between monitoring ticks in milliseconds (default: 2000)
    pub interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_ms: 2000 }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// Periodic monitoring tick.
///
/// Each tick asks the coordinator for a Monitoring lease. If another
/// activity holds the camera the tick is dropped. Otherwise the tick
/// handler runs to completion before the next tick is considered, so
/// monitoring requests never overlap.
pub struct CaptureScheduler {
    config: SchedulerConfig,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            shutdown: None,
            handle: None,
        }
    }

    /// Start firing `on_tick` every interval while the coordinator is idle
    pub fn start<F, Fut>(&mut self, coordinator: ModeCoordinator, mut on_tick: F)
    where
        F: FnMut(ModeLease) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_running() {
            warn!("Capture scheduler already running");
            return;
        }

        let period = self.config.interval();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!("Starting capture scheduler every {:?}", period);
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                metrics::counter!("capture_ticks_total").increment(1);
                match coordinator.try_begin(Mode::Monitoring) {
                    Ok(lease) => on_tick(lease).await,
                    Err(e) => {
                        metrics::counter!("capture_ticks_skipped_total").increment(1);
                        debug!("Tick skipped: {}", e);
                    }
                }
            }

            info!("Capture scheduler stopped");
        });

        self.shutdown = Some(shutdown_tx);
        self.handle = Some(handle);
    }

    /// Cancel future ticks and wait for the loop to exit.
    ///
    /// A tick already in flight is allowed to finish.
    pub async fn stop(&mut self) {
        info!("Stopping capture scheduler");
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Capture scheduler task ended abnormally: {}", e);
            }
        }
    }

    /// Check if scheduler is running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }
}

impl Drop for CaptureScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn scheduler(interval_ms: u64) -> CaptureScheduler {
        CaptureScheduler::new(SchedulerConfig { interval_ms })
    }

    fn counting(ticks: Arc<AtomicUsize>) -> impl FnMut(ModeLease) -> std::future::Ready<()> + Send {
        move |lease| {
            assert_eq!(lease.mode(), Mode::Monitoring);
            ticks.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[test]
    fn test_default_interval() {
        assert_eq!(SchedulerConfig::default().interval(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_fire_while_idle() {
        let coordinator = ModeCoordinator::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let mut s = scheduler(100);
        s.start(coordinator.clone(), counting(ticks.clone()));
        assert!(s.is_running());

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(coordinator.mode(), Mode::Idle);

        s.stop().await;
        assert!(!s.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_skipped_while_scanning() {
        let coordinator = ModeCoordinator::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let scanning = coordinator.try_begin(Mode::Scanning).unwrap();

        let mut s = scheduler(100);
        s.start(coordinator.clone(), counting(ticks.clone()));

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.mode(), Mode::Scanning);

        // Skipped ticks are not replayed once the camera frees up
        drop(scanning);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        s.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_tick_blocks_overlap() {
        let coordinator = ModeCoordinator::new();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let starts = Arc::new(AtomicUsize::new(0));

        let mut s = scheduler(100);
        {
            let (active, peak, starts) = (active.clone(), peak.clone(), starts.clone());
            s.start(coordinator.clone(), move |lease| {
                let (active, peak) = (active.clone(), peak.clone());
                starts.fetch_add(1, Ordering::SeqCst);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(250)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    drop(lease);
                }
            });
        }

        tokio::time::sleep(Duration::from_millis(1_050)).await;
        s.stop().await;

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        let started = starts.load(Ordering::SeqCst);
        assert!((3..=4).contains(&started), "started {} ticks", started);
        assert_eq!(coordinator.mode(), Mode::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_future_ticks() {
        let coordinator = ModeCoordinator::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let mut s = scheduler(100);
        s.start(coordinator, counting(ticks.clone()));
        tokio::time::sleep(Duration::from_millis(150)).await;
        s.stop().await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }
}

//! Session agent

use crate::{
    cancelled_message, AgentStatus, AlarmStatus, Enrollment, FaceSummary, IdentityAction,
    IdentityError, MonitoringError, Recognition,
};
use alerting::DrowsinessAlarm;
use camera_capture::FrameSource;
use capture_scheduler::CaptureScheduler;
use detector_gateway::{DrowsinessClassifier, EmbeddingExtractor, MonitoringResult};
use face_matcher::{MatchResult, Matcher};
use face_store::{EmbeddingStore, FaceRecord};
use mode_coordinator::{Mode, ModeCoordinator, ModeLease};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// One monitoring and identity session over a single camera stream.
///
/// All access to the camera and the detectors goes through the
/// [`ModeCoordinator`]: an operation that cannot obtain a lease is rejected
/// with [`IdentityError::Busy`] and has no side effects.
pub struct Agent {
    coordinator: ModeCoordinator,
    store: Mutex<EmbeddingStore>,
    matcher: Matcher,
    /// `None` when the embedding model could not be loaded
    extractor: Option<Arc<dyn EmbeddingExtractor>>,
    classifier: Arc<dyn DrowsinessClassifier>,
    source: Arc<dyn FrameSource>,
    jpeg_quality: u8,
    monitoring: watch::Sender<Option<MonitoringResult>>,
    face_message: watch::Sender<Option<String>>,
    alarm: Mutex<DrowsinessAlarm>,
    /// Whether the latest tick sounded the alarm and nobody has acknowledged it
    alarm_active: watch::Sender<bool>,
}

impl Agent {
    /// Create an agent over a loaded store. Identity features stay disabled
    /// until an extractor is supplied with [`with_extractor`](Self::with_extractor).
    pub fn new(
        coordinator: ModeCoordinator,
        store: EmbeddingStore,
        classifier: Arc<dyn DrowsinessClassifier>,
        source: Arc<dyn FrameSource>,
    ) -> Self {
        let (monitoring, _) = watch::channel(None);
        let (face_message, _) = watch::channel(None);
        let (alarm_active, _) = watch::channel(false);
        Self {
            coordinator,
            store: Mutex::new(store),
            matcher: Matcher::default(),
            extractor: None,
            classifier,
            source,
            jpeg_quality: 85,
            monitoring,
            face_message,
            alarm: Mutex::new(DrowsinessAlarm::default()),
            alarm_active,
        }
    }

    pub fn with_extractor(mut self, extractor: Option<Arc<dyn EmbeddingExtractor>>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_alarm(mut self, alarm: DrowsinessAlarm) -> Self {
        self.alarm = Mutex::new(alarm);
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn coordinator(&self) -> &ModeCoordinator {
        &self.coordinator
    }

    pub fn identity_available(&self) -> bool {
        self.extractor.is_some()
    }

    /// Enroll the current face under `name`.
    ///
    /// Succeeds only once the updated gallery has been persisted.
    pub async fn enroll(&self, name: &str) -> Result<Enrollment, IdentityError> {
        let result = self.try_enroll(name).await;
        match &result {
            Ok(enrollment) => self.set_face_message(enrollment.message()),
            Err(e) => self.report_failure(e, IdentityAction::Enroll),
        }
        result
    }

    async fn try_enroll(&self, name: &str) -> Result<Enrollment, IdentityError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IdentityError::InvalidName);
        }
        let extractor = self.extractor()?;

        let lease = self.coordinator.try_begin(Mode::Scanning)?;
        info!(operation = %lease.id(), "Scanning face for '{}'", name);

        let frame = self.source.capture()?;
        let embedding = extractor.extract(&frame).await?;
        if !lease.is_current() {
            return Err(IdentityError::Superseded);
        }

        let record = FaceRecord::enroll_now(name, embedding)?;
        let mut store = self.store.lock().await;
        if !lease.is_current() {
            return Err(IdentityError::Superseded);
        }
        let total_faces = store.append(record)?.len();
        drop(store);

        lease.finish();
        metrics::counter!("faces_enrolled_total").increment(1);
        Ok(Enrollment {
            name: name.to_string(),
            total_faces,
        })
    }

    /// Identify the current face against the gallery
    pub async fn recognize(&self) -> Result<Recognition, IdentityError> {
        let result = self.try_recognize().await;
        match &result {
            Ok(recognition) => self.set_face_message(recognition.message()),
            Err(e) => self.report_failure(e, IdentityAction::Recognize),
        }
        result
    }

    async fn try_recognize(&self) -> Result<Recognition, IdentityError> {
        let extractor = self.extractor()?;
        let lease = self.coordinator.try_begin(Mode::Recognizing)?;

        let gallery = self.store.lock().await.gallery().clone();
        if gallery.is_empty() {
            lease.finish();
            return Ok(Recognition::EmptyGallery);
        }

        debug!(operation = %lease.id(), "Recognizing against {} faces", gallery.len());
        let frame = self.source.capture()?;
        let embedding = extractor.extract(&frame).await?;
        if !lease.is_current() {
            return Err(IdentityError::Superseded);
        }

        let recognition = match self.matcher.find(&embedding, &gallery) {
            MatchResult::Best { name, distance } => {
                info!(operation = %lease.id(), "Recognized '{}' at distance {:.4}", name, distance);
                Recognition::Match { name, distance }
            }
            MatchResult::NoMatch => {
                info!(operation = %lease.id(), "Face not recognized");
                Recognition::Unknown
            }
        };
        lease.finish();
        Ok(recognition)
    }

    /// Cancel a running enrollment or recognition.
    ///
    /// The detector call already in flight completes, but its result is discarded.
    pub fn cancel(&self) -> Option<Mode> {
        let cancelled = self.coordinator.cancel()?;
        self.set_face_message(cancelled_message(cancelled).to_string());
        Some(cancelled)
    }

    /// Classify the current frame and publish the result.
    ///
    /// Capture, encoding and classifier failures publish an explicit error
    /// result instead of leaving the previous one on display.
    pub async fn run_monitoring_tick(&self, lease: ModeLease) {
        let outcome = self.classify_current_frame().await;
        if !lease.is_current() {
            debug!(operation = %lease.id(), "Discarding stale monitoring result");
            return;
        }

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                metrics::counter!("monitoring_errors_total").increment(1);
                warn!(operation = %lease.id(), "Monitoring failed: {}", e);
                MonitoringResult::error()
            }
        };
        self.monitoring.send_replace(Some(result));
        let sounding = self.alarm.lock().await.observe(result.status);
        self.alarm_active.send_replace(sounding);
        lease.finish();
    }

    async fn classify_current_frame(&self) -> Result<MonitoringResult, MonitoringError> {
        let frame = self.source.capture()?;
        let jpeg = frame.encode_jpeg(self.jpeg_quality)?;
        Ok(self.classifier.classify(jpeg).await?)
    }

    /// Drive monitoring ticks from `scheduler`
    pub fn spawn_monitoring(self: &Arc<Self>, scheduler: &mut CaptureScheduler) {
        let agent = Arc::clone(self);
        scheduler.start(self.coordinator.clone(), move |lease| {
            let agent = Arc::clone(&agent);
            async move { agent.run_monitoring_tick(lease).await }
        });
    }

    pub async fn status(&self) -> AgentStatus {
        let enrolled_faces = self.store.lock().await.gallery().len();
        let alarm = self.alarm.lock().await.state();
        AgentStatus {
            mode: self.coordinator.mode(),
            monitoring: *self.monitoring.borrow(),
            face_message: self.face_message.borrow().clone(),
            identity_available: self.identity_available(),
            enrolled_faces,
            alarm: AlarmStatus {
                active: *self.alarm_active.borrow(),
                fire_count: alarm.fire_count,
                acknowledged: alarm.acknowledged,
            },
        }
    }

    /// Stored faces in enrollment order
    pub async fn list_faces(&self) -> Vec<FaceSummary> {
        let store = self.store.lock().await;
        store
            .gallery()
            .iter()
            .enumerate()
            .map(|(index, record)| FaceSummary::new(index, record))
            .collect()
    }

    /// Delete a stored face by its position in the gallery
    pub async fn remove_face(&self, index: usize) -> Result<FaceSummary, IdentityError> {
        let removed = self.store.lock().await.remove(index)?;
        Ok(FaceSummary::new(index, &removed))
    }

    /// Acknowledge the drowsiness alarm; false if it never fired
    pub async fn acknowledge_alarm(&self) -> bool {
        let acknowledged = self.alarm.lock().await.acknowledge();
        if acknowledged {
            self.alarm_active.send_replace(false);
        }
        acknowledged
    }

    fn extractor(&self) -> Result<Arc<dyn EmbeddingExtractor>, IdentityError> {
        self.extractor
            .clone()
            .ok_or(IdentityError::ModelUnavailable)
    }

    fn set_face_message(&self, message: String) {
        self.face_message.send_replace(Some(message));
    }

    fn report_failure(&self, error: &IdentityError, action: IdentityAction) {
        if let IdentityError::Superseded = error {
            debug!("{:?} result discarded after cancel", action);
            return;
        }
        metrics::counter!("identity_failures_total").increment(1);
        warn!("{:?} failed: {}", action, error);
        self.set_face_message(error.user_message(action));
    }
}

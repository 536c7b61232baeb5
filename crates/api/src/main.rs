//! Drowsiness Monitor - Main Entry Point

use alerting::DrowsinessAlarm;
use anyhow::Context;
use api::{init_logging, run_server, AppConfig, AppState};
use camera_capture::{FrameSource, ImageDirectorySource, SharedFrameSource};
use capture_scheduler::CaptureScheduler;
use detector_gateway::{EmbeddingExtractor, HttpDrowsinessClassifier, OnnxFaceEmbedder};
use face_matcher::Matcher;
use face_store::{EmbeddingStore, FileDocumentStore};
use metrics_exporter_prometheus::PrometheusBuilder;
use mode_coordinator::ModeCoordinator;
use monitor_agent::Agent;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// `--config <path>` from the command line
fn config_path() -> anyhow::Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args.next().context("--config requires a path")?;
            return Ok(Some(PathBuf::from(path)));
        }
    }
    Ok(None)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config_path()?;
    let config = AppConfig::load(path.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = config.server.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to start Prometheus exporter")?;
        info!("Prometheus metrics on {}", addr);
    }

    // Gallery
    let backend = FileDocumentStore::new(&config.store.data_dir);
    let mut store = EmbeddingStore::new(Arc::new(backend));
    let enrolled = store.load().len();
    info!("Gallery at {} holds {} faces", config.store.data_dir.display(), enrolled);

    // Models
    let extractor: Option<Arc<dyn EmbeddingExtractor>> = match OnnxFaceEmbedder::load(&config.detector) {
        Ok(embedder) => Some(Arc::new(embedder) as Arc<dyn EmbeddingExtractor>),
        Err(e) => {
            error!("{}; enrollment and recognition are disabled", e);
            None
        }
    };
    let classifier = HttpDrowsinessClassifier::new(&config.detector)?;

    // Camera
    let (source, camera_feed): (Arc<dyn FrameSource>, Option<SharedFrameSource>) =
        match &config.camera.frames_dir {
            Some(dir) => {
                let stills = ImageDirectorySource::open(dir, &config.camera)?;
                (Arc::new(stills) as Arc<dyn FrameSource>, None)
            }
            None => {
                let feed = SharedFrameSource::new();
                (Arc::new(feed.clone()) as Arc<dyn FrameSource>, Some(feed))
            }
        };
    if camera_feed.is_some() {
        info!("Waiting for frames on PUT /api/v1/camera/frame");
    }

    let agent = Arc::new(
        Agent::new(ModeCoordinator::new(), store, Arc::new(classifier), source)
            .with_extractor(extractor)
            .with_matcher(Matcher::from(&config.matcher))
            .with_alarm(DrowsinessAlarm::new(config.alarm.clone()))
            .with_jpeg_quality(config.camera.jpeg_quality),
    );

    let mut scheduler = CaptureScheduler::new(config.scheduler.clone());
    agent.spawn_monitoring(&mut scheduler);

    let state = Arc::new(AppState::new(agent, camera_feed, config.camera.clone()));
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
    };

    let served = run_server(config.server.addr, state, shutdown).await;
    scheduler.stop().await;
    served?;

    info!("Drowsiness monitor stopped");
    Ok(())
}

//! Drowsiness Monitor API Server
//!
//! HTTP surface of the monitor agent: the two identity actions, the status
//! display and the camera feed, plus configuration and logging setup.

use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Json, Router,
};
use camera_capture::{CameraConfig, SharedFrameSource};
use mode_coordinator::Mode;
use monitor_agent::Agent;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
mod routes;

pub use config::{AppConfig, LoggingConfig, ServerConfig, StoreConfig};

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state shared across handlers
pub struct AppState {
    pub agent: Arc<Agent>,
    /// Live feed the camera endpoint publishes into. `None` when frames are
    /// played back from a directory.
    pub camera_feed: Option<SharedFrameSource>,
    /// Capture size uploaded frames are scaled to
    pub camera: CameraConfig,
    pub version: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(agent: Arc<Agent>, camera_feed: Option<SharedFrameSource>, camera: CameraConfig) -> Self {
        Self {
            agent,
            camera_feed,
            camera,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub mode: Mode,
    pub identity_available: bool,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/status", get(routes::status::get_status))
        .route("/api/v1/alarm/ack", post(routes::status::acknowledge_alarm))
        .route(
            "/api/v1/faces",
            get(routes::faces::list_faces).post(routes::faces::enroll),
        )
        .route("/api/v1/faces/recognize", post(routes::faces::recognize))
        .route("/api/v1/faces/cancel", post(routes::faces::cancel))
        .route("/api/v1/faces/:index", delete(routes::faces::remove_face))
        .route("/api/v1/camera/frame", put(routes::camera::publish_frame))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        mode: state.agent.coordinator().mode(),
        identity_available: state.agent.identity_available(),
    })
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> Result<(), ApiError> {
    let level: Level = config
        .level
        .parse()
        .map_err(|_| ApiError::Logging(format!("Invalid log level '{}'", config.level)))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| ApiError::Logging(e.to_string()))
}

/// Serve the API until `shutdown` resolves
pub async fn run_server(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ApiError> {
    let app = create_router(state);

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use camera_capture::VideoFrame;
    use detector_gateway::{
        DetectorError, DrowsinessClassifier, DrowsinessStatus, EmbeddingExtractor, EyeState,
        MonitoringResult,
    };
    use face_store::{Embedding, EmbeddingStore, MemoryDocumentStore};
    use mode_coordinator::ModeCoordinator;
    use serde_json::Value;
    use tower::ServiceExt;

    struct FixedExtractor;

    #[async_trait]
    impl EmbeddingExtractor for FixedExtractor {
        async fn extract(&self, _frame: &VideoFrame) -> Result<Embedding, DetectorError> {
            Ok(Embedding::new(vec![0.25; 8]))
        }
    }

    struct AwakeClassifier;

    #[async_trait]
    impl DrowsinessClassifier for AwakeClassifier {
        async fn classify(&self, _jpeg: Vec<u8>) -> Result<MonitoringResult, DetectorError> {
            Ok(MonitoringResult {
                status: DrowsinessStatus::Awake,
                eye_states: [EyeState::Open; 2],
            })
        }
    }

    fn state(identity: bool) -> Arc<AppState> {
        let feed = SharedFrameSource::new();
        let mut store = EmbeddingStore::new(Arc::new(MemoryDocumentStore::new()));
        store.load();

        let extractor: Option<Arc<dyn EmbeddingExtractor>> = if identity {
            Some(Arc::new(FixedExtractor))
        } else {
            None
        };
        let agent = Agent::new(
            ModeCoordinator::new(),
            store,
            Arc::new(AwakeClassifier),
            Arc::new(feed.clone()),
        )
        .with_extractor(extractor);

        let camera = CameraConfig {
            width: 8,
            height: 8,
            ..Default::default()
        };
        Arc::new(AppState::new(Arc::new(agent), Some(feed), camera))
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, json: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    fn put_frame(bytes: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri("/api/v1/camera/frame")
            .header("content-type", "image/jpeg")
            .body(Body::from(bytes))
            .unwrap()
    }

    fn still() -> Vec<u8> {
        VideoFrame::new(vec![100; 16 * 16 * 3], 16, 16, 0, 0)
            .encode_jpeg(90)
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let state = state(true);
        let (status, body) = send(&state, get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["mode"], "Idle");
        assert_eq!(body["identity_available"], true);
    }

    #[tokio::test]
    async fn test_enroll_and_recognize_flow() {
        let state = state(true);
        let (status, _) = send(&state, put_frame(still())).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, body) = send(&state, post("/api/v1/faces", r#"{"name":"Alice"}"#)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["ok"], true);
        assert_eq!(body["message"], "Successfully registered Alice");
        assert_eq!(body["result"]["total_faces"], 1);

        let (status, body) = send(&state, get("/api/v1/faces")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "Alice");
        assert_eq!(body[0]["index"], 0);

        let (status, body) = send(&state, post("/api/v1/faces/recognize", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Welcome back, Alice!");
        assert_eq!(body["result"]["outcome"], "match");

        let (_, body) = send(&state, get("/api/v1/status")).await;
        assert_eq!(body["face_message"], "Welcome back, Alice!");
        assert_eq!(body["enrolled_faces"], 1);
        assert_eq!(body["mode"], "Idle");
    }

    #[tokio::test]
    async fn test_enroll_without_frame_reports_failure() {
        let state = state(true);
        let (status, body) = send(&state, post("/api/v1/faces", r#"{"name":"Bob"}"#)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ok"], false);
        assert_eq!(body["message"], "Failed to scan face. Please try again.");
        assert!(body.get("result").is_none());
    }

    #[tokio::test]
    async fn test_blank_name_is_bad_request() {
        let state = state(true);
        let (status, body) = send(&state, post("/api/v1/faces", r#"{"name":"  "}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please enter a name.");
    }

    #[tokio::test]
    async fn test_recognize_with_empty_gallery() {
        let state = state(true);
        let (status, body) = send(&state, post("/api/v1/faces/recognize", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["outcome"], "empty_gallery");
        assert_eq!(
            body["message"],
            "No known faces stored. Please scan a face first."
        );
    }

    #[tokio::test]
    async fn test_identity_unavailable_without_model() {
        let state = state(false);
        let (status, body) = send(&state, post("/api/v1/faces/recognize", "")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ok"], false);

        let (_, body) = send(&state, get("/api/v1/status")).await;
        assert_eq!(body["identity_available"], false);
        assert!(body["monitoring"].is_null());
    }

    #[tokio::test]
    async fn test_cancel_when_idle_conflicts() {
        let state = state(true);
        let (status, body) = send(&state, post("/api/v1/faces/cancel", "")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_remove_missing_face_is_not_found() {
        let state = state(true);
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/v1/faces/3")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_undecodable_frame_rejected() {
        let state = state(true);
        let (status, body) = send(&state, put_frame(b"not a jpeg".to_vec())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_acknowledge_without_alarm() {
        let state = state(true);
        let (status, body) = send(&state, post("/api/v1/alarm/ack", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], false);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let config = LoggingConfig {
            level: "loud".to_string(),
            json: false,
        };
        assert!(matches!(init_logging(&config), Err(ApiError::Logging(_))));
    }
}

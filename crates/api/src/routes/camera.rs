//! Camera feed endpoint
//!
//! The browser owns the webcam and pushes encoded stills here; monitoring
//! and identity operations read the most recent one.

use super::ActionResponse;
use crate::AppState;
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::debug;

pub async fn publish_frame(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> (StatusCode, Json<ActionResponse>) {
    let Some(feed) = &state.camera_feed else {
        return (
            StatusCode::CONFLICT,
            Json(ActionResponse::failure("Camera frames are played back from disk")),
        );
    };

    match feed.publish_encoded(&body, state.camera.width, state.camera.height) {
        Ok(()) => {
            debug!("Published {} byte frame", body.len());
            (StatusCode::ACCEPTED, Json(ActionResponse::done("Frame received")))
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ActionResponse::failure(e.to_string())),
        ),
    }
}

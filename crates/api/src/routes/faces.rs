//! Face identity endpoints

use super::ActionResponse;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use face_store::StorageError;
use monitor_agent::{
    cancelled_message, Enrollment, FaceSummary, IdentityAction, IdentityError, Recognition,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

type Reply<T> = (StatusCode, Json<ActionResponse<T>>);

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub name: String,
}

fn status_for(error: &IdentityError) -> StatusCode {
    match error {
        IdentityError::Busy(_) | IdentityError::Superseded => StatusCode::CONFLICT,
        IdentityError::InvalidName => StatusCode::BAD_REQUEST,
        IdentityError::NoFaceDetected => StatusCode::UNPROCESSABLE_ENTITY,
        IdentityError::ModelUnavailable | IdentityError::Camera(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        IdentityError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
        IdentityError::Extraction(_) | IdentityError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn failure<T: Serialize>(error: &IdentityError, action: IdentityAction) -> Reply<T> {
    (
        status_for(error),
        Json(ActionResponse::failure(error.user_message(action))),
    )
}

/// Scan the current face and store it under the given name
pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EnrollRequest>,
) -> Reply<Enrollment> {
    match state.agent.enroll(&request.name).await {
        Ok(enrollment) => (
            StatusCode::CREATED,
            Json(ActionResponse::success(enrollment.message(), enrollment)),
        ),
        Err(e) => failure(&e, IdentityAction::Enroll),
    }
}

/// Identify the current face
pub async fn recognize(State(state): State<Arc<AppState>>) -> Reply<Recognition> {
    match state.agent.recognize().await {
        Ok(recognition) => (
            StatusCode::OK,
            Json(ActionResponse::success(recognition.message(), recognition)),
        ),
        Err(e) => failure(&e, IdentityAction::Recognize),
    }
}

/// Cancel a running scan or recognition
pub async fn cancel(State(state): State<Arc<AppState>>) -> Reply<()> {
    match state.agent.cancel() {
        Some(mode) => (StatusCode::OK, Json(ActionResponse::done(cancelled_message(mode)))),
        None => (
            StatusCode::CONFLICT,
            Json(ActionResponse::failure("Nothing to cancel")),
        ),
    }
}

/// Stored faces
pub async fn list_faces(State(state): State<Arc<AppState>>) -> Json<Vec<FaceSummary>> {
    Json(state.agent.list_faces().await)
}

/// Delete a stored face by index
pub async fn remove_face(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Reply<FaceSummary> {
    match state.agent.remove_face(index).await {
        Ok(removed) => (
            StatusCode::OK,
            Json(ActionResponse::success(format!("Removed {}", removed.name), removed)),
        ),
        Err(IdentityError::Storage(StorageError::NotFound(_))) => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::failure(format!("No stored face at index {}", index))),
        ),
        Err(e) => (
            status_for(&e),
            Json(ActionResponse::failure("Failed to remove face. Please try again.")),
        ),
    }
}

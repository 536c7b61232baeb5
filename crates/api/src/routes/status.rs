//! Status display endpoints

use super::ActionResponse;
use crate::AppState;
use axum::{extract::State, Json};
use monitor_agent::AgentStatus;
use std::sync::Arc;

/// Drowsiness status, eye states, mode and the last face message
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<AgentStatus> {
    Json(state.agent.status().await)
}

pub async fn acknowledge_alarm(State(state): State<Arc<AppState>>) -> Json<ActionResponse> {
    if state.agent.acknowledge_alarm().await {
        Json(ActionResponse::done("Alarm acknowledged"))
    } else {
        Json(ActionResponse::failure("No alarm to acknowledge"))
    }
}

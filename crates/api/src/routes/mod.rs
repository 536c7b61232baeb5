//! API route handlers

pub mod camera;
pub mod faces;
pub mod status;

use serde::Serialize;

/// Outcome of a user action with the message to show
#[derive(Debug, Serialize)]
pub struct ActionResponse<T: Serialize = ()> {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T: Serialize> ActionResponse<T> {
    pub fn success(message: impl Into<String>, result: T) -> Self {
        Self {
            ok: true,
            message: message.into(),
            result: Some(result),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            result: None,
        }
    }
}

impl ActionResponse {
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            result: None,
        }
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types surfaced to collaborators of the session manager.

use reqwest::StatusCode;
use serde_json::Value;

/// Failure taxonomy for authenticated API calls.
///
/// Authorization failures (401) never reach callers directly: the session
/// manager either recovers through a refresh or reports `SessionExpired`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Map a non-success, non-401 response to the taxonomy.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let message = extract_error_message(status, body);
        if status == StatusCode::FORBIDDEN {
            SessionError::Forbidden(message)
        } else {
            SessionError::Server {
                status: status.as_u16(),
                message,
            }
        }
    }

    /// True when the UI should send the user back to the login view.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            SessionError::SessionExpired | SessionError::InvalidCredentials
        )
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        SessionError::Network(err.to_string())
    }
}

/// Pull a human-readable message out of an API error body.
///
/// Checks, in order: `error.message`, `detail`, `non_field_errors`, then
/// falls back to a message keyed on the status code.
pub fn extract_error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(json) = serde_json::from_slice::<Value>(body) {
        if let Some(msg) = json
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
        {
            return msg.to_string();
        }

        match json.get("detail") {
            Some(Value::String(detail)) => return detail.clone(),
            Some(Value::Null) | None => {}
            Some(other) => return other.to_string(),
        }

        if let Some(errors) = json.get("non_field_errors").and_then(Value::as_array) {
            let joined: Vec<&str> = errors.iter().filter_map(Value::as_str).collect();
            if !joined.is_empty() {
                return joined.join(", ");
            }
        }
    }

    match status {
        StatusCode::NOT_FOUND => "Resource not found".to_string(),
        StatusCode::FORBIDDEN => "You do not have permission to perform this action".to_string(),
        StatusCode::INTERNAL_SERVER_ERROR => "Server error. Please try again later".to_string(),
        _ => "An unexpected error occurred".to_string(),
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

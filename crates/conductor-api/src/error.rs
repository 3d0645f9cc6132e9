// Engine/store error translation to HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use conductor_contracts::ValidationError;
use conductor_engine::EngineError;
use serde_json::json;

/// Error response: `{error, message, details[]}` with the right status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Vec<ValidationError>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>, details: Vec<ValidationError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            details,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            details: vec![],
        }
    }

    /// Internal error; the real message is exposed only in development
    pub fn internal(message: impl Into<String>, development: bool) -> Self {
        let message = message.into();
        tracing::error!("internal error: {}", message);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: if development {
                message
            } else {
                "Internal server error".to_string()
            },
            details: vec![],
        }
    }

    /// Map an engine error onto the admission contract
    pub fn from_engine(err: EngineError, development: bool) -> Self {
        match err {
            EngineError::Validation(details) => {
                Self::bad_request("Workflow validation failed", details)
            }
            EngineError::Resolver(e) => Self::bad_request(e.to_string(), vec![]),
            EngineError::PluginNotFound(_) | EngineError::ActionNotExposed { .. } => {
                Self::bad_request(err.to_string(), vec![])
            }
            EngineError::NotFound(id) => Self::not_found(format!("not found: {}", id)),
            EngineError::Stopped => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: err.to_string(),
                details: vec![],
            },
            EngineError::Conflict(_)
            | EngineError::Store(_)
            | EngineError::Serialization(_) => Self::internal(err.to_string(), development),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.status.canonical_reason().unwrap_or("Error"),
            "message": self.message,
            "details": self.details,
        });
        (self.status, Json(body)).into_response()
    }
}

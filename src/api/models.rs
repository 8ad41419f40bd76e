use crate::config::{AppConfig, ConfigurationError};
use crate::reading::Reading;
use crate::vision::{VisionError, VisionService};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Raw credential as found in the environment; validated per request.
    pub api_key: Option<String>,
    pub vision: Arc<dyn VisionService>,
}

/// Request to read a meter photo
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(rename = "imageData")]
    pub image_data: Option<String>,
}

/// Successful analysis; `numericValue` is null when the display wasn't legible
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    #[serde(flatten)]
    pub reading: Reading,
}

impl From<Reading> for AnalyzeResponse {
    fn from(reading: Reading) -> Self {
        Self {
            success: true,
            reading,
        }
    }
}

/// Diagnostic endpoint response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticResponse {
    pub success: bool,
    pub message: String,
    /// `None` when the upstream service was not probed.
    pub has_vision: Option<bool>,
    pub key_preview: String,
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub credential_configured: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed client input.
    #[error("{0}")]
    Validation(String),
    /// Server credential missing or unusable.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The vision service answered with a non-success status.
    #[error("{message}")]
    Upstream {
        status: u16,
        message: String,
        details: Option<String>,
    },
    /// Request body over `server.max_body_bytes`.
    #[error("Request body too large")]
    PayloadTooLarge,
    #[error("Method not allowed")]
    MethodNotAllowed,
    /// Anything else; the detail is logged, never returned.
    #[error("{0}")]
    Unexpected(String),
}

impl From<VisionError> for AppError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::Status { status, message, .. } => AppError::Upstream {
                status,
                message: format!("Vision service error ({}): {}", status, message),
                details: None,
            },
            VisionError::Transport(msg) => AppError::Unexpected(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Configuration(err) => {
                error!("Configuration error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None)
            }
            AppError::Upstream {
                status,
                message,
                details,
            } => {
                let status = StatusCode::from_u16(status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                error!(status = status.as_u16(), "Upstream error: {}", message);
                (status, message, details)
            }
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large".to_string(),
                None,
            ),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed".to_string(),
                None,
            ),
            AppError::Unexpected(msg) => {
                error!("Unexpected error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Unexpected server error".to_string(),
                    None,
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: message,
                details,
            }),
        )
            .into_response()
    }
}

/// Response for a handler that panicked, used with `CatchPanicLayer`.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");

    AppError::Unexpected(format!("Handler panicked: {}", detail)).into_response()
}

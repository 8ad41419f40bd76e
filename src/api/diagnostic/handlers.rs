use crate::api::models::*;
use crate::config::ApiKey;
use crate::vision::VisionError;
use axum::{extract::State, Json};
use tracing::info;

/// Check the credential and, unless disabled, that the vision service accepts it.
pub async fn diagnostic_handler(
    State(state): State<AppState>,
) -> Result<Json<DiagnosticResponse>, AppError> {
    let key = ApiKey::parse(state.api_key.as_deref())?;

    if !state.config.diagnostic.probe_upstream {
        return Ok(Json(DiagnosticResponse {
            success: true,
            message: "API key configured (vision service not probed)".to_string(),
            has_vision: None,
            key_preview: key.preview(),
        }));
    }

    let models = state.vision.list_models(&key).await.map_err(|e| match e {
        VisionError::Status { status, body, .. } => AppError::Upstream {
            status: 500,
            message: format!("Vision service error: {}", status),
            details: Some(body),
        },
        VisionError::Transport(msg) => AppError::Upstream {
            status: 500,
            message: "Vision service unreachable".to_string(),
            details: Some(msg),
        },
    })?;

    let configured = &state.config.vision.model;
    let has_vision = models
        .iter()
        .any(|id| id.contains("vision") || id == configured);

    info!(models = models.len(), has_vision, "Vision service reachable");

    Ok(Json(DiagnosticResponse {
        success: true,
        message: "Vision service connection succeeded".to_string(),
        has_vision: Some(has_vision),
        key_preview: key.preview(),
    }))
}

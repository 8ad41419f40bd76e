pub mod analyze;
pub mod cors;
pub mod diagnostic;
pub mod gate;
pub mod models;

#[cfg(test)]
pub mod testing;

// Re-exports
pub use models::*;

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use crate::config::ApiKey;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

// Health handler (simple, keep here)
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        credential_configured: ApiKey::parse(state.api_key.as_deref()).is_ok(),
    })
}

/// Full application router: API routes, optional static files, the routing gate.
pub fn build_router(state: AppState) -> Router {
    let gate = Arc::new(state.config.gate.clone());
    let max_body_bytes = state.config.server.max_body_bytes;

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .merge(analyze::routes())
        .merge(diagnostic::routes());

    if let Some(dir) = &state.config.server.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(from_fn_with_state(gate, gate::gate_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

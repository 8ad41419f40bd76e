use crate::api::cors::{cors_middleware, method_not_allowed, preflight, CorsPolicy};
use crate::api::diagnostic::handlers::diagnostic_handler;
use crate::api::models::{panic_response, AppState};
use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::catch_panic::CatchPanicLayer;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/test-api",
            get(diagnostic_handler)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn_with_state(CorsPolicy::DIAGNOSTIC, cors_middleware))
}

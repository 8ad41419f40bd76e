use crate::api::cors::{cors_middleware, method_not_allowed, preflight, CorsPolicy};
use crate::api::models::{panic_response, AppState};
use crate::api::analyze::handlers::analyze_handler;
use axum::{middleware::from_fn_with_state, routing::post, Router};
use tower_http::catch_panic::CatchPanicLayer;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/analyze-glycemia",
            post(analyze_handler)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn_with_state(CorsPolicy::ANALYZE, cors_middleware))
}

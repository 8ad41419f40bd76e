use crate::api::models::AppError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};

/// CORS headers attached to every response of a route group
#[derive(Debug, Clone, Copy)]
pub struct CorsPolicy {
    allow_methods: &'static str,
}

impl CorsPolicy {
    pub const ANALYZE: Self = Self {
        allow_methods: "POST, OPTIONS",
    };
    pub const DIAGNOSTIC: Self = Self {
        allow_methods: "GET, OPTIONS",
    };
}

pub async fn cors_middleware(
    State(policy): State<CorsPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(policy.allow_methods),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    response
}

/// Preflight: empty body, headers come from the middleware.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

//! Navigational gate in front of every request.
//!
//! No credential is checked here: authentication happens in the browser
//! client. The gate only steers navigation towards the login page.

use crate::config::{GateConfig, GateMode};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

/// Route prefixes always reachable in `public_allowlist` mode.
const API_PREFIXES: [&str; 3] = ["/analyze-glycemia", "/test-api", "/health"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Continue,
    Redirect(String),
}

/// Decide what to do with a request for `path`.
pub fn decide(config: &GateConfig, path: &str) -> GateDecision {
    if path == config.login_path {
        return GateDecision::Continue;
    }

    let redirect = match config.mode {
        GateMode::PassThrough => false,
        GateMode::RootRedirect => path == "/",
        GateMode::PublicAllowlist => !is_public(config, path),
    };

    if redirect {
        GateDecision::Redirect(config.login_path.clone())
    } else {
        GateDecision::Continue
    }
}

fn is_public(config: &GateConfig, path: &str) -> bool {
    config.public_paths.iter().any(|p| p == path)
        || API_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
        || is_static_asset(path)
}

fn is_static_asset(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|segment| segment.contains('.'))
}

pub async fn gate_middleware(
    State(config): State<Arc<GateConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match decide(&config, request.uri().path()) {
        GateDecision::Continue => next.run(request).await,
        GateDecision::Redirect(location) => {
            debug!(path = %request.uri().path(), %location, "Redirecting to login");
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
        }
    }
}

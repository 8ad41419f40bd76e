mod api;
mod config;
mod reading;
mod vision;

use crate::api::{build_router, AppState};
use crate::config::{ApiKey, AppConfig, ConfigurationError};
use crate::vision::{OpenAiVisionClient, VisionService};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("🚀 Starting Glycemia Reader");

    // Load configuration
    let config = AppConfig::load()?;
    info!("📋 Configuration loaded");
    info!("   - Vision API: {}", config.vision.api_base);
    info!("   - Model: {}", config.vision.model);
    info!("   - Gate mode: {}", config.gate.mode);
    info!("   - Server: {}:{}", config.server.host, config.server.port);

    let api_key = config.api_key_from_env();
    match ApiKey::parse(api_key.as_deref()) {
        Ok(key) => info!("🔑 API key loaded ({})", key.preview()),
        Err(ConfigurationError::Missing) => warn!(
            "⚠️  {} is not set, analysis requests will fail",
            config.vision.api_key_env
        ),
        Err(err) => warn!("⚠️  {}", err),
    }

    let vision: Arc<dyn VisionService> =
        Arc::new(OpenAiVisionClient::new(config.vision.clone())?);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        config: Arc::new(config),
        api_key,
        vision,
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📡 Available endpoints:");
    info!("   GET  /health            - Health check");
    info!("   POST /analyze-glycemia  - Read a glucose meter photo");
    info!("   GET  /test-api          - Vision service diagnostic");
    info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutting down gracefully");

    Ok(())
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received");
}

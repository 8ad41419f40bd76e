use anyhow::{Context, Result};
use axum::http::HeaderValue;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable pointing at the TOML configuration file.
const CONFIG_PATH_ENV: &str = "GLYCEMIA_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Application configuration, loaded from TOML with built-in defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub vision: VisionConfig,
    pub gate: GateConfig,
    pub diagnostic: DiagnosticConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_bytes: 10 * 1024 * 1024,
            static_dir: Some(PathBuf::from("public")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Base URL of the OpenAI-compatible API, without trailing slash.
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 10,
            temperature: 0.1,
            timeout_secs: 30,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// Behavior of the routing gate in front of every request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Let every request through.
    PassThrough,
    /// Let public pages, API routes and static assets through; redirect the rest.
    PublicAllowlist,
    /// Redirect navigation to the site root; let everything else through.
    #[default]
    RootRedirect,
}

impl std::fmt::Display for GateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GateMode::PassThrough => "pass_through",
            GateMode::PublicAllowlist => "public_allowlist",
            GateMode::RootRedirect => "root_redirect",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub mode: GateMode,
    pub login_path: String,
    /// Pages reachable without redirect in `public_allowlist` mode.
    pub public_paths: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            mode: GateMode::default(),
            login_path: "/login.html".to_string(),
            public_paths: vec!["/login.html".to_string(), "/register.html".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiagnosticConfig {
    /// Whether `/test-api` calls the model-listing endpoint.
    pub probe_upstream: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            probe_upstream: true,
        }
    }
}

impl AppConfig {
    /// Load from `$GLYCEMIA_CONFIG` (or `config.toml`), falling back to defaults
    /// when the file does not exist. `PORT` overrides the configured port.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?;

        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port
                .parse()
                .with_context(|| format!("Invalid PORT value: {}", port))?;
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_toml(&raw).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Raw credential from the environment variable named in `[vision]`.
    pub fn api_key_from_env(&self) -> Option<String> {
        std::env::var(&self.vision.api_key_env).ok()
    }
}

/// Why the model-access credential is unusable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Server configuration missing: API key is not set")]
    Missing,
    #[error("Server configuration invalid: API key is malformed")]
    Malformed,
}

/// Model-access credential. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn parse(raw: Option<&str>) -> Result<Self, ConfigurationError> {
        let key = raw.map(str::trim).unwrap_or_default();
        if key.is_empty() {
            return Err(ConfigurationError::Missing);
        }
        if HeaderValue::from_str(&format!("Bearer {}", key)).is_err() {
            return Err(ConfigurationError::Malformed);
        }
        Ok(Self(key.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First 8 characters followed by an ellipsis.
    pub fn preview(&self) -> String {
        let head: String = self.0.chars().take(8).collect();
        format!("{}...", head)
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey({})", self.preview())
    }
}

//! Canned vision service for handler tests.

use crate::api::models::AppState;
use crate::config::{ApiKey, AppConfig};
use crate::vision::{VisionError, VisionService};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

enum Outcome {
    Reply(String),
    Status(u16, String),
    Unreachable,
    Panic,
}

pub struct FakeVision {
    outcome: Outcome,
    models: Vec<String>,
    calls: AtomicUsize,
    last_image: Mutex<Option<String>>,
}

impl FakeVision {
    fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            models: vec!["gpt-4o".to_string(), "whisper-1".to_string()],
            calls: AtomicUsize::new(0),
            last_image: Mutex::new(None),
        }
    }

    pub fn replying(reply: &str) -> Self {
        Self::new(Outcome::Reply(reply.to_string()))
    }

    pub fn failing(status: u16, message: &str) -> Self {
        Self::new(Outcome::Status(status, message.to_string()))
    }

    pub fn unreachable() -> Self {
        Self::new(Outcome::Unreachable)
    }

    /// Panics inside the handler on every call.
    pub fn panicking() -> Self {
        Self::new(Outcome::Panic)
    }

    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = models.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Outbound calls made so far, both endpoints included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_image(&self) -> Option<String> {
        self.last_image.lock().unwrap().clone()
    }

    fn result<T>(&self, ok: impl FnOnce() -> T) -> Result<T, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Outcome::Reply(_) => Ok(ok()),
            Outcome::Status(status, message) => Err(VisionError::Status {
                status: *status,
                message: message.clone(),
                body: format!(r#"{{"error":{{"message":"{}"}}}}"#, message),
            }),
            Outcome::Unreachable => Err(VisionError::Transport("connection refused".to_string())),
            Outcome::Panic => panic!("vision service blew up"),
        }
    }
}

#[async_trait]
impl VisionService for FakeVision {
    async fn submit_image_for_reading(
        &self,
        _key: &ApiKey,
        image: &str,
    ) -> Result<String, VisionError> {
        *self.last_image.lock().unwrap() = Some(image.to_string());
        self.result(|| match &self.outcome {
            Outcome::Reply(reply) => reply.clone(),
            _ => String::new(),
        })
    }

    async fn list_models(&self, _key: &ApiKey) -> Result<Vec<String>, VisionError> {
        self.result(|| self.models.clone())
    }
}

pub fn test_state(vision: Arc<FakeVision>, api_key: Option<&str>) -> AppState {
    let mut config = AppConfig::default();
    config.server.static_dir = None;
    test_state_with_config(vision, api_key, config)
}

pub fn test_state_with_config(
    vision: Arc<FakeVision>,
    api_key: Option<&str>,
    config: AppConfig,
) -> AppState {
    AppState {
        config: Arc::new(config),
        api_key: api_key.map(str::to_string),
        vision: vision as Arc<dyn VisionService>,
    }
}

use super::{READING_INSTRUCTION, VisionError, VisionService};
use crate::config::{ApiKey, VisionConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// Client for OpenAI-compatible chat completion and model listing
pub struct OpenAiVisionClient {
    client: Client,
    config: VisionConfig,
}

impl OpenAiVisionClient {
    pub fn new(config: VisionConfig) -> Result<Self, VisionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VisionError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn build_request<'a>(&'a self, image: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: READING_INSTRUCTION,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_data_url(image),
                        },
                    },
                ],
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Turn a non-success response into `VisionError::Status`.
    async fn status_error(response: reqwest::Response) -> VisionError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body)
            .unwrap_or_else(|| format!("HTTP status {}", status));

        warn!(status, message = %message, "Vision service returned an error");

        VisionError::Status {
            status,
            message,
            body,
        }
    }
}

#[async_trait]
impl VisionService for OpenAiVisionClient {
    async fn submit_image_for_reading(
        &self,
        key: &ApiKey,
        image: &str,
    ) -> Result<String, VisionError> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(key.expose())
            .json(&self.build_request(image))
            .send()
            .await
            .map_err(|e| VisionError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| VisionError::Transport(format!("Invalid response body: {}", e)))?;

        let reply = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default()
            .trim()
            .to_string();

        info!(
            model = %self.config.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Vision model replied"
        );

        Ok(reply)
    }

    async fn list_models(&self, key: &ApiKey) -> Result<Vec<String>, VisionError> {
        let response = self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(key.expose())
            .send()
            .await
            .map_err(|e| VisionError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let models: ModelList = response
            .json()
            .await
            .map_err(|e| VisionError::Transport(format!("Invalid response body: {}", e)))?;

        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}

/// Payloads already carrying a `data:` URL are sent as-is.
fn image_data_url(image: &str) -> String {
    if image.starts_with("data:") {
        image.to_string()
    } else {
        format!("data:image/jpeg;base64,{}", image)
    }
}

/// Best-effort human-readable message from an error body.
fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let message = json
            .pointer("/error/message")
            .or_else(|| json.get("message"))
            .or_else(|| json.get("error").filter(|e| e.is_string()))
            .and_then(|m| m.as_str());
        if let Some(message) = message {
            return Some(message.to_string());
        }
    }

    Some(trimmed.to_string())
}

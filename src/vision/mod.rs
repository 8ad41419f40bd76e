//! Access to the external vision-capable language model.
//!
//! Handlers only see the [`VisionService`] trait, so reading normalization can
//! be exercised with canned replies and no network.

pub mod openai;

pub use openai::OpenAiVisionClient;

use crate::config::ApiKey;
use async_trait::async_trait;
use thiserror::Error;

/// Instruction sent alongside every photo. The sentinel it names must stay in
/// the reading module's "not legible" list.
pub const READING_INSTRUCTION: &str = "ANALYSE CETTE PHOTO D'UN LECTEUR DE GLYCÉMIE et retourne UNIQUEMENT la valeur numérique en mg/dL.
RÈGLES : Retourne UNIQUEMENT le nombre (ex: \"112\") ou \"Non lisible\" si impossible";

/// Failure talking to the vision service
#[derive(Debug, Error)]
pub enum VisionError {
    /// The service answered with a non-success status.
    #[error("Vision service returned {status}: {message}")]
    Status {
        status: u16,
        message: String,
        body: String,
    },
    /// The request never got a usable answer (connect, timeout, decode).
    #[error("Vision service request failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait VisionService: Send + Sync {
    /// Send a base64 JPEG (or a full data URL) and return the model's text reply.
    async fn submit_image_for_reading(
        &self,
        key: &ApiKey,
        image: &str,
    ) -> Result<String, VisionError>;

    /// Model identifiers the credential can access.
    async fn list_models(&self, key: &ApiKey) -> Result<Vec<String>, VisionError>;
}

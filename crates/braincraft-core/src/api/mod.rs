//! Backend contract and wire types.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::diagram::DiagramData;
use crate::error::ApiError;

pub use client::ApiClient;

/// Status string the health endpoint must report to count as up
pub const HEALTHY_STATUS: &str = "healthy";

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub diagram: Option<DiagramData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthReply {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeechRequest {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechReply {
    pub audio_base64: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionRequest {
    pub audio_base64: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionReply {
    pub text: String,
}

/// Everything the front end needs from the backend.
///
/// `check_health` never fails: any problem reads as "not healthy".
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send_message(&self, text: &str) -> Result<ChatReply, ApiError>;

    async fn check_health(&self) -> bool;

    /// Returns base64-encoded audio
    async fn synthesize_speech(&self, text: &str) -> Result<String, ApiError>;

    /// Takes base64-encoded audio, returns the transcript
    async fn transcribe_audio(&self, audio_base64: &str) -> Result<String, ApiError>;
}

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::{
    ChatBackend, ChatReply, ChatRequest, HealthReply, SpeechReply, SpeechRequest,
    TranscriptionReply, TranscriptionRequest, HEALTHY_STATUS,
};
use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::error::ApiError;
use crate::logger::Logger;

/// HTTP client for the BrainCraft backend
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    logger: Logger,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, logger: Logger) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            logger,
        })
    }

    pub fn with_defaults(base_url: &str, logger: Logger) -> Result<Self, ApiError> {
        Self::new(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS), logger)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        self.logger.debug(&format!("POST {}", url));

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        self.decode(&url, response).await
    }

    async fn get<Resp: DeserializeOwned>(&self, path: &str) -> Result<Resp, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        self.logger.debug(&format!("GET {}", url));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        self.decode(&url, response).await
    }

    async fn decode<Resp: DeserializeOwned>(&self, url: &str, response: Response) -> Result<Resp, ApiError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = server_message(status, &body);
            self.logger.error(&format!("{} failed with status {}: {}", url, status, body));
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<Resp>().await.map_err(|e| {
            if e.is_decode() {
                self.logger.error(&format!("{} returned an unexpected body: {}", url, e));
                ApiError::InvalidResponse(e.to_string())
            } else {
                self.transport_error(url, e)
            }
        })
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> ApiError {
        let message = if e.is_timeout() {
            format!("{} timed out after {}s", url, self.timeout.as_secs())
        } else if e.is_connect() {
            format!("could not connect to {}", url)
        } else {
            format!("{}: {}", url, e)
        };
        self.logger.error(&format!("No response: {}", message));
        ApiError::Network(message)
    }
}

/// Pick the server-supplied message out of an error body.
///
/// FastAPI puts it under `detail` (a string, or a list of validation errors
/// with `msg` fields); other services use `message` or `error`.
fn server_message(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "message", "error"] {
            match json.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(Value::Array(items)) => {
                    let messages: Vec<&str> = items
                        .iter()
                        .filter_map(|item| item.get("msg").and_then(Value::as_str))
                        .collect();
                    if !messages.is_empty() {
                        return messages.join("; ");
                    }
                }
                _ => {}
            }
        }
    }

    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    status.canonical_reason().unwrap_or("").to_string()
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn send_message(&self, text: &str) -> Result<ChatReply, ApiError> {
        let request = ChatRequest {
            message: text.to_string(),
        };
        let reply: ChatReply = self.post("/chat", &request).await?;
        self.logger.info(&format!(
            "Chat reply received ({} chars, diagram: {})",
            reply.response.len(),
            reply.diagram.is_some()
        ));
        Ok(reply)
    }

    async fn check_health(&self) -> bool {
        match self.get::<HealthReply>("/health").await {
            Ok(reply) => {
                let healthy = reply.status == HEALTHY_STATUS;
                self.logger.debug(&format!("Health status '{}' -> {}", reply.status, healthy));
                healthy
            }
            Err(e) => {
                self.logger.debug(&format!("Health check failed: {}", e));
                false
            }
        }
    }

    async fn synthesize_speech(&self, text: &str) -> Result<String, ApiError> {
        let request = SpeechRequest {
            text: text.to_string(),
        };
        let reply: SpeechReply = self.post("/synthesize", &request).await?;
        Ok(reply.audio_base64)
    }

    async fn transcribe_audio(&self, audio_base64: &str) -> Result<String, ApiError> {
        let request = TranscriptionRequest {
            audio_base64: audio_base64.to_string(),
        };
        let reply: TranscriptionReply = self.post("/transcribe", &request).await?;
        Ok(reply.text)
    }
}

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GenerationError;

/// Request body for the generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParameters {
    pub prompt: String,
    pub max_new_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerationReply {
    generated_text: String,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    device: Option<String>,
}

/// Generated text plus whatever the server said about itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Generation {
    pub text: String,
    pub model_id: Option<String>,
    pub device: Option<String>,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServerInfo {
    message: String,
}

/// Anything that can turn a prompt into generated text.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, params: GenerationParameters) -> Result<Generation, GenerationError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid generation endpoint: {}", endpoint))?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Ask the server root for its status line.
    pub async fn health(&self) -> Result<String> {
        let url = self.endpoint.join("/")?;

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Health check failed with status: {}", response.status()));
        }

        let info: ServerInfo = response.json().await?;
        Ok(info.message)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, params: GenerationParameters) -> Result<Generation, GenerationError> {
        debug!(
            endpoint = %self.endpoint,
            max_new_tokens = params.max_new_tokens,
            temperature = params.temperature,
            "sending generation request"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Body is left unread so a stalled body cannot hold the request
            debug!(status = status.as_u16(), "generation request rejected");
            return Err(GenerationError::HttpStatus {
                code: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let reply: GenerationReply = serde_json::from_slice(&body)?;

        info!(
            model_id = reply.model_id.as_deref().unwrap_or("unknown"),
            device = reply.device.as_deref().unwrap_or("unknown"),
            chars = reply.generated_text.chars().count(),
            "generation reply received"
        );

        Ok(Generation {
            text: reply.generated_text,
            model_id: reply.model_id,
            device: reply.device,
        })
    }
}

//! Outbound requests to the local retrieval backend and the cloud prompt
//! endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::config::GatewaySettings;
use crate::errors::TransportError;
use crate::models::{Confidence, Mode};

/// Body returned by the local retrieval backend. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "LocalPayloadWire")]
pub struct LocalPayload {
    pub answer: Option<String>,
    pub retrieved_text: Option<String>,
    pub confidence: Option<Confidence>,
    #[serde(rename = "similarityScore")]
    pub similarity_score: Option<f64>,
    pub error: Option<String>,
}

// The backend spells the score `similarity_score`; either spelling may be
// present, and `similarityScore` wins when both are.
#[derive(Deserialize)]
struct LocalPayloadWire {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    retrieved_text: Option<String>,
    #[serde(default, deserialize_with = "Confidence::deserialize_lenient")]
    confidence: Option<Confidence>,
    #[serde(default, rename = "similarityScore")]
    similarity_score_camel: Option<f64>,
    #[serde(default)]
    similarity_score: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

impl From<LocalPayloadWire> for LocalPayload {
    fn from(wire: LocalPayloadWire) -> Self {
        Self {
            answer: wire.answer,
            retrieved_text: wire.retrieved_text,
            confidence: wire.confidence,
            similarity_score: wire.similarity_score_camel.or(wire.similarity_score),
            error: wire.error,
        }
    }
}

/// Body returned by the cloud prompt endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudPayload {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Local(LocalPayload),
    Cloud(CloudPayload),
}

pub type RawResult = std::result::Result<RawPayload, TransportError>;

/// Report from the local backend's `/health` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendHealth {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub notes_loaded: bool,
    #[serde(default)]
    pub notes_count: u64,
}

impl BackendHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }
}

/// Outbound side of the conversation: one attempt per call, no retries.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn request(&self, mode: Mode, text: &str) -> RawResult;

    async fn health(&self) -> std::result::Result<BackendHealth, TransportError>;
}

#[derive(Serialize)]
struct AskBody<'a> {
    question: &'a str,
}

/// reqwest-backed gateway talking to the two HTTP backends. The client's
/// request timeout bounds every call, so a hung backend surfaces as a
/// [`TransportError::Network`].
pub struct HttpGateway {
    client: Client,
    settings: GatewaySettings,
}

impl HttpGateway {
    pub fn new(settings: GatewaySettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent("RagChat-Core/0.1")
            .build()
            .context("failed to construct HTTP client")?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    async fn ask_local(&self, text: &str) -> RawResult {
        let url = self.settings.local_ask_url();
        debug!("local request to {url}");
        let response = self
            .client
            .post(url)
            .json(&AskBody { question: text })
            .send()
            .await?;
        let payload: LocalPayload = decode(response).await?;
        Ok(RawPayload::Local(payload))
    }

    async fn ask_cloud(&self, text: &str) -> RawResult {
        let url = self.settings.cloud_chat_url();
        debug!("cloud request to {url}");
        let response = self
            .client
            .get(url)
            .query(&[("prompt", text)])
            .send()
            .await?;
        let payload: CloudPayload = decode(response).await?;
        Ok(RawPayload::Cloud(payload))
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn request(&self, mode: Mode, text: &str) -> RawResult {
        let result = match mode {
            Mode::Local => self.ask_local(text).await,
            Mode::Cloud => self.ask_cloud(text).await,
        };
        if let Err(err) = &result {
            warn!("{mode} backend request failed [{}]: {err}", err.code());
        }
        result
    }

    async fn health(&self) -> std::result::Result<BackendHealth, TransportError> {
        let response = self.client.get(self.settings.local_health_url()).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> std::result::Result<T, TransportError> {
    let response = response.error_for_status()?;
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|err| TransportError::Malformed {
        message: format!("Unexpected response body: {err}"),
    })
}

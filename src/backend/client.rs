//! HTTP client seam
//!
//! Sessions talk to the camera and backends through [`ApiClient`] so the
//! lifecycle logic can run against a real `reqwest` client or a scripted fake.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Transport-level errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Server rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Server refused connection: {0}")]
    Refused(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection closed by server")]
    Closed,
}

impl TransportError {
    /// Whether the server answered and refused, as opposed to a network failure
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TransportError::Rejected { .. } | TransportError::Refused(_)
        )
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> TransportResult<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| TransportError::InvalidResponse(format!("{}: {}", e, self.body)))
    }
}

/// Minimal HTTP surface the client core needs
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Lightweight existence check, returns the status code
    async fn head(&self, url: &str) -> TransportResult<u16>;

    /// GET and buffer the body
    async fn get(&self, url: &str) -> TransportResult<ApiResponse>;

    /// POST a JSON body and buffer the response
    async fn post_json(&self, url: &str, body: &Value) -> TransportResult<ApiResponse>;
}

/// `reqwest`-backed client
#[derive(Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
    probe_timeout: Duration,
}

impl HttpApiClient {
    /// Create a client with a request timeout and a shorter probe timeout
    pub fn new(request_timeout: Duration, probe_timeout: Duration) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            probe_timeout,
        })
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn head(&self, url: &str) -> TransportResult<u16> {
        let response = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    async fn get(&self, url: &str) -> TransportResult<ApiResponse> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }

    async fn post_json(&self, url: &str, body: &Value) -> TransportResult<ApiResponse> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }
}

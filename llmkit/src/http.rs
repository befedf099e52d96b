//! Outbound HTTP seam. Providers only ever POST JSON, so that is all the trait offers.

use crate::providers::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// A completed HTTP exchange. `body` is `None` when the response was not JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Option<Value>,
}

impl HttpReply {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues a JSON POST. Transport-level failures come back as
/// [`ProviderError::Transport`]; any HTTP status is an `Ok` reply.
#[async_trait]
pub trait HttpPoster: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<HttpReply, ProviderError>;
}

/// [`HttpPoster`] backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestPoster {
    client: Client,
}

impl ReqwestPoster {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Client whose every request is abandoned after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Default for ReqwestPoster {
    fn default() -> Self {
        Self::new()
    }
}

// Gemini puts the API key in the query string; never let the URL reach an error message.
fn transport_error(e: reqwest::Error) -> ProviderError {
    ProviderError::Transport(e.without_url().to_string())
}

#[async_trait]
impl HttpPoster for ReqwestPoster {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<HttpReply, ProviderError> {
        let mut req = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        for (k, v) in headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let resp = req.json(body).send().await.map_err(transport_error)?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await.map_err(transport_error)?;
        let body = serde_json::from_slice(&bytes).ok();

        Ok(HttpReply { status, body })
    }
}

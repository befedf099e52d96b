use super::{Provider, ProviderError, ProviderKind, post_once};
use crate::config::ProviderConfig;
use crate::http::HttpPoster;
use crate::logger::Logger;
use crate::types::{ChatRequest, Message, ProviderResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The Messages API rejects requests without `max_tokens`.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct AnthropicProvider {
    config: ProviderConfig,
    http: Arc<dyn HttpPoster>,
    logger: Arc<dyn Logger>,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig, http: Arc<dyn HttpPoster>, logger: Arc<dyn Logger>) -> Self {
        Self {
            config,
            http,
            logger,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("x-api-key".to_string(), self.config.api_key.clone()),
            ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
        ]
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct MessagesResponse {
    #[serde(default, deserialize_with = "super::lenient")]
    content: Vec<AnthropicContentResp>,
    #[serde(default, deserialize_with = "super::lenient")]
    model: Option<String>,
    #[serde(default, deserialize_with = "super::lenient")]
    usage: Option<Value>,
}

#[derive(Deserialize, Default)]
struct AnthropicContentResp {
    #[serde(default, deserialize_with = "super::lenient")]
    text: Option<String>,
}

/// Map a canonical request onto a Messages API body. Penalties, logit bias,
/// user and JSON mode are not supported by Claude and are dropped.
pub fn build_payload(request: &ChatRequest) -> Result<Value, ProviderError> {
    let body = MessagesRequest {
        model: request.model.clone(),
        messages: request.messages.clone(),
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: request.temperature,
        top_p: request.top_p,
        stop_sequences: request.stop.clone().filter(|s| !s.is_empty()),
    };
    Ok(serde_json::to_value(body)?)
}

/// Text of the first content block; anything else reads as empty.
pub fn parse_response(data: Value, full: bool) -> ProviderResponse {
    let resp = MessagesResponse::deserialize(&data).unwrap_or_default();
    let content = resp
        .content
        .into_iter()
        .next()
        .and_then(|block| block.text)
        .unwrap_or_default();

    ProviderResponse::new(
        content,
        resp.model,
        Some(resp.usage.unwrap_or_else(|| json!({}))),
        full.then_some(data),
    )
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    async fn generate_response(
        &self,
        request: &ChatRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        request.validate()?;
        let body = build_payload(request)?;
        let url = self.messages_url();
        let headers = self.headers();

        let data = self
            .config
            .retry
            .execute(self.kind(), self.logger.as_ref(), || {
                post_once(self.http.as_ref(), self.kind(), &url, &headers, &body)
            })
            .await?;

        Ok(parse_response(data, request.full_response))
    }
}

//! OpenAI-compatible chat completions (`POST {base_url}/chat/completions`).

use super::{Provider, ProviderError, ProviderKind, post_once};
use crate::config::ProviderConfig;
use crate::http::HttpPoster;
use crate::logger::Logger;
use crate::types::{ChatRequest, Message, ProviderResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Provider that speaks the OpenAI chat completions protocol.
pub struct OpenAiProvider {
    config: ProviderConfig,
    http: Arc<dyn HttpPoster>,
    logger: Arc<dyn Logger>,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig, http: Arc<dyn HttpPoster>, logger: Arc<dyn Logger>) -> Self {
        Self {
            config,
            http,
            logger,
        }
    }

    fn chat_completions_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }
}

// ---- Request/response types (OpenAI wire format) ----
#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logit_bias: Option<HashMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    r#type: String,
}

#[derive(Deserialize, Default)]
struct ChatResponse {
    #[serde(default, deserialize_with = "super::lenient")]
    choices: Vec<ChatChoice>,
    #[serde(default, deserialize_with = "super::lenient")]
    model: Option<String>,
    #[serde(default, deserialize_with = "super::lenient")]
    usage: Option<Value>,
}

#[derive(Deserialize, Default)]
struct ChatChoice {
    #[serde(default, deserialize_with = "super::lenient")]
    message: Option<ChatMessageResp>,
}

#[derive(Deserialize, Default)]
struct ChatMessageResp {
    #[serde(default, deserialize_with = "super::lenient")]
    content: Option<String>,
}

/// Map a canonical request onto the chat completions body. Every sampling
/// parameter is passed through; unset ones are left out.
pub fn build_payload(request: &ChatRequest) -> Result<Value, ProviderError> {
    let body = ChatCompletionRequest {
        model: request.model.clone(),
        messages: request.messages.clone(),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        stop: request.stop.clone(),
        top_p: request.top_p,
        frequency_penalty: request.frequency_penalty,
        presence_penalty: request.presence_penalty,
        logit_bias: request.logit_bias.clone(),
        user: request.user.clone(),
        response_format: request.json_mode.then(|| ResponseFormat {
            r#type: "json_object".into(),
        }),
    };
    Ok(serde_json::to_value(body)?)
}

/// Minimal responses carry only the text; `full` adds model, usage and the raw body.
pub fn parse_response(data: Value, full: bool) -> ProviderResponse {
    let resp = ChatResponse::deserialize(&data).unwrap_or_default();
    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_default();

    if !full {
        return ProviderResponse::text(content);
    }
    ProviderResponse::new(content, resp.model, resp.usage, Some(data))
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn generate_response(
        &self,
        request: &ChatRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        request.validate()?;
        let body = build_payload(request)?;
        let url = self.chat_completions_url();
        let headers = vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.config.api_key),
        )];

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

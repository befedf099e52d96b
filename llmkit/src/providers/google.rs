use super::{Provider, ProviderError, ProviderKind, post_once};
use crate::config::ProviderConfig;
use crate::http::HttpPoster;
use crate::logger::Logger;
use crate::types::{ChatRequest, ProviderResponse, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Generative AI (Gemini API key) provider.
pub struct GoogleProvider {
    config: ProviderConfig,
    http: Arc<dyn HttpPoster>,
    logger: Arc<dyn Logger>,
}

impl GoogleProvider {
    pub fn new(config: ProviderConfig, http: Arc<dyn HttpPoster>, logger: Arc<dyn Logger>) -> Self {
        Self {
            config,
            http,
            logger,
        }
    }

    /// `{base}/models/{model}:generateContent?key={api_key}`, key form-encoded.
    fn generate_content_url(&self, model: &str) -> Result<String, ProviderError> {
        let base = self.config.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/models/{}:generateContent", base, model))
            .map_err(|e| ProviderError::Config(format!("invalid Gemini base URL: {}", e)))?;
        url.query_pairs_mut().append_pair("key", &self.config.api_key);
        Ok(url.into())
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.max_output_tokens.is_none()
            && self.top_p.is_none()
            && self.stop_sequences.is_none()
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default, deserialize_with = "super::lenient")]
    candidates: Vec<Candidate>,
    #[serde(default, deserialize_with = "super::lenient")]
    model: Option<String>,
    #[serde(default, deserialize_with = "super::lenient")]
    model_version: Option<String>,
    #[serde(default, deserialize_with = "super::lenient")]
    usage_metadata: Option<Value>,
}

#[derive(Deserialize, Default)]
struct Candidate {
    #[serde(default, deserialize_with = "super::lenient")]
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default, deserialize_with = "super::lenient")]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Default)]
struct ResponsePart {
    #[serde(default, deserialize_with = "super::lenient")]
    text: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Gemini calls the assistant `model`; every other role is sent unchanged.
fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        other => other.as_str(),
    }
}

/// Map a canonical request onto a `generateContent` body. Penalties, logit
/// bias, user and JSON mode have no Gemini counterpart and are dropped.
pub fn build_payload(request: &ChatRequest) -> Result<Value, ProviderError> {
    let contents = request
        .messages
        .iter()
        .map(|m| Content {
            role: gemini_role(m.role).to_string(),
            parts: vec![Part {
                text: m.content.clone(),
            }],
        })
        .collect();

    let gen_config = GenerationConfig {
        temperature: request.temperature,
        max_output_tokens: request.max_tokens,
        top_p: request.top_p,
        stop_sequences: request.stop.clone(),
    };

    let body = GenerateContentRequest {
        contents,
        generation_config: (!gen_config.is_empty()).then_some(gen_config),
    };
    Ok(serde_json::to_value(body)?)
}

/// Joins every text part of the first candidate. No candidates means empty text.
pub fn parse_response(data: Value, full: bool) -> ProviderResponse {
    let resp = GenerateContentResponse::deserialize(&data).unwrap_or_default();

    let mut text_buf = String::new();
    if let Some(content) = resp.candidates.into_iter().next().and_then(|c| c.content) {
        for part in content.parts {
            if let Some(text) = part.text {
                text_buf.push_str(&text);
            }
        }
    }

    ProviderResponse::new(
        text_buf,
        resp.model.or(resp.model_version),
        Some(resp.usage_metadata.unwrap_or_else(|| json!({}))),
        full.then_some(data),
    )
}

#[async_trait]
impl Provider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn generate_response(
        &self,
        request: &ChatRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        request.validate()?;
        let url = self.generate_content_url(&request.model)?;
        let body = build_payload(request)?;

        let data = self
            .config
            .retry
            .execute(self.kind(), self.logger.as_ref(), || {
                post_once(self.http.as_ref(), self.kind(), &url, &[], &body)
            })
            .await?;

        Ok(parse_response(data, request.full_response))
    }
}

use crate::providers::ProviderError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Chat messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

// ---------------------------------------------------------------------------
// Canonical request
// ---------------------------------------------------------------------------

/// Vendor-agnostic chat request. Each provider translates it into its own wire
/// format and drops the parameters it does not support.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    /// Model ID as sent to the provider API (e.g. "gpt-4o").
    pub model: String,
    /// Conversation in order.
    pub messages: Vec<Message>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Stop sequences.
    pub stop: Option<Vec<String>>,
    pub top_p: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub logit_bias: Option<HashMap<String, f64>>,
    /// End-user identifier.
    pub user: Option<String>,
    /// Ask the model for a JSON object. Only the OpenAI-style API honors this.
    pub json_mode: bool,
    /// Keep the raw vendor payload on the response.
    pub full_response: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_frequency_penalty(mut self, penalty: f64) -> Self {
        self.frequency_penalty = Some(penalty);
        self
    }

    pub fn with_presence_penalty(mut self, penalty: f64) -> Self {
        self.presence_penalty = Some(penalty);
        self
    }

    pub fn with_logit_bias(mut self, bias: HashMap<String, f64>) -> Self {
        self.logit_bias = Some(bias);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    pub fn with_full_response(mut self, full_response: bool) -> Self {
        self.full_response = full_response;
        self
    }

    /// Reject requests no vendor could answer. Runs before the first attempt.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.model.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("model name is required".into()));
        }
        if self.messages.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "at least one message is required".into(),
            ));
        }
        // serde_json writes NaN and infinities as null.
        let sampling = [
            ("temperature", self.temperature),
            ("top_p", self.top_p),
            ("frequency_penalty", self.frequency_penalty),
            ("presence_penalty", self.presence_penalty),
        ];
        for (name, value) in sampling {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(ProviderError::InvalidRequest(format!(
                    "{} must be a finite number",
                    name
                )));
            }
        }
        if let Some(bias) = &self.logit_bias {
            if let Some((token, _)) = bias.iter().find(|(_, v)| !v.is_finite()) {
                return Err(ProviderError::InvalidRequest(format!(
                    "logit_bias for token {} must be a finite number",
                    token
                )));
            }
        }
        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(ProviderError::InvalidRequest(format!(
                    "top_p must be within [0, 1], got {}",
                    top_p
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(ProviderError::InvalidRequest(
                "max_tokens must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Result of a single successful generation call.
///
/// Serializes as `{content, model, usage}`; the raw vendor payload is kept for
/// inspection but never serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderResponse {
    content: String,
    model: Option<String>,
    usage: Option<serde_json::Value>,
    #[serde(skip)]
    raw_response: Option<serde_json::Value>,
}

impl ProviderResponse {
    pub fn new(
        content: impl Into<String>,
        model: Option<String>,
        usage: Option<serde_json::Value>,
        raw_response: Option<serde_json::Value>,
    ) -> Self {
        Self {
            content: content.into(),
            model,
            usage,
            raw_response,
        }
    }

    /// Response carrying only generated text.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(content, None, None, None)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Token usage in the vendor's own shape.
    pub fn usage(&self) -> Option<&serde_json::Value> {
        self.usage.as_ref()
    }

    pub fn raw_response(&self) -> Option<&serde_json::Value> {
        self.raw_response.as_ref()
    }

    pub fn into_content(self) -> String {
        self.content
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req() -> ChatRequest {
        ChatRequest::new("gpt-4o", vec![Message::user("hi")])
    }

    #[test]
    fn validate_accepts_minimal_request() {
        assert!(req().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_model_and_messages() {
        let err = ChatRequest::new(" ", vec![Message::user("hi")]).validate().unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));

        let err = ChatRequest::new("gpt-4o", vec![]).validate().unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[test]
    fn validate_rejects_out_of_range_top_p_and_zero_max_tokens() {
        assert!(req().with_top_p(1.5).validate().is_err());
        assert!(req().with_top_p(-0.1).validate().is_err());
        assert!(req().with_top_p(1.0).validate().is_ok());
        assert!(req().with_max_tokens(0).validate().is_err());
    }

    #[test]
    fn validate_rejects_non_finite_sampling_values() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(req().with_temperature(bad).validate().is_err());
            assert!(req().with_top_p(bad).validate().is_err());
            assert!(req().with_frequency_penalty(bad).validate().is_err());
            assert!(req().with_presence_penalty(bad).validate().is_err());
        }

        let err = req()
            .with_temperature(f64::NAN)
            .with_frequency_penalty(f64::INFINITY)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(ref m) if m.contains("temperature")));

        let bias = HashMap::from([("50256".to_string(), -100.0), ("42".to_string(), f64::NAN)]);
        let err = req().with_logit_bias(bias).validate().unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(ref m) if m.contains("42")));

        let bias = HashMap::from([("50256".to_string(), -100.0)]);
        assert!(req().with_temperature(0.0).with_logit_bias(bias).validate().is_ok());
    }

    #[test]
    fn role_serializes_lowercase() {
        let msg = Message::assistant("ok");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "assistant", "content": "ok"})
        );
    }

    #[test]
    fn response_serialization_skips_raw_payload() {
        let resp = ProviderResponse::new(
            "hello",
            Some("gpt-4o".into()),
            Some(json!({"total_tokens": 3})),
            Some(json!({"id": "chatcmpl-1"})),
        );
        let value: serde_json::Value = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"content": "hello", "model": "gpt-4o", "usage": {"total_tokens": 3}})
        );
        assert_eq!(resp.raw_response(), Some(&json!({"id": "chatcmpl-1"})));
    }

    #[test]
    fn text_response_has_no_metadata() {
        let resp = ProviderResponse::text("");
        assert_eq!(resp.content(), "");
        assert!(resp.model().is_none());
        assert!(resp.usage().is_none());
        assert!(resp.raw_response().is_none());
    }
}

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod retry;

use crate::http::HttpPoster;
use crate::types::{ChatRequest, ProviderResponse};
use async_trait::async_trait;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Errors from provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The request never got an HTTP response (timeout, DNS, refused connection).
    #[error("Network error: {0}")]
    Transport(String),

    /// The vendor answered with a non-success status. Displays the vendor's own message.
    #[error("{message}")]
    Rejected {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// HTTP status of a vendor rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ProviderError::Transport(_))
    }
}

/// The vendor APIs this crate speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// OpenAI chat completions, or any server speaking the same protocol.
    OpenAi,
    Gemini,
    Claude,
}

impl ProviderKind {
    /// Resolve a configured provider name. Case-sensitive; anything that is not
    /// `gemini` or `claude` selects the OpenAI-style client.
    pub fn from_name(name: &str) -> Self {
        match name {
            "gemini" => ProviderKind::Gemini,
            "claude" => ProviderKind::Claude,
            _ => ProviderKind::OpenAi,
        }
    }

    /// Configuration key of this provider.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Claude => "claude",
        }
    }

    /// Human-readable vendor label used in log messages.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Claude => "Claude",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => openai::DEFAULT_BASE_URL,
            ProviderKind::Gemini => google::DEFAULT_BASE_URL,
            ProviderKind::Claude => anthropic::DEFAULT_BASE_URL,
        }
    }

    fn fallback_error(&self) -> String {
        format!("{} API request failed", self.label())
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trait for LLM provider implementations.
///
/// Each vendor client implements this trait; callers obtain one through
/// [`crate::client::ProviderBuilder`] and stay provider-agnostic afterwards.
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Generate a single, complete response. Retries according to the client's
    /// configured policy and returns the last failure once attempts run out.
    async fn generate_response(
        &self,
        request: &ChatRequest,
    ) -> Result<ProviderResponse, ProviderError>;
}

/// Pull `error.message` out of a vendor error envelope.
pub fn vendor_error_message(body: Option<&Value>) -> Option<String> {
    body?
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

/// Response field deserializer: a value of an unexpected shape reads as the
/// default, so one odd field never blanks its siblings.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// One POST attempt: transport errors pass through, non-2xx becomes
/// [`ProviderError::Rejected`], and a success without a JSON body reads as `{}`.
pub(crate) async fn post_once(
    http: &dyn HttpPoster,
    kind: ProviderKind,
    url: &str,
    headers: &[(String, String)],
    body: &Value,
) -> Result<Value, ProviderError> {
    let reply = http.post_json(url, headers, body).await?;
    if !reply.is_success() {
        let message = vendor_error_message(reply.body.as_ref())
            .unwrap_or_else(|| kind.fallback_error());
        return Err(ProviderError::Rejected {
            provider: kind,
            status: reply.status,
            message,
        });
    }
    Ok(reply
        .body
        .unwrap_or_else(|| Value::Object(Default::default())))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording fakes for the HTTP and logger seams.

    use crate::http::{HttpPoster, HttpReply};
    use crate::logger::{LogContext, Logger};
    use crate::providers::ProviderError;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub url: String,
        pub headers: Vec<(String, String)>,
        pub body: Value,
    }

    impl RecordedRequest {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    /// Replays scripted replies in order; the last one repeats once the script runs dry.
    #[derive(Default)]
    pub struct ScriptedPoster {
        replies: Mutex<VecDeque<Result<HttpReply, String>>>,
        pub requests: Mutex<Vec<RecordedRequest>>,
    }

    impl ScriptedPoster {
        pub fn new(replies: Vec<Result<HttpReply, String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn ok(body: Value) -> Self {
            Self::new(vec![Ok(HttpReply::new(200, Some(body)))])
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpPoster for ScriptedPoster {
        async fn post_json(
            &self,
            url: &str,
            headers: &[(String, String)],
            body: &Value,
        ) -> Result<HttpReply, ProviderError> {
            self.requests.lock().unwrap().push(RecordedRequest {
                url: url.to_string(),
                headers: headers.to_vec(),
                body: body.clone(),
            });
            let mut replies = self.replies.lock().unwrap();
            let next = if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            };
            match next {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(msg)) => Err(ProviderError::Transport(msg)),
                None => Err(ProviderError::Transport("no scripted reply".into())),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct LogLine {
        pub level: &'static str,
        pub message: String,
        pub attempt: u32,
        pub error: String,
    }

    #[derive(Default)]
    pub struct RecordingLogger {
        pub lines: Mutex<Vec<LogLine>>,
    }

    impl RecordingLogger {
        pub fn lines(&self) -> Vec<LogLine> {
            self.lines.lock().unwrap().clone()
        }

        pub fn count(&self, level: &str) -> usize {
            self.lines().iter().filter(|l| l.level == level).count()
        }

        fn push(&self, level: &'static str, message: &str, ctx: &LogContext<'_>) {
            self.lines.lock().unwrap().push(LogLine {
                level,
                message: message.to_string(),
                attempt: ctx.attempt,
                error: ctx.error.to_string(),
            });
        }
    }

    impl Logger for RecordingLogger {
        fn warn(&self, message: &str, ctx: &LogContext<'_>) {
            self.push("warn", message, ctx);
        }

        fn error(&self, message: &str, ctx: &LogContext<'_>) {
            self.push("error", message, ctx);
        }
    }
}

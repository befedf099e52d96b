use crate::config::LlmConfig;
use crate::http::{HttpPoster, ReqwestPoster};
use crate::logger::{Logger, TracingLogger};
use crate::providers::anthropic::AnthropicProvider;
use crate::providers::google::GoogleProvider;
use crate::providers::openai::OpenAiProvider;
use crate::providers::{Provider, ProviderError, ProviderKind};
use std::sync::Arc;

/// Builds the provider selected by configuration. The only place where a
/// vendor is chosen; everything downstream sees `Arc<dyn Provider>`.
pub struct ProviderBuilder {
    config: LlmConfig,
    http: Option<Arc<dyn HttpPoster>>,
    logger: Option<Arc<dyn Logger>>,
}

impl ProviderBuilder {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            http: None,
            logger: None,
        }
    }

    /// Replace the default reqwest transport.
    pub fn http(mut self, http: Arc<dyn HttpPoster>) -> Self {
        self.http = Some(http);
        self
    }

    /// Replace the default `tracing` logger.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the provider named by `default_provider`.
    pub fn build(self) -> Result<Arc<dyn Provider>, ProviderError> {
        let kind = self.config.selected_kind();
        self.build_kind(kind)
    }

    pub fn build_kind(self, kind: ProviderKind) -> Result<Arc<dyn Provider>, ProviderError> {
        let config = self.config.settings(kind).resolve(kind)?;

        let http: Arc<dyn HttpPoster> = match self.http {
            Some(http) => http,
            None => match config.timeout {
                Some(timeout) => Arc::new(ReqwestPoster::with_timeout(timeout)?),
                None => Arc::new(ReqwestPoster::new()),
            },
        };
        let logger = self.logger.unwrap_or_else(|| Arc::new(TracingLogger));

        tracing::debug!(provider = %kind, base_url = %config.base_url, "Building LLM provider");

        let provider: Arc<dyn Provider> = match kind {
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config, http, logger)),
            ProviderKind::Gemini => Arc::new(GoogleProvider::new(config, http, logger)),
            ProviderKind::Claude => Arc::new(AnthropicProvider::new(config, http, logger)),
        };
        Ok(provider)
    }
}

use crate::providers::retry::RetryPolicy;
use crate::providers::{ProviderError, ProviderKind};
use crate::types::ChatRequest;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    2
}

fn default_provider() -> String {
    "openai".to_string()
}

/// Settings for one provider as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Total attempts per call, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Seconds to wait between attempts.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,

    /// Blank = the vendor's public endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_top_p: Option<f64>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            base_url: None,
            timeout: None,
            default_model: None,
            default_temperature: None,
            default_max_tokens: None,
            default_top_p: None,
        }
    }
}

impl ProviderSettings {
    /// Fill sampling parameters the caller left unset.
    pub fn apply_defaults(&self, request: &mut ChatRequest) {
        if request.temperature.is_none() {
            request.temperature = self.default_temperature;
        }
        if request.max_tokens.is_none() {
            request.max_tokens = self.default_max_tokens;
        }
        if request.top_p.is_none() {
            request.top_p = self.default_top_p;
        }
    }

    /// Validate into the immutable runtime form used by a client.
    pub fn resolve(&self, kind: ProviderKind) -> Result<ProviderConfig, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ProviderError::AuthRequired(format!("API key required for {}", kind))
            })?;

        let base_url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(kind.default_base_url())
            .trim_end_matches('/')
            .to_string();

        let retry = RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay))
            .map_err(|_| {
                ProviderError::Config(format!("{}.max_retries must be at least 1", kind))
            })?;

        Ok(ProviderConfig {
            api_key: api_key.to_string(),
            base_url,
            retry,
            timeout: self.timeout.map(Duration::from_secs),
        })
    }
}

/// Validated per-provider configuration, fixed for the client's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub api_key: String,
    /// Without trailing slash.
    pub base_url: String,
    pub retry: RetryPolicy,
    pub timeout: Option<Duration>,
}

/// The main configuration file structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// `openai`, `gemini` or `claude`; anything else selects `openai`.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default)]
    pub openai: ProviderSettings,
    #[serde(default)]
    pub gemini: ProviderSettings,
    #[serde(default)]
    pub claude: ProviderSettings,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            openai: ProviderSettings::default(),
            gemini: ProviderSettings::default(),
            claude: ProviderSettings::default(),
        }
    }
}

impl LlmConfig {
    pub fn selected_kind(&self) -> ProviderKind {
        ProviderKind::from_name(&self.default_provider)
    }

    pub fn settings(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Claude => &self.claude,
        }
    }

    fn settings_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::Gemini => &mut self.gemini,
            ProviderKind::Claude => &mut self.claude,
        }
    }

    /// Look up a dotted key such as `gemini.max_retries`.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let value = serde_json::to_value(self).ok()?;
        let pointer = format!("/{}", key.replace('.', "/"));
        value.pointer(&pointer).cloned()
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`, e.g. `CLAUDE_API_KEY`, `GEMINI_MAX_RETRIES`.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(p) = lookup("LLM_DEFAULT_PROVIDER") {
            self.default_provider = p;
        }

        for kind in [ProviderKind::OpenAi, ProviderKind::Gemini, ProviderKind::Claude] {
            let prefix = kind.name().to_uppercase();
            let var = |suffix: &str| lookup(&format!("{}_{}", prefix, suffix));
            let settings = self.settings_mut(kind);

            if let Some(v) = var("API_KEY") {
                settings.api_key = Some(v);
            }
            if let Some(v) = var("BASE_URL") {
                settings.base_url = Some(v);
            }
            if let Some(v) = var("DEFAULT_MODEL") {
                settings.default_model = Some(v);
            }
            if let Some(v) = var("MAX_RETRIES") {
                match v.trim().parse() {
                    Ok(n) => settings.max_retries = n,
                    Err(_) => tracing::warn!("Ignoring {}_MAX_RETRIES={:?}: not a number", prefix, v),
                }
            }
            if let Some(v) = var("RETRY_DELAY") {
                match v.trim().parse() {
                    Ok(n) => settings.retry_delay = n,
                    Err(_) => tracing::warn!("Ignoring {}_RETRY_DELAY={:?}: not a number", prefix, v),
                }
            }
        }
    }

    /// Copy with API keys masked, for display.
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        for kind in [ProviderKind::OpenAi, ProviderKind::Gemini, ProviderKind::Claude] {
            let s = cfg.settings_mut(kind);
            if let Some(key) = &s.api_key {
                s.api_key = Some(mask_key(key));
            }
        }
        cfg
    }
}

fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    if key.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{}****", prefix)
    }
}

/// Reads the JSON config file.
#[derive(Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Create a config manager with a custom path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a config manager with the default path (~/.llmkit/config.json).
    pub fn default_path() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".llmkit").join("config.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config; a missing file yields the defaults.
    pub fn load(&self) -> anyhow::Result<LlmConfig> {
        if !self.path.exists() {
            tracing::debug!("No config at {}, using defaults", self.path.display());
            return Ok(LlmConfig::default());
        }
        let data = fs::read_to_string(&self.path)?;
        let cfg = serde_json::from_str(&data).map_err(|e| {
            anyhow::anyhow!("Invalid config file {}: {}", self.path.display(), e)
        })?;
        Ok(cfg)
    }
}

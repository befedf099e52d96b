pub mod client;
pub mod config;
pub mod http;
pub mod logger;
pub mod providers;
pub mod types;

// Re-exports for convenience
pub use client::ProviderBuilder;
pub use config::{ConfigManager, LlmConfig, ProviderConfig, ProviderSettings};
pub use http::{HttpPoster, HttpReply, ReqwestPoster};
pub use logger::{LogContext, Logger, TracingLogger};
pub use providers::retry::RetryPolicy;
pub use providers::{Provider, ProviderError, ProviderKind};
pub use types::*;

//! Logging seam used by the retry executor. The default sink is `tracing`.

/// Structured context attached to every retry log line.
#[derive(Debug, Clone, Copy)]
pub struct LogContext<'a> {
    /// Configuration key of the provider (`openai`, `gemini`, `claude`).
    pub provider: &'a str,
    /// Attempts made so far, including the one that just failed.
    pub attempt: u32,
    pub error: &'a str,
}

pub trait Logger: Send + Sync {
    fn warn(&self, message: &str, ctx: &LogContext<'_>);
    fn error(&self, message: &str, ctx: &LogContext<'_>);
}

/// Forwards to `tracing` events; install a subscriber in the binary to see them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn warn(&self, message: &str, ctx: &LogContext<'_>) {
        tracing::warn!(
            provider = ctx.provider,
            attempt = ctx.attempt,
            error = ctx.error,
            "{}",
            message
        );
    }

    fn error(&self, message: &str, ctx: &LogContext<'_>) {
        tracing::error!(
            provider = ctx.provider,
            attempt = ctx.attempt,
            error = ctx.error,
            "{}",
            message
        );
    }
}

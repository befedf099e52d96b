//! Retry logic shared by every provider: a fixed number of sequential attempts
//! with a constant delay in between. No backoff growth, no jitter.

use crate::logger::{LogContext, Logger};
use crate::providers::{ProviderError, ProviderKind};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How many times to try an operation and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; it must be at least 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, ProviderError> {
        if max_attempts == 0 {
            return Err(ProviderError::Config(
                "max_retries must be at least 1".into(),
            ));
        }
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// Every failure that leaves attempts logs a warning and sleeps for the
    /// configured delay. The final failure is logged at error level and returned
    /// as is, without a trailing sleep.
    pub async fn execute<T, E, F, Fut>(
        &self,
        kind: ProviderKind,
        logger: &dyn Logger,
        mut op: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            attempt += 1;
            let error = err.to_string();
            let ctx = LogContext {
                provider: kind.name(),
                attempt,
                error: &error,
            };

            if attempt >= self.max_attempts {
                logger.error(
                    &format!(
                        "{} API request failed after {} attempts",
                        kind.label(),
                        self.max_attempts
                    ),
                    &ctx,
                );
                return Err(err);
            }

            logger.warn(
                &format!("{} API request failed, retrying...", kind.label()),
                &ctx,
            );
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts two seconds apart.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::RecordingLogger;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy(attempts: u32, secs: u64) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_secs(secs)).unwrap()
    }

    // The paused clock rounds timer deadlines up to the next millisecond.
    fn assert_waited(start: Instant, secs: u64) {
        let elapsed = start.elapsed();
        let expected = Duration::from_secs(secs);
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(10),
            "waited {:?}, expected {:?}",
            elapsed,
            expected
        );
    }

    #[test]
    fn zero_attempts_is_rejected() {
        assert!(matches!(
            RetryPolicy::new(0, Duration::from_secs(1)),
            Err(ProviderError::Config(_))
        ));
    }

    #[test]
    fn default_is_three_attempts_two_seconds() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts(), 3);
        assert_eq!(p.delay(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_runs_max_attempts_with_two_delays() {
        let logger = RecordingLogger::default();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), String> = policy(3, 2)
            .execute(ProviderKind::OpenAi, &logger, || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(format!("boom {}", n)) }
            })
            .await;

        assert_eq!(result.unwrap_err(), "boom 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two inter-attempt delays, none after the last failure.
        assert_waited(start, 4);
        assert_eq!(logger.count("warn"), 2);
        assert_eq!(logger.count("error"), 1);

        let lines = logger.lines();
        assert_eq!(lines[0].message, "OpenAI API request failed, retrying...");
        assert_eq!(lines[0].attempt, 1);
        assert_eq!(lines[0].error, "boom 1");
        assert_eq!(lines[1].attempt, 2);
        assert_eq!(lines[2].message, "OpenAI API request failed after 3 attempts");
        assert_eq!(lines[2].error, "boom 3");
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_second_attempt_waits_once() {
        let logger = RecordingLogger::default();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<&str, String> = policy(3, 2)
            .execute(ProviderKind::Gemini, &logger, || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 1 {
                        Err("flaky".to_string())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_waited(start, 2);
        assert_eq!(logger.count("warn"), 1);
        assert_eq!(logger.count("error"), 0);
        assert_eq!(logger.lines()[0].message, "Gemini API request failed, retrying...");
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_never_sleeps() {
        let logger = RecordingLogger::default();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), String> = policy(1, 30)
            .execute(ProviderKind::Claude, &logger, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down".to_string()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_waited(start, 0);
        assert_eq!(logger.count("warn"), 0);
        assert_eq!(logger.count("error"), 1);
        assert_eq!(logger.lines()[0].message, "Claude API request failed after 1 attempts");
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_success_logs_nothing() {
        let logger = RecordingLogger::default();
        let result: Result<u8, String> = RetryPolicy::default()
            .execute(ProviderKind::OpenAi, &logger, || async { Ok(7) })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert!(logger.lines().is_empty());
    }
}

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::TranslateConfig;
use crate::error::Result;
use super::BatchTranslator;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &TranslateConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_initial_delay_ms),
            Duration::from_millis(config.retry_max_delay_ms),
        )
    }

    /// Delay before retry number `retry` (1-based); doubles each time.
    fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Retries provider faults with exponential backoff. Structural errors
/// are returned at once.
pub struct RetryingTranslator {
    inner: Arc<dyn BatchTranslator>,
    policy: RetryPolicy,
}

impl RetryingTranslator {
    pub fn new(inner: Arc<dyn BatchTranslator>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl BatchTranslator for RetryingTranslator {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>> {
        let mut retry = 0;
        loop {
            match self.inner.translate_batch(texts, source_language, target_language).await {
                Ok(result) => {
                    if retry > 0 {
                        debug!("{}: batch for {} succeeded on retry {}", self.name(), target_language, retry);
                    }
                    return Ok(result);
                }
                Err(e) if e.is_retryable() && retry < self.policy.max_retries => {
                    retry += 1;
                    let delay = self.policy.delay_for_retry(retry);
                    warn!(
                        "{}: batch for {} failed ({}), retry {}/{} in {:?}",
                        self.name(), target_language, e, retry, self.policy.max_retries, delay
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn check_availability(&self) -> Result<()> {
        self.inner.check_availability().await
    }
}

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::types::{GeneratedPathSet, PathGenerationRequest, SkillsAssessmentRequest, SkillsProfile};
use super::{AnalysisError, AnalysisService};

/// Bounded exponential backoff: `base, 2·base, 4·base, …` capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Runs `call` until it succeeds, fails with a non-transient error, or the
/// policy runs out of attempts. The error of the last attempt is returned.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, AnalysisError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AnalysisError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("{} succeeded on attempt {}/{}", operation, attempt, max_attempts);
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "{} attempt {}/{} failed: {}; retrying after {}ms",
                    operation,
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    warn!("{} gave up after {} attempts: {}", operation, attempt, e);
                }
                return Err(e);
            }
        }
    }
}

/// Applies a `RetryPolicy` to every call of the wrapped service.
pub struct RetryingAnalysis {
    inner: Arc<dyn AnalysisService>,
    policy: RetryPolicy,
}

impl RetryingAnalysis {
    pub fn new(inner: Arc<dyn AnalysisService>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl AnalysisService for RetryingAnalysis {
    async fn analyze_skills(
        &self,
        request: &SkillsAssessmentRequest,
    ) -> Result<SkillsProfile, AnalysisError> {
        let inner = &self.inner;
        with_retry(&self.policy, "skills analysis", move || {
            inner.analyze_skills(request)
        })
        .await
    }

    async fn generate_paths(
        &self,
        request: &PathGenerationRequest,
    ) -> Result<GeneratedPathSet, AnalysisError> {
        let inner = &self.inner;
        with_retry(&self.policy, "career path generation", move || {
            inner.generate_paths(request)
        })
        .await
    }
}

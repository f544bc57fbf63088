//! Bounded retry for switch-mutating operations.
//!
//! Every switch call made during reconciliation is wrapped by a
//! [`RetryPolicy`]: transient failures are retried up to a configured
//! bound, permanent failures surface immediately. Wrapped operations must
//! be idempotent; the policy never compensates, it only re-executes.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{AgentError, AgentResult};

/// Retries an async operation while its error classifies as transient.
///
/// On permanent failure or retry exhaustion the last error is propagated
/// unchanged, so callers see the original failure kind.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt bound and inter-attempt delay.
    ///
    /// A bound of zero is treated as one attempt.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Creates a policy that retries without sleeping. Used by tests.
    pub fn no_delay(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Returns the attempt bound.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Executes `op`, retrying failures that [`AgentError::is_retryable`]
    /// classifies as transient.
    pub async fn execute<T, F, Fut>(&self, op: F) -> AgentResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AgentResult<T>>,
    {
        self.execute_classified(op, AgentError::is_retryable).await
    }

    /// Executes `op` with an explicit transient/permanent classifier.
    pub async fn execute_classified<T, F, Fut, C>(&self, mut op: F, classify: C) -> AgentResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AgentResult<T>>,
        C: Fn(&AgentError) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if classify(&err) && attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "transient failure, retrying"
                    );
                    attempt += 1;
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

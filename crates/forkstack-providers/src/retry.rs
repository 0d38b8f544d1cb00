use crate::{CallContext, ProviderError};
use forkstack_schema::TimeoutSection;
use std::time::Duration;

/// Bounded exponential backoff for transient provider failures.
///
/// Only `Transient` errors are retried. Once attempts run out, or the next
/// sleep would overrun the call deadline, the last error escalates to
/// `Permanent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base,
        }
    }

    pub fn from_config(timeouts: &TimeoutSection) -> Self {
        Self::new(timeouts.retry_attempts, timeouts.retry_base())
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay before retry number `attempt` (1-based): base, 2×base, 4×base, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base.saturating_mul(1 << shift)
    }

    pub fn run<T>(
        &self,
        ctx: &CallContext,
        what: &str,
        mut op: impl FnMut() -> Result<T, ProviderError>,
    ) -> Result<T, ProviderError> {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempt >= self.attempts {
                        return Err(e.escalate(attempt));
                    }
                    let delay = self.backoff(attempt);
                    let fits = ctx.remaining().is_ok_and(|left| left > delay);
                    if !fits {
                        return Err(e.escalate(attempt));
                    }
                    tracing::debug!(
                        "{what}: transient failure (attempt {attempt}/{}): {e}; retrying in {delay:?}",
                        self.attempts
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

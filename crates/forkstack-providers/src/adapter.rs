use crate::ProviderError;
use forkstack_schema::ResourceKind;
use forkstack_store::ResourceHandle;
use std::time::{Duration, Instant};

/// Per-call context: which project the call is for and when it must give up.
#[derive(Debug, Clone)]
pub struct CallContext {
    project: String,
    deadline: Instant,
}

impl CallContext {
    pub fn new(project: &str, timeout: Duration) -> Self {
        Self {
            project: project.to_owned(),
            deadline: Instant::now() + timeout,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Time left before the deadline. An expired deadline is a transient failure.
    pub fn remaining(&self) -> Result<Duration, ProviderError> {
        let left = self.deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(ProviderError::transient("deadline exceeded"));
        }
        Ok(left)
    }
}

/// A client for one backend of one resource kind.
///
/// Adapters hold configuration only; all state lives with the provider.
/// `delete` must succeed when the resource is already gone.
pub trait ProviderAdapter: Send + Sync {
    /// Stable identifier recorded in handles, e.g. `turso` or `s3`.
    fn provider_id(&self) -> &str;

    fn kind(&self) -> ResourceKind;

    /// Fork `source` into a new resource for `env`.
    fn create(
        &self,
        ctx: &CallContext,
        env: &str,
        source: &str,
    ) -> Result<ResourceHandle, ProviderError>;

    /// Resolve the existing resource for `env`, or fail with `NotFound`.
    fn locate(&self, ctx: &CallContext, env: &str) -> Result<ResourceHandle, ProviderError>;

    fn delete(&self, ctx: &CallContext, env: &str) -> Result<(), ProviderError>;

    /// Deadline for `create` when it may fall back to copying data.
    /// `None` means the regular per-call timeout applies.
    fn create_timeout(&self) -> Option<Duration> {
        None
    }
}

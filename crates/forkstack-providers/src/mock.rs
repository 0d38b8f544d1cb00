use crate::{CallContext, ErrorClass, ProviderAdapter, ProviderError};
use forkstack_schema::{MockConfig, MockFailure, ResourceKind, DEFAULT_SOURCE};
use forkstack_store::ResourceHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Create,
    Locate,
    Delete,
}

impl From<MockFailure> for MockOp {
    fn from(f: MockFailure) -> Self {
        match f {
            MockFailure::Create => MockOp::Create,
            MockFailure::Locate => MockOp::Locate,
            MockFailure::Delete => MockOp::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub op: MockOp,
    pub env: String,
}

#[derive(Debug, Clone, Copy)]
struct Injected {
    op: MockOp,
    class: ErrorClass,
    /// `None` fails forever; `Some(n)` fails the next `n` calls.
    remaining: Option<u32>,
}

/// In-memory adapter that records every call and can be told to fail.
pub struct MockAdapter {
    kind: ResourceKind,
    provider_id: String,
    ref_template: String,
    resources: Mutex<HashMap<String, String>>,
    failure: Mutex<Option<Injected>>,
    /// Injected create failures land after the resource was stored.
    late_create_failure: AtomicBool,
    calls: Mutex<Vec<MockCall>>,
}

impl MockAdapter {
    pub fn new(kind: ResourceKind, provider_id: &str) -> Self {
        Self {
            kind,
            provider_id: provider_id.to_owned(),
            ref_template: format!("mock://{kind}/{{project}}-{{env}}"),
            resources: Mutex::new(HashMap::new()),
            failure: Mutex::new(None),
            late_create_failure: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(kind: ResourceKind, config: &MockConfig) -> Self {
        let adapter = Self::new(kind, "mock");
        if let Some(op) = config.fail_on {
            let class = if config.transient {
                ErrorClass::Transient
            } else {
                ErrorClass::Permanent
            };
            adapter.fail_on(op.into(), class);
        }
        adapter
    }

    /// External references are rendered from `template`, substituting
    /// `{project}` and `{env}`.
    #[must_use]
    pub fn with_ref_template(mut self, template: &str) -> Self {
        self.ref_template = template.to_owned();
        self
    }

    pub fn fail_on(&self, op: MockOp, class: ErrorClass) {
        self.inject(op, class, None);
    }

    /// Fail the next `times` calls of `op`, then behave normally.
    pub fn fail_times(&self, op: MockOp, class: ErrorClass, times: u32) {
        self.inject(op, class, Some(times));
    }

    /// Fail every create only after the resource exists, like a provider
    /// call that times out once the remote side has finished.
    pub fn fail_after_create(&self, class: ErrorClass) {
        self.late_create_failure.store(true, Ordering::SeqCst);
        self.inject(MockOp::Create, class, None);
    }

    pub fn clear_failure(&self) {
        self.late_create_failure.store(false, Ordering::SeqCst);
        if let Ok(mut f) = self.failure.lock() {
            *f = None;
        }
    }

    fn inject(&self, op: MockOp, class: ErrorClass, remaining: Option<u32>) {
        if let Ok(mut f) = self.failure.lock() {
            *f = Some(Injected {
                op,
                class,
                remaining,
            });
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self, op: MockOp) -> usize {
        self.calls().iter().filter(|c| c.op == op).count()
    }

    pub fn exists(&self, env: &str) -> bool {
        self.resources.lock().is_ok_and(|r| r.contains_key(env))
    }

    /// Environments that currently hold a resource, sorted.
    pub fn live(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .resources
            .lock()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Drop the resource behind the adapter's back, as an operator might.
    pub fn forget(&self, env: &str) {
        if let Ok(mut r) = self.resources.lock() {
            r.remove(env);
        }
    }

    fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, ProviderError> {
        m.lock()
            .map_err(|e| ProviderError::permanent(format!("mock state poisoned: {e}")))
    }

    fn enter(&self, op: MockOp, env: &str) -> Result<(), ProviderError> {
        Self::lock(&self.calls)?.push(MockCall {
            op,
            env: env.to_owned(),
        });
        let mut failure = Self::lock(&self.failure)?;
        let Some(injected) = failure.as_mut().filter(|f| f.op == op) else {
            return Ok(());
        };
        let class = injected.class;
        match &mut injected.remaining {
            Some(0) => return Ok(()),
            Some(n) => *n -= 1,
            None => {}
        }
        let message = format!("injected {} failure for {} on '{env}'", self.kind, self.provider_id);
        Err(ProviderError { class, message })
    }

    fn render(&self, project: &str, env: &str) -> String {
        self.ref_template
            .replace("{project}", project)
            .replace("{env}", env)
    }

    fn handle(&self, external_ref: String) -> ResourceHandle {
        ResourceHandle::ready(self.kind, &self.provider_id, external_ref)
    }
}

impl ProviderAdapter for MockAdapter {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn create(
        &self,
        ctx: &CallContext,
        env: &str,
        _source: &str,
    ) -> Result<ResourceHandle, ProviderError> {
        let injected = self.enter(MockOp::Create, env);
        let late = self.late_create_failure.load(Ordering::SeqCst);
        if !late {
            injected.clone()?;
        }
        let mut resources = Self::lock(&self.resources)?;
        if resources.contains_key(env) {
            return Err(ProviderError::permanent(format!(
                "mock {} for '{env}' already exists",
                self.kind
            )));
        }
        let external_ref = self.render(ctx.project(), env);
        resources.insert(env.to_owned(), external_ref.clone());
        injected?;
        Ok(self.handle(external_ref))
    }

    fn locate(&self, _ctx: &CallContext, env: &str) -> Result<ResourceHandle, ProviderError> {
        self.enter(MockOp::Locate, env)?;
        let resources = Self::lock(&self.resources)?;
        let external_ref = resources.get(env).cloned().ok_or_else(|| {
            ProviderError::not_found(format!("mock {} for '{env}' not found", self.kind))
        })?;
        Ok(self.handle(external_ref))
    }

    fn delete(&self, _ctx: &CallContext, env: &str) -> Result<(), ProviderError> {
        self.enter(MockOp::Delete, env)?;
        if env == DEFAULT_SOURCE {
            return Err(ProviderError::permanent("refusing to delete production"));
        }
        Self::lock(&self.resources)?.remove(env);
        Ok(())
    }
}

use crate::concurrency::{shutdown_requested, EnvLock};
use crate::lifecycle::validate_transition;
use crate::{CoreError, ResourceFailure};
use chrono::{DateTime, Utc};
use forkstack_providers::{CallContext, ProviderAdapter, ProviderRegistry, RetryPolicy};
use forkstack_schema::{validate_env_name, ProjectConfig, ResourceKey, DEFAULT_ENV, DEFAULT_SOURCE};
use forkstack_store::{
    resolve_current, DescriptorStore, EnvStatus, Environment, PointerOrigin, PointerStore,
    ResourceHandle, ResourceStatus, StateLayout, StoreError,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Policy knobs the orchestrator takes from project configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub project: String,
    /// Baseline environments: always present, never created or deleted here.
    pub protected: Vec<String>,
    pub default_source: String,
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl OrchestratorOptions {
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_owned(),
            protected: vec![DEFAULT_ENV.to_owned(), DEFAULT_SOURCE.to_owned()],
            default_source: DEFAULT_SOURCE.to_owned(),
            call_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            project: config.project.name.clone(),
            protected: config.project.protected.clone(),
            default_source: config.project.default_source.clone(),
            call_timeout: config.timeouts.call_timeout(),
            retry: RetryPolicy::from_config(&config.timeouts),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateReport {
    pub name: String,
    pub source: String,
    pub resources: BTreeMap<ResourceKey, ResourceHandle>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwitchReport {
    pub name: String,
    pub previous: Option<String>,
    /// Drift-check problems; the switch went ahead regardless.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub name: String,
    /// False when there was nothing recorded under this name.
    pub existed: bool,
    pub deleted: Vec<ResourceKey>,
    pub was_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvSummary {
    pub name: String,
    pub status: EnvStatus,
    pub protected: bool,
    pub active: bool,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resources: BTreeMap<ResourceKey, ResourceHandle>,
}

impl EnvSummary {
    fn new(env: Environment, active: bool) -> Self {
        Self {
            name: env.name,
            status: env.status,
            protected: env.protected,
            active,
            source: env.source,
            created_at: env.created_at,
            resources: env.resources,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentEnv {
    pub name: String,
    pub origin: PointerOrigin,
    /// Recorded in the descriptor store, or a protected baseline.
    pub exists: bool,
}

type CancelCheck = dyn Fn() -> bool + Send + Sync;

/// Drives `create`, `switch` and `delete` across the configured providers.
///
/// Provider calls run one at a time in registry order (database, storage,
/// secrets) and every step is persisted before the next one starts, so an
/// interrupted operation always leaves a descriptor that says how far it got.
pub struct Orchestrator {
    layout: StateLayout,
    store: DescriptorStore,
    registry: ProviderRegistry,
    pointer: Box<dyn PointerStore>,
    options: OrchestratorOptions,
    override_name: Option<String>,
    cancel: Box<CancelCheck>,
}

impl Orchestrator {
    pub fn new(
        layout: StateLayout,
        registry: ProviderRegistry,
        pointer: Box<dyn PointerStore>,
        options: OrchestratorOptions,
    ) -> Result<Self, CoreError> {
        layout.initialize()?;
        Ok(Self {
            store: DescriptorStore::new(layout.clone()),
            layout,
            registry,
            pointer,
            options,
            override_name: None,
            cancel: Box::new(shutdown_requested),
        })
    }

    /// Explicit environment override, e.g. from `FORKSTACK_ENV`.
    #[must_use]
    pub fn with_override(mut self, name: Option<String>) -> Self {
        self.override_name = name;
        self
    }

    /// Replace the interrupt flag consulted between provider calls.
    #[must_use]
    pub fn with_cancel_check(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.cancel = Box::new(check);
        self
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.options.protected.iter().any(|p| p == name)
    }

    fn lock(&self, name: &str) -> Result<EnvLock, CoreError> {
        EnvLock::try_hold(&self.layout, name)
    }

    fn load(&self, name: &str) -> Result<Environment, CoreError> {
        self.store.get(name).map_err(|e| match e {
            StoreError::EnvNotFound(n) => CoreError::EnvNotFound(n),
            other => CoreError::Store(other),
        })
    }

    fn persist(&self, env: &mut Environment) -> Result<(), CoreError> {
        env.touch();
        self.store.put(env)?;
        Ok(())
    }

    fn call_context(&self, adapter: &dyn ProviderAdapter, creating: bool) -> CallContext {
        let timeout = if creating {
            adapter.create_timeout().unwrap_or(self.options.call_timeout)
        } else {
            self.options.call_timeout
        };
        CallContext::new(&self.options.project, timeout)
    }

    /// Adapters for every recorded resource in `keys`, checked against the
    /// provider that created each one.
    fn adapters_for(
        &self,
        env: &Environment,
        keys: &[ResourceKey],
    ) -> Result<Vec<(ResourceKey, Arc<dyn ProviderAdapter>)>, CoreError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let adapter =
                self.registry
                    .get(key)
                    .ok_or_else(|| CoreError::UnconfiguredResource {
                        name: env.name.clone(),
                        key: key.clone(),
                    })?;
            if let Some(handle) = env.resources.get(key) {
                if handle.provider_id != adapter.provider_id() {
                    return Err(CoreError::ProviderMismatch {
                        key: key.clone(),
                        recorded: handle.provider_id.clone(),
                        configured: adapter.provider_id().to_owned(),
                    });
                }
            }
            out.push((key.clone(), adapter));
        }
        Ok(out)
    }

    /// A fork source must be a baseline or a ready environment.
    fn check_source(&self, source: &str) -> Result<(), CoreError> {
        validate_env_name(source)?;
        if self.is_protected(source) {
            return Ok(());
        }
        let env = self.load(source)?;
        if env.status != EnvStatus::Ready {
            return Err(CoreError::NotReady {
                name: source.to_owned(),
                status: env.status,
            });
        }
        Ok(())
    }

    /// Fork every configured resource from `source` into a new environment
    /// called `name`, then make it the active one.
    pub fn create(&self, name: &str, source: Option<&str>) -> Result<CreateReport, CoreError> {
        validate_env_name(name)?;
        if self.is_protected(name) {
            return Err(CoreError::Protected(name.to_owned()));
        }
        let source = source.unwrap_or(self.options.default_source.as_str()).to_owned();
        self.check_source(&source)?;

        let _lock = self.lock(name)?;
        if self.store.exists(name) {
            return Err(CoreError::AlreadyExists(name.to_owned()));
        }

        info!("creating environment '{name}' from '{source}'");
        let mut env = Environment::new(name, Some(&source), false);
        self.persist(&mut env)?;

        for (key, adapter) in self.registry.iter() {
            if (self.cancel)() {
                warn!("create of '{name}' cancelled before {key}");
                self.persist(&mut env)?;
                return Err(CoreError::Cancelled {
                    name: name.to_owned(),
                    outstanding: env.outstanding(),
                });
            }

            env.resources.insert(
                key.clone(),
                ResourceHandle::pending(adapter.kind(), adapter.provider_id()),
            );
            self.persist(&mut env)?;

            let ctx = self.call_context(adapter.as_ref(), true);
            debug!("{key}: {}.create({name}, from {source})", adapter.provider_id());
            let result = self
                .options
                .retry
                .run(&ctx, &format!("create {key}"), || {
                    adapter.create(&ctx, name, &source)
                });
            match result {
                Ok(handle) => {
                    debug!("{key}: ready at {}", handle.external_ref);
                    env.resources.insert(key.clone(), handle);
                    self.persist(&mut env)?;
                }
                Err(reason) => {
                    return Err(self.abort_create(env, key, adapter.as_ref(), reason));
                }
            }
        }

        validate_transition(env.status, EnvStatus::Ready)?;
        env.status = EnvStatus::Ready;
        self.persist(&mut env)?;
        self.pointer.write(name)?;
        info!("environment '{name}' is ready and active");

        Ok(CreateReport {
            name: env.name,
            source,
            resources: env.resources,
        })
    }

    /// Compensate a failed create: delete what already exists, newest first.
    /// The failed resource is included: a create can fail after the
    /// provider already made it.
    fn abort_create(
        &self,
        mut env: Environment,
        failed: &ResourceKey,
        adapter: &dyn ProviderAdapter,
        reason: forkstack_providers::ProviderError,
    ) -> CoreError {
        warn!("{failed}: create failed: {reason}; rolling back '{}'", env.name);
        if let Some(handle) = env.resources.get_mut(failed) {
            handle.status = ResourceStatus::Failed;
            handle.error = Some(reason.to_string());
        }
        if let Err(e) = self.persist(&mut env) {
            warn!("could not record failure of '{}': {e}", env.name);
        }

        let mut rollback_failures = Vec::new();
        let ready: Vec<ResourceKey> = env
            .resources
            .iter()
            .filter(|(_, h)| h.status == ResourceStatus::Ready)
            .map(|(k, _)| k.clone())
            .collect();
        let undo_order = std::iter::once(failed.clone()).chain(ready.into_iter().rev());
        for key in undo_order {
            let Some(undo) = self.registry.get(&key) else {
                continue;
            };
            let ctx = self.call_context(undo.as_ref(), false);
            debug!("{key}: rollback via {}.delete({})", undo.provider_id(), env.name);
            let result = self
                .options
                .retry
                .run(&ctx, &format!("rollback {key}"), || undo.delete(&ctx, &env.name));
            let Some(handle) = env.resources.get_mut(&key) else {
                continue;
            };
            match result {
                Ok(()) => handle.status = ResourceStatus::Deleted,
                Err(e) if e.is_not_found() => handle.status = ResourceStatus::Deleted,
                Err(e) => {
                    warn!("{key}: rollback failed: {e}");
                    handle.error = Some(format!("rollback failed: {e}"));
                    rollback_failures.push(ResourceFailure { key, error: e });
                }
            }
            if let Err(e) = self.persist(&mut env) {
                warn!("could not record rollback of '{}': {e}", env.name);
            }
        }

        if rollback_failures.is_empty() {
            if let Err(e) = self.store.remove(&env.name) {
                warn!("could not remove descriptor for '{}': {e}", env.name);
            }
        } else {
            env.status = EnvStatus::Failed;
            if let Err(e) = self.persist(&mut env) {
                warn!("could not record failed state of '{}': {e}", env.name);
            }
        }

        CoreError::CreateFailed {
            name: env.name,
            kind: adapter.kind(),
            key: failed.clone(),
            reason,
            rollback_failures,
        }
    }

    /// Point the active environment at `name` after a best-effort drift check.
    pub fn switch(&self, name: &str) -> Result<SwitchReport, CoreError> {
        validate_env_name(name)?;
        let _lock = self.lock(name)?;
        let mut warnings = Vec::new();

        match self.load(name) {
            Ok(env) => {
                if env.status != EnvStatus::Ready {
                    return Err(CoreError::NotReady {
                        name: name.to_owned(),
                        status: env.status,
                    });
                }
                let keys: Vec<ResourceKey> = env.resources.keys().cloned().collect();
                for (key, adapter) in self.adapters_for(&env, &keys)? {
                    let Some(recorded) = env.resources.get(&key) else {
                        continue;
                    };
                    let ctx = self.call_context(adapter.as_ref(), false);
                    let located = self
                        .options
                        .retry
                        .run(&ctx, &format!("locate {key}"), || adapter.locate(&ctx, name));
                    match located {
                        Ok(found) if found.external_ref != recorded.external_ref => {
                            warnings.push(format!(
                                "{key}: provider reports {} but {} is recorded",
                                found.external_ref, recorded.external_ref
                            ));
                        }
                        Ok(_) => {}
                        Err(e) => warnings.push(format!("{key}: {e}")),
                    }
                }
            }
            Err(CoreError::EnvNotFound(_)) if self.is_protected(name) => {
                debug!("'{name}' is a baseline environment");
            }
            Err(e) => return Err(e),
        }

        for w in &warnings {
            warn!("drift check for '{name}': {w}");
        }
        let previous = self.pointer.read()?;
        self.pointer.write(name)?;
        info!("switched to '{name}'");

        Ok(SwitchReport {
            name: name.to_owned(),
            previous,
            warnings,
        })
    }

    /// Tear down every outstanding resource of `name`, then forget it.
    ///
    /// Safe to repeat: already-deleted resources are skipped and a name with
    /// no record succeeds with an empty report.
    pub fn delete(&self, name: &str) -> Result<DeleteReport, CoreError> {
        validate_env_name(name)?;
        if self.is_protected(name) {
            return Err(CoreError::Protected(name.to_owned()));
        }
        let _lock = self.lock(name)?;

        let mut env = match self.load(name) {
            Ok(env) => env,
            Err(CoreError::EnvNotFound(_)) => {
                debug!("'{name}' is not recorded; nothing to delete");
                return Ok(DeleteReport {
                    name: name.to_owned(),
                    existed: false,
                    deleted: Vec::new(),
                    was_active: false,
                });
            }
            Err(e) => return Err(e),
        };
        if env.protected {
            return Err(CoreError::Protected(name.to_owned()));
        }

        let outstanding = env.outstanding();
        let adapters = self.adapters_for(&env, &outstanding)?;

        info!("deleting environment '{name}'");
        validate_transition(env.status, EnvStatus::TearingDown)?;
        env.status = EnvStatus::TearingDown;
        self.persist(&mut env)?;

        let mut deleted = Vec::new();
        let mut failures = Vec::new();
        for (key, adapter) in adapters.into_iter().rev() {
            if (self.cancel)() {
                warn!("delete of '{name}' cancelled before {key}");
                return Err(CoreError::Cancelled {
                    name: name.to_owned(),
                    outstanding: env.outstanding(),
                });
            }
            let ctx = self.call_context(adapter.as_ref(), false);
            debug!("{key}: {}.delete({name})", adapter.provider_id());
            let result = self
                .options
                .retry
                .run(&ctx, &format!("delete {key}"), || adapter.delete(&ctx, name));
            let Some(handle) = env.resources.get_mut(&key) else {
                continue;
            };
            match result {
                Ok(()) => {
                    handle.status = ResourceStatus::Deleted;
                    handle.error = None;
                    deleted.push(key);
                }
                Err(e) if e.is_not_found() => {
                    handle.status = ResourceStatus::Deleted;
                    handle.error = None;
                    deleted.push(key);
                }
                Err(e) => {
                    warn!("{key}: delete failed: {e}");
                    handle.error = Some(e.to_string());
                    failures.push(ResourceFailure { key, error: e });
                }
            }
            self.persist(&mut env)?;
        }

        if !failures.is_empty() {
            return Err(CoreError::DeleteIncomplete {
                name: name.to_owned(),
                failures,
            });
        }

        self.store.remove(name)?;
        let was_active = self.pointer.clear_if(name)?;
        if was_active {
            info!("'{name}' was active; falling back to '{DEFAULT_ENV}'");
        }
        info!("environment '{name}' deleted");

        Ok(DeleteReport {
            name: name.to_owned(),
            existed: true,
            deleted,
            was_active,
        })
    }

    /// Recorded environments in creation order, marked with the active one.
    pub fn list(&self) -> Result<Vec<EnvSummary>, CoreError> {
        let current = self.current()?;
        Ok(self
            .store
            .list()?
            .into_iter()
            .map(|env| {
                let active = env.name == current.name;
                EnvSummary::new(env, active)
            })
            .collect())
    }

    pub fn current(&self) -> Result<CurrentEnv, CoreError> {
        let (name, origin) =
            resolve_current(self.pointer.as_ref(), self.override_name.as_deref())?;
        let exists = self.is_protected(&name) || self.store.exists(&name);
        Ok(CurrentEnv {
            name,
            origin,
            exists,
        })
    }

    pub fn show(&self, name: &str) -> Result<EnvSummary, CoreError> {
        validate_env_name(name)?;
        let env = self.load(name)?;
        let active = self.current()?.name == env.name;
        Ok(EnvSummary::new(env, active))
    }
}

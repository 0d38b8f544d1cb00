//! Fork orchestration for forkstack environments.
//!
//! This crate ties together configuration, the descriptor store, the
//! current-environment pointer and the provider registry into the
//! [`Orchestrator`]: the state machine behind `create`, `switch`, `delete`
//! and `list`. It also provides per-name advisory locking, interrupt-driven
//! cancellation, and lifecycle transition validation.

pub mod concurrency;
pub mod lifecycle;
pub mod orchestrator;

pub use concurrency::{install_signal_handler, shutdown_requested, EnvLock};
pub use lifecycle::validate_transition;
pub use orchestrator::{
    CreateReport, CurrentEnv, DeleteReport, EnvSummary, Orchestrator, OrchestratorOptions,
    SwitchReport,
};

use forkstack_providers::ProviderError;
use forkstack_schema::{ResourceKey, ResourceKind};
use forkstack_store::EnvStatus;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// One resource that a create, rollback or delete step could not handle.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceFailure {
    pub key: ResourceKey,
    pub error: ProviderError,
}

impl fmt::Display for ResourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.error)
    }
}

fn join_failures(failures: &[ResourceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn rollback_note(failures: &[ResourceFailure]) -> String {
    if failures.is_empty() {
        String::new()
    } else {
        format!(" (rollback also failed: {})", join_failures(failures))
    }
}

fn join_keys(keys: &[ResourceKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(#[from] forkstack_schema::ConfigError),
    #[error("store error: {0}")]
    Store(#[from] forkstack_store::StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("environment '{0}' already exists")]
    AlreadyExists(String),
    #[error("environment not found: {0}")]
    EnvNotFound(String),
    #[error("environment '{name}' is not ready (status: {status})")]
    NotReady { name: String, status: EnvStatus },
    #[error("environment '{0}' is protected")]
    Protected(String),
    #[error("another operation on '{0}' is in progress")]
    OperationInProgress(String),
    #[error("environment '{name}' records {key} but no adapter is configured for it")]
    UnconfiguredResource { name: String, key: ResourceKey },
    #[error("{key} was created by '{recorded}' but '{configured}' is configured")]
    ProviderMismatch {
        key: ResourceKey,
        recorded: String,
        configured: String,
    },
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: EnvStatus, to: EnvStatus },
    #[error("failed to create '{name}': {kind}: {reason}{}", rollback_note(.rollback_failures))]
    CreateFailed {
        name: String,
        kind: ResourceKind,
        key: ResourceKey,
        reason: ProviderError,
        rollback_failures: Vec<ResourceFailure>,
    },
    #[error("could not fully delete '{name}': {}", join_failures(.failures))]
    DeleteIncomplete {
        name: String,
        failures: Vec<ResourceFailure>,
    },
    #[error("operation on '{name}' was cancelled; outstanding: [{}]", join_keys(.outstanding))]
    Cancelled {
        name: String,
        outstanding: Vec<ResourceKey>,
    },
}

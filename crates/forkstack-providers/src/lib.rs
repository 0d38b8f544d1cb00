//! Provider adapters for forkstack resources.
//!
//! Every backend (a branchable database, a forkable bucket, a secrets store)
//! sits behind the narrow [`ProviderAdapter`] contract of `create`, `locate`
//! and `delete`. Adapters are chosen once from [`ProjectConfig`] by the
//! [`ProviderRegistry`]; the orchestrator never names a concrete backend.
//!
//! [`ProjectConfig`]: forkstack_schema::ProjectConfig

pub mod adapter;
pub mod doppler;
pub(crate) mod http;
pub mod local;
pub mod mock;
pub mod neon;
pub mod registry;
pub mod retry;
pub mod s3;
pub(crate) mod sigv4;
pub mod turso;

#[cfg(test)]
pub(crate) mod fake_server;

pub use adapter::{CallContext, ProviderAdapter};
pub use mock::{MockAdapter, MockCall, MockOp};
pub use registry::ProviderRegistry;
pub use retry::RetryPolicy;

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// How the orchestrator should react to a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Timeouts, rate limits, dropped connections. Worth retrying.
    Transient,
    /// Auth failures, quota, invalid remote state. Retrying will not help.
    Permanent,
    /// The resource does not exist. `delete` treats this as success.
    NotFound,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Transient => write!(f, "transient"),
            ErrorClass::Permanent => write!(f, "permanent"),
            ErrorClass::NotFound => write!(f, "not found"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct ProviderError {
    pub class: ErrorClass,
    pub message: String,
}

impl ProviderError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Permanent,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::NotFound,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class == ErrorClass::Transient
    }

    pub fn is_not_found(&self) -> bool {
        self.class == ErrorClass::NotFound
    }

    /// Reclassify an exhausted transient failure as permanent.
    #[must_use]
    pub fn escalate(self, attempts: u32) -> Self {
        Self::permanent(format!("{} (gave up after {attempts} attempts)", self.message))
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(e.to_string()),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted => {
                Self::transient(e.to_string())
            }
            _ => Self::permanent(e.to_string()),
        }
    }
}

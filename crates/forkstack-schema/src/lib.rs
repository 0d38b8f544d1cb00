//! Project configuration, environment naming, and resource identities for forkstack.
//!
//! This crate defines the schema layer: `.forkstack.toml` parsing into
//! [`ProjectConfig`] with per-resource provider selection, the environment
//! name charset shared by every provider ([`validate_env_name`]), random name
//! generation, and the [`ResourceKey`] that orders provisioning steps.

pub mod config;
pub mod name;
pub mod types;

pub use config::{
    example_config, DatabaseConfig, DopplerConfig, LocalDatabaseConfig, LocalStorageConfig,
    MockConfig, MockFailure, NeonConfig, ProjectConfig, ProjectSection, S3Config, SecretsConfig,
    StorageConfig, TigrisConfig, TimeoutSection, TursoConfig, CONFIG_FILE_NAMES,
};
pub use name::{generate_env_name, validate_env_name, DEFAULT_ENV, DEFAULT_SOURCE};
pub use types::{ResourceKey, ResourceKind};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("no .forkstack.toml found in {} or any parent directory", .0.display())]
    NotFound(PathBuf),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid environment name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
    #[error("invalid resource key: {0}")]
    InvalidResourceKey(String),
}

use crate::layout::StateLayout;
use crate::{write_atomic, StoreError};
use chrono::{DateTime, Utc};
use forkstack_schema::{validate_env_name, ResourceKey, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnvStatus {
    Provisioning,
    Ready,
    Failed,
    TearingDown,
}

impl fmt::Display for EnvStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvStatus::Provisioning => write!(f, "provisioning"),
            EnvStatus::Ready => write!(f, "ready"),
            EnvStatus::Failed => write!(f, "failed"),
            EnvStatus::TearingDown => write!(f, "tearing_down"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Pending,
    Ready,
    Failed,
    Deleted,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceStatus::Pending => write!(f, "pending"),
            ResourceStatus::Ready => write!(f, "ready"),
            ResourceStatus::Failed => write!(f, "failed"),
            ResourceStatus::Deleted => write!(f, "deleted"),
        }
    }
}

/// Provider-issued reference to one provisioned resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    /// Provider that created the resource; teardown must go through the same one.
    pub provider_id: String,
    /// Branch name, URL, or bucket path the provider addresses the resource by.
    pub external_ref: String,
    pub status: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResourceHandle {
    pub fn ready(kind: ResourceKind, provider_id: &str, external_ref: impl Into<String>) -> Self {
        Self {
            kind,
            provider_id: provider_id.to_owned(),
            external_ref: external_ref.into(),
            status: ResourceStatus::Ready,
            error: None,
        }
    }

    pub fn pending(kind: ResourceKind, provider_id: &str) -> Self {
        Self {
            kind,
            provider_id: provider_id.to_owned(),
            external_ref: String::new(),
            status: ResourceStatus::Pending,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub status: EnvStatus,
    #[serde(default)]
    pub protected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub resources: BTreeMap<ResourceKey, ResourceHandle>,
    /// blake3 checksum over the record, excluding this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl Environment {
    pub fn new(name: &str, source: Option<&str>, protected: bool) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_owned(),
            status: EnvStatus::Provisioning,
            protected,
            source: source.map(str::to_owned),
            created_at: now,
            updated_at: now,
            resources: BTreeMap::new(),
            checksum: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Keys whose resources are not yet confirmed deleted.
    pub fn outstanding(&self) -> Vec<ResourceKey> {
        self.resources
            .iter()
            .filter(|(_, h)| h.status != ResourceStatus::Deleted)
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string_pretty(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

/// File-backed record of every environment and its resource handles.
///
/// One JSON file per environment under `envs/`; writes replace a single file
/// atomically, so each record is all-or-nothing for concurrent readers.
pub struct DescriptorStore {
    layout: StateLayout,
}

impl DescriptorStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn put(&self, env: &Environment) -> Result<(), StoreError> {
        validate_env_name(&env.name)?;
        let dest = self.layout.env_file(&env.name);

        let mut with_checksum = env.clone();
        with_checksum.checksum = Some(with_checksum.compute_checksum()?);
        let content = serde_json::to_string_pretty(&with_checksum)?;

        let dir = self.layout.envs_dir();
        fs::create_dir_all(&dir)?;
        write_atomic(&dir, &dest, content.as_bytes())
    }

    pub fn get(&self, name: &str) -> Result<Environment, StoreError> {
        validate_env_name(name)?;
        let path = self.layout.env_file(name);
        if !path.exists() {
            return Err(StoreError::EnvNotFound(name.to_owned()));
        }
        let content = fs::read_to_string(&path)?;
        let env: Environment = serde_json::from_str(&content)?;

        if let Some(ref expected) = env.checksum {
            let actual = env.compute_checksum()?;
            if actual != *expected {
                return Err(StoreError::IntegrityFailure {
                    name: name.to_owned(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(env)
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_env_name(name).is_ok() && self.layout.env_file(name).exists()
    }

    pub fn remove(&self, name: &str) -> Result<(), StoreError> {
        validate_env_name(name)?;
        let path = self.layout.env_file(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// All readable environments, oldest first. Corrupt records are skipped.
    pub fn list(&self) -> Result<Vec<Environment>, StoreError> {
        let mut results = Vec::new();
        for entry in self.list_with_errors()? {
            match entry {
                Ok(env) => results.push(env),
                Err((name, e)) => {
                    tracing::warn!("skipping corrupted descriptor '{name}': {e}");
                }
            }
        }
        results.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(results)
    }

    /// Like `list()`, but returns per-entry `Result`s so callers can surface
    /// individual corruption errors.
    #[allow(clippy::type_complexity)]
    pub fn list_with_errors(
        &self,
    ) -> Result<Vec<Result<Environment, (String, StoreError)>>, StoreError> {
        let dir = self.layout.envs_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut results = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_str = file_name.to_str().unwrap_or("");
            if file_str.starts_with('.') {
                continue;
            }
            let Some(name) = file_str.strip_suffix(".json") else {
                continue;
            };
            match self.get(name) {
                Ok(env) => results.push(Ok(env)),
                Err(e) => results.push(Err((name.to_owned(), e))),
            }
        }
        Ok(results)
    }
}

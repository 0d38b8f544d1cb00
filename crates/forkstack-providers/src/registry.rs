use crate::doppler::DopplerAdapter;
use crate::local::{LocalDatabaseAdapter, LocalStorageAdapter};
use crate::mock::MockAdapter;
use crate::neon::NeonAdapter;
use crate::s3::{S3Adapter, TigrisAdapter};
use crate::turso::TursoAdapter;
use crate::ProviderAdapter;
use forkstack_schema::{
    DatabaseConfig, ProjectConfig, ResourceKey, ResourceKind, SecretsConfig, StorageConfig,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// The adapters an environment is built from, keyed in provisioning order.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    adapters: BTreeMap<ResourceKey, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One adapter per configured resource. Relative local paths are
    /// resolved against `project_root`.
    pub fn from_config(config: &ProjectConfig, project_root: &Path) -> Self {
        let mut registry = Self::new();

        let database: Arc<dyn ProviderAdapter> = match &config.database {
            DatabaseConfig::Turso(c) => Arc::new(TursoAdapter::new(c.clone())),
            DatabaseConfig::Neon(c) => Arc::new(NeonAdapter::new(c.clone())),
            DatabaseConfig::Local(c) => {
                Arc::new(LocalDatabaseAdapter::new(project_root.join(&c.dir)))
            }
            DatabaseConfig::Mock(c) => {
                Arc::new(MockAdapter::from_config(ResourceKind::Database, c))
            }
        };
        registry.insert(ResourceKey::Database, database);

        for (key, storage) in &config.storage {
            let adapter: Arc<dyn ProviderAdapter> = match storage {
                StorageConfig::S3(c) => Arc::new(S3Adapter::new(c.clone())),
                StorageConfig::Tigris(c) => Arc::new(TigrisAdapter::new(c.clone())),
                StorageConfig::Local(c) => Arc::new(LocalStorageAdapter::new(
                    project_root.join(&c.root),
                    &c.fork_prefix(),
                    c.full_copy_timeout(),
                )),
                StorageConfig::Mock(c) => {
                    Arc::new(MockAdapter::from_config(ResourceKind::Storage, c))
                }
            };
            registry.insert(ResourceKey::storage(key.clone()), adapter);
        }

        if let Some(secrets) = &config.secrets {
            let adapter: Arc<dyn ProviderAdapter> = match secrets {
                SecretsConfig::Doppler(c) => Arc::new(DopplerAdapter::new(c.clone())),
                SecretsConfig::Mock(c) => {
                    Arc::new(MockAdapter::from_config(ResourceKind::Secrets, c))
                }
            };
            registry.insert(ResourceKey::Secrets, adapter);
        }

        tracing::debug!(
            "registry: {}",
            registry
                .iter()
                .map(|(k, a)| format!("{k}={}", a.provider_id()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        registry
    }

    pub fn insert(&mut self, key: ResourceKey, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(key, adapter);
    }

    #[must_use]
    pub fn with_adapter(mut self, key: ResourceKey, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.insert(key, adapter);
        self
    }

    pub fn get(&self, key: &ResourceKey) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(key).cloned()
    }

    /// Adapters in provisioning order: database, storage by key, secrets.
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKey, &Arc<dyn ProviderAdapter>)> {
        self.adapters.iter()
    }

    pub fn keys(&self) -> Vec<ResourceKey> {
        self.adapters.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

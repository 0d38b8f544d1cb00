//! Resource kinds and the keys that address them inside an environment.
//!
//! Keys serialize as plain strings (`database`, `storage:<bucket-key>`,
//! `secrets`) so descriptor files stay readable. The derived ordering is the
//! provisioning order: database, then storage buckets by key, then secrets.

use crate::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Database,
    Storage,
    Secrets,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Database => write!(f, "database"),
            ResourceKind::Storage => write!(f, "storage"),
            ResourceKind::Secrets => write!(f, "secrets"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKey {
    Database,
    Storage(String),
    Secrets,
}

impl ResourceKey {
    pub fn storage(key: impl Into<String>) -> Self {
        ResourceKey::Storage(key.into())
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceKey::Database => ResourceKind::Database,
            ResourceKey::Storage(_) => ResourceKind::Storage,
            ResourceKey::Secrets => ResourceKind::Secrets,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Database => write!(f, "database"),
            ResourceKey::Storage(key) => write!(f, "storage:{key}"),
            ResourceKey::Secrets => write!(f, "secrets"),
        }
    }
}

impl FromStr for ResourceKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "database" => Ok(ResourceKey::Database),
            "secrets" => Ok(ResourceKey::Secrets),
            other => match other.strip_prefix("storage:") {
                Some(key) if !key.is_empty() => Ok(ResourceKey::Storage(key.to_owned())),
                _ => Err(ConfigError::InvalidResourceKey(other.to_owned())),
            },
        }
    }
}

impl Serialize for ResourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

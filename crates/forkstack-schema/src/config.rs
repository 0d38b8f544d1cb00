//! Parsing and validation for `.forkstack.toml`.
//!
//! Every resource kind selects its provider with an internally tagged
//! `provider = "..."` field, so the set of backends is closed and checked at
//! parse time. Provider tables accept only the options their provider knows.

use crate::name::{validate_env_name, DEFAULT_ENV, DEFAULT_SOURCE};
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File names searched for, in order, in each directory while walking up.
pub const CONFIG_FILE_NAMES: &[&str] = &[".forkstack.toml", "forkstack.toml"];

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub project: ProjectSection,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: BTreeMap<String, StorageConfig>,
    #[serde(default)]
    pub secrets: Option<SecretsConfig>,
    #[serde(default)]
    pub timeouts: TimeoutSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    pub name: String,
    #[serde(default = "default_protected")]
    pub protected: Vec<String>,
    #[serde(default = "default_source")]
    pub default_source: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Turso(TursoConfig),
    Neon(NeonConfig),
    Local(LocalDatabaseConfig),
    Mock(MockConfig),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum StorageConfig {
    S3(S3Config),
    Tigris(TigrisConfig),
    Local(LocalStorageConfig),
    Mock(MockConfig),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum SecretsConfig {
    Doppler(DopplerConfig),
    Mock(MockConfig),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TursoConfig {
    pub organization: String,
    /// Database that `prod` forks are seeded from.
    pub production: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct NeonConfig {
    pub project_id: String,
    /// Parent branch name for forks of `prod`.
    pub production: String,
    #[serde(default)]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LocalDatabaseConfig {
    /// Directory holding `<project>-<env>.db` files, relative to the project root.
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub full_copy_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TigrisConfig {
    pub bucket: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LocalStorageConfig {
    /// Storage root, relative to the project root. Production data lives at the
    /// top level; forks live under `<root>/<prefix><env>/`.
    pub root: PathBuf,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub full_copy_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DopplerConfig {
    pub project: String,
    /// Config cloned for forks of `prod` (e.g. `prd`).
    pub production: String,
    #[serde(default)]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct MockConfig {
    #[serde(default)]
    pub fail_on: Option<MockFailure>,
    /// Injected failures are transient instead of permanent.
    #[serde(default)]
    pub transient: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MockFailure {
    Create,
    Locate,
    Delete,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TimeoutSection {
    #[serde(default = "default_call_secs")]
    pub call_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            call_secs: default_call_secs(),
            retry_attempts: default_retry_attempts(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

impl TimeoutSection {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_secs)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}

fn default_protected() -> Vec<String> {
    vec![DEFAULT_ENV.to_owned(), DEFAULT_SOURCE.to_owned()]
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_owned()
}

fn default_call_secs() -> u64 {
    60
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    200
}

impl DatabaseConfig {
    pub fn provider_name(&self) -> &'static str {
        match self {
            DatabaseConfig::Turso(_) => "turso",
            DatabaseConfig::Neon(_) => "neon",
            DatabaseConfig::Local(_) => "local",
            DatabaseConfig::Mock(_) => "mock",
        }
    }
}

impl StorageConfig {
    pub fn provider_name(&self) -> &'static str {
        match self {
            StorageConfig::S3(_) => "s3",
            StorageConfig::Tigris(_) => "tigris",
            StorageConfig::Local(_) => "local",
            StorageConfig::Mock(_) => "mock",
        }
    }
}

impl SecretsConfig {
    pub fn provider_name(&self) -> &'static str {
        match self {
            SecretsConfig::Doppler(_) => "doppler",
            SecretsConfig::Mock(_) => "mock",
        }
    }
}

impl TursoConfig {
    pub fn group(&self) -> &str {
        self.group.as_deref().unwrap_or("default")
    }
}

impl S3Config {
    pub fn fork_prefix(&self) -> String {
        normalize_prefix(self.prefix.as_deref())
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or("us-east-1")
    }

    pub fn endpoint(&self) -> String {
        self.endpoint.as_deref().map_or_else(
            || format!("https://s3.{}.amazonaws.com", self.region()),
            |e| e.trim_end_matches('/').to_owned(),
        )
    }

    pub fn full_copy_timeout(&self) -> Duration {
        Duration::from_secs(self.full_copy_timeout_secs.unwrap_or(300))
    }
}

impl TigrisConfig {
    pub fn endpoint(&self) -> String {
        self.endpoint
            .as_deref()
            .unwrap_or("https://fly.storage.tigris.dev")
            .trim_end_matches('/')
            .to_owned()
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or("auto")
    }
}

impl LocalStorageConfig {
    pub fn fork_prefix(&self) -> String {
        normalize_prefix(self.prefix.as_deref())
    }

    pub fn full_copy_timeout(&self) -> Duration {
        Duration::from_secs(self.full_copy_timeout_secs.unwrap_or(300))
    }
}

fn normalize_prefix(prefix: Option<&str>) -> String {
    let p = prefix.unwrap_or("forks/").trim_start_matches('/');
    if p.is_empty() || p.ends_with('/') {
        p.to_owned()
    } else {
        format!("{p}/")
    }
}

impl ProjectConfig {
    pub fn parse_str(input: &str) -> Result<Self, ConfigError> {
        let config: ProjectConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    /// Walk up from `start` and return the first config file found.
    pub fn discover(start: &Path) -> Result<PathBuf, ConfigError> {
        let mut current = start.to_path_buf();
        loop {
            for name in CONFIG_FILE_NAMES {
                let candidate = current.join(name);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
            if !current.pop() {
                return Err(ConfigError::NotFound(start.to_path_buf()));
            }
        }
    }

    pub fn is_protected(&self, env: &str) -> bool {
        self.project.protected.iter().any(|p| p == env)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_env_name(&self.project.name)
            .map_err(|e| ConfigError::Invalid(format!("project.name: {e}")))?;
        for name in &self.project.protected {
            validate_env_name(name)
                .map_err(|e| ConfigError::Invalid(format!("project.protected: {e}")))?;
        }
        validate_env_name(&self.project.default_source)
            .map_err(|e| ConfigError::Invalid(format!("project.default_source: {e}")))?;

        match &self.database {
            DatabaseConfig::Turso(t) => {
                require("database.organization", &t.organization)?;
                require("database.production", &t.production)?;
            }
            DatabaseConfig::Neon(n) => {
                require("database.project_id", &n.project_id)?;
                require("database.production", &n.production)?;
            }
            DatabaseConfig::Local(l) => {
                require("database.dir", &l.dir.to_string_lossy())?;
            }
            DatabaseConfig::Mock(_) => {}
        }

        for (key, storage) in &self.storage {
            validate_env_name(key)
                .map_err(|e| ConfigError::Invalid(format!("storage key: {e}")))?;
            match storage {
                StorageConfig::S3(s) => require(&format!("storage.{key}.bucket"), &s.bucket)?,
                StorageConfig::Tigris(t) => {
                    require(&format!("storage.{key}.bucket"), &t.bucket)?;
                }
                StorageConfig::Local(l) => {
                    require(&format!("storage.{key}.root"), &l.root.to_string_lossy())?;
                }
                StorageConfig::Mock(_) => {}
            }
        }

        if let Some(SecretsConfig::Doppler(d)) = &self.secrets {
            require("secrets.project", &d.project)?;
            require("secrets.production", &d.production)?;
        }

        if self.timeouts.call_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeouts.call_secs must be greater than zero".to_owned(),
            ));
        }
        if self.timeouts.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "timeouts.retry_attempts must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Starter config printed by `forks init`.
pub fn example_config() -> &'static str {
    r#"[project]
name = "myapp"
protected = ["dev", "prod"]

[database]
provider = "turso"
organization = "my-org"
production = "myapp-prod"
group = "default"  # optional

[storage.uploads]
provider = "tigris"
bucket = "myapp-uploads"

[storage.assets]
provider = "s3"
bucket = "myapp-assets"
region = "us-east-1"
prefix = "forks/"
full_copy_timeout_secs = 300

# [secrets]
# provider = "doppler"
# project = "myapp"
# production = "prd"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[project]
name = "myapp"

[database]
provider = "turso"
organization = "my-org"
production = "my-db"
"#;

    #[test]
    fn parses_minimal_config() {
        let config = ProjectConfig::parse_str(MINIMAL).unwrap();
        assert_eq!(config.project.name, "myapp");
        assert_eq!(config.project.protected, vec!["dev", "prod"]);
        assert_eq!(config.project.default_source, "prod");
        let DatabaseConfig::Turso(turso) = &config.database else {
            panic!("expected turso");
        };
        assert_eq!(turso.organization, "my-org");
        assert_eq!(turso.group(), "default");
        assert!(config.storage.is_empty());
        assert!(config.secrets.is_none());
        assert_eq!(config.timeouts, TimeoutSection::default());
    }

    #[test]
    fn parses_full_config() {
        let input = r#"
[project]
name = "myapp"
protected = ["dev", "prod", "staging"]

[database]
provider = "neon"
project_id = "proj-123"
production = "main"

[storage.uploads]
provider = "tigris"
bucket = "my-uploads"

[storage.assets]
provider = "s3"
bucket = "my-assets"
region = "eu-west-1"
prefix = "dev-forks"

[secrets]
provider = "doppler"
project = "myapp"
production = "prd"

[timeouts]
call_secs = 30
retry_attempts = 5
"#;
        let config = ProjectConfig::parse_str(input).unwrap();
        assert!(config.is_protected("staging"));
        assert_eq!(config.database.provider_name(), "neon");
        assert_eq!(config.storage.len(), 2);
        let StorageConfig::S3(assets) = &config.storage["assets"] else {
            panic!("expected s3");
        };
        assert_eq!(assets.fork_prefix(), "dev-forks/");
        assert_eq!(assets.endpoint(), "https://s3.eu-west-1.amazonaws.com");
        assert_eq!(config.storage["uploads"].provider_name(), "tigris");
        assert_eq!(config.secrets.as_ref().unwrap().provider_name(), "doppler");
        assert_eq!(config.timeouts.call_timeout(), Duration::from_secs(30));
        assert_eq!(config.timeouts.retry_base(), Duration::from_millis(200));
    }

    #[test]
    fn storage_keys_iterate_in_order() {
        let input = r#"
[project]
name = "p"
[database]
provider = "mock"
[storage.zeta]
provider = "mock"
[storage.alpha]
provider = "mock"
"#;
        let config = ProjectConfig::parse_str(input).unwrap();
        let keys: Vec<_> = config.storage.keys().cloned().collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }

    #[test]
    fn mock_failure_injection_parses() {
        let input = r#"
[project]
name = "p"
[database]
provider = "mock"
fail_on = "create"
transient = true
"#;
        let config = ProjectConfig::parse_str(input).unwrap();
        let DatabaseConfig::Mock(mock) = config.database else {
            panic!("expected mock");
        };
        assert_eq!(mock.fail_on, Some(MockFailure::Create));
        assert!(mock.transient);
    }

    #[test]
    fn rejects_unknown_provider() {
        let input = r#"
[project]
name = "p"
[database]
provider = "oracle"
"#;
        assert!(matches!(
            ProjectConfig::parse_str(input),
            Err(ConfigError::ParseToml(_))
        ));
    }

    #[test]
    fn rejects_unknown_top_level_fields() {
        let input = format!("{MINIMAL}\n[cache]\nprovider = \"redis\"\n");
        assert!(ProjectConfig::parse_str(&input).is_err());
    }

    #[test]
    fn rejects_missing_database() {
        let input = "[project]\nname = \"p\"\n";
        assert!(ProjectConfig::parse_str(input).is_err());
    }

    #[test]
    fn rejects_invalid_project_name() {
        let input = MINIMAL.replace("name = \"myapp\"", "name = \"My App\"");
        let err = ProjectConfig::parse_str(&input).unwrap_err();
        assert!(err.to_string().contains("project.name"), "{err}");
    }

    #[test]
    fn rejects_empty_required_fields() {
        let input = MINIMAL.replace("organization = \"my-org\"", "organization = \"\"");
        let err = ProjectConfig::parse_str(&input).unwrap_err();
        assert!(err.to_string().contains("database.organization"), "{err}");
    }

    #[test]
    fn rejects_zero_retry_attempts() {
        let input = format!("{MINIMAL}\n[timeouts]\nretry_attempts = 0\n");
        assert!(ProjectConfig::parse_str(&input).is_err());
    }

    #[test]
    fn prefix_normalization() {
        assert_eq!(normalize_prefix(None), "forks/");
        assert_eq!(normalize_prefix(Some("custom")), "custom/");
        assert_eq!(normalize_prefix(Some("/lead/")), "lead/");
        assert_eq!(normalize_prefix(Some("")), "");
    }

    #[test]
    fn example_config_is_valid() {
        let config = ProjectConfig::parse_str(example_config()).unwrap();
        assert_eq!(config.storage.len(), 2);
    }

    #[test]
    fn discover_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        let mut file = fs::File::create(dir.path().join(".forkstack.toml")).unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let found = ProjectConfig::discover(&nested).unwrap();
        assert_eq!(found, dir.path().join(".forkstack.toml"));
        let config = ProjectConfig::load(&found).unwrap();
        assert_eq!(config.project.name, "myapp");
    }

    #[test]
    fn discover_accepts_undotted_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("forkstack.toml"), MINIMAL).unwrap();
        let found = ProjectConfig::discover(dir.path()).unwrap();
        assert!(found.ends_with("forkstack.toml"));
    }

    #[test]
    fn discover_fails_without_config() {
        let dir = tempfile::tempdir().unwrap();
        let result = ProjectConfig::discover(dir.path());
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}

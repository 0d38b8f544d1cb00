use crate::ConfigError;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

/// Environment the pointer resolves to when nothing else is set.
pub const DEFAULT_ENV: &str = "dev";
/// Environment new forks branch from unless `--from` says otherwise.
pub const DEFAULT_SOURCE: &str = "prod";

const MAX_NAME_LEN: usize = 48;

const ADJECTIVES: &[&str] = &[
    "swift", "bright", "calm", "bold", "keen", "quiet", "brave", "lucky", "sunny", "eager",
];
const NOUNS: &[&str] = &[
    "fork", "branch", "leaf", "wave", "spark", "river", "cedar", "comet", "harbor", "meadow",
];

/// Names are embedded into database names, bucket prefixes, and URLs, so
/// they are restricted to lowercase alphanumerics and inner hyphens.
pub fn validate_env_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidName {
        name: name.to_owned(),
        reason: reason.to_owned(),
    };
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(invalid("must be 1-48 characters"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid("must match [a-z0-9-]"));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("must not start or end with '-'"));
    }
    Ok(())
}

/// Random `adjective-noun-NNN` name for forks created without `--name`.
pub fn generate_env_name() -> String {
    let mut hasher = RandomState::new().build_hasher();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    hasher.write_u128(nanos);
    let hash = hasher.finish();

    let adj = ADJECTIVES[(hash % ADJECTIVES.len() as u64) as usize];
    let noun = NOUNS[((hash >> 8) % NOUNS.len() as u64) as usize];
    let num = (hash >> 16) % 1000;
    format!("{adj}-{noun}-{num}")
}

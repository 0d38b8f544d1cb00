pub mod completions;
pub mod create;
pub mod current;
pub mod delete;
pub mod init;
pub mod list;
pub mod man_pages;
pub mod show;
pub mod switch;

use chrono::{DateTime, Utc};
use forkstack_core::{CoreError, Orchestrator, OrchestratorOptions};
use forkstack_providers::ProviderRegistry;
use forkstack_schema::{ProjectConfig, ResourceKey};
use forkstack_store::{env_override_from_process, FilePointer, ResourceHandle, StateLayout};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;
pub const EXIT_PROTECTED: u8 = 4;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

fn plain_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain_style());
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(plain_style());
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "ready" => Style::new().green().apply_to(status).to_string(),
        "provisioning" => Style::new().yellow().apply_to(status).to_string(),
        "tearing_down" => Style::new().magenta().apply_to(status).to_string(),
        "failed" => Style::new().red().bold().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

/// Prefix core errors so `main` can pick the exit code.
pub fn core_err(e: CoreError) -> String {
    match e {
        CoreError::Protected(_) => format!("protected: {e}"),
        CoreError::OperationInProgress(_) => format!("store lock: {e}"),
        CoreError::Io(_) => format!("store error: {e}"),
        other => other.to_string(),
    }
}

/// The config file to use: `--config` if given, else the nearest one upward.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf, String> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| format!("cannot read current dir: {e}"))?;
    ProjectConfig::discover(&cwd).map_err(|e| format!("config error: {e}"))
}

/// Load the project config and wire an orchestrator over its providers.
/// State lives next to the config file.
pub fn open_orchestrator(explicit: Option<&Path>) -> Result<Orchestrator, String> {
    let path = config_path(explicit)?;
    let config = ProjectConfig::load(&path).map_err(|e| format!("config error: {e}"))?;
    let root = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tracing::debug!("project '{}' at {}", config.project.name, root.display());

    let layout = StateLayout::new(&root);
    let registry = ProviderRegistry::from_config(&config, &root);
    let pointer = FilePointer::new(&layout);
    let orchestrator = Orchestrator::new(
        layout,
        registry,
        Box::new(pointer),
        OrchestratorOptions::from_config(&config),
    )
    .map_err(core_err)?;
    Ok(orchestrator.with_override(env_override_from_process()))
}

pub fn created_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - created_at).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_owned(),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

/// `key  ref` lines for human output, in provisioning order.
pub fn print_resources(resources: &BTreeMap<ResourceKey, ResourceHandle>) {
    for (key, handle) in resources {
        let reference = if handle.external_ref.is_empty() {
            "-"
        } else {
            handle.external_ref.as_str()
        };
        println!("  {:<18} {reference} ({})", key.to_string(), handle.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn json_pretty_serializes_map() {
        let val = serde_json::json!({"name": "alice"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"name\""));
        assert!(result.contains("\"alice\""));
    }

    #[test]
    fn colorize_status_keeps_text() {
        for s in ["ready", "provisioning", "tearing_down", "failed"] {
            assert!(colorize_status(s).contains(s));
        }
        assert_eq!(colorize_status("other"), "other");
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_FAILURE,
            EXIT_CONFIG_ERROR,
            EXIT_STORE_ERROR,
            EXIT_PROTECTED,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn core_errors_get_exit_prefixes() {
        assert!(core_err(CoreError::Protected("prod".to_owned())).starts_with("protected:"));
        assert!(
            core_err(CoreError::OperationInProgress("a".to_owned())).starts_with("store lock:")
        );
        assert!(!core_err(CoreError::EnvNotFound("a".to_owned())).starts_with("config error:"));
    }

    #[test]
    fn created_ago_buckets() {
        let now = Utc::now();
        assert_eq!(created_ago(now, now), "just now");
        assert_eq!(created_ago(now - TimeDelta::minutes(5), now), "5m ago");
        assert_eq!(created_ago(now - TimeDelta::hours(3), now), "3h ago");
        assert_eq!(created_ago(now - TimeDelta::days(2), now), "2d ago");
        assert_eq!(created_ago(now + TimeDelta::minutes(1), now), "just now");
    }

    #[test]
    fn spinner_finishes() {
        let pb = spinner("working");
        spin_ok(&pb, "done");
        assert!(pb.is_finished());
        let pb = spinner("working");
        spin_fail(&pb, "failed");
        assert!(pb.is_finished());
    }

    #[test]
    fn explicit_config_path_wins() {
        let p = Path::new("/tmp/x/.forkstack.toml");
        assert_eq!(config_path(Some(p)).unwrap(), p);
    }
}

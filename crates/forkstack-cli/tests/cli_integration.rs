//! CLI subprocess integration tests.
//!
//! These tests invoke the `forks` binary against a project that uses the
//! local filesystem providers, and verify exit codes, stdout content, and
//! what ends up on disk.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const CONFIG: &str = r#"[project]
name = "shop"

[database]
provider = "local"
dir = "data/db"

[storage.uploads]
provider = "local"
root = "data/uploads"
"#;

struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    /// A project whose production database and uploads already exist.
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".forkstack.toml"), CONFIG).unwrap();
        std::fs::create_dir_all(dir.path().join("data/db")).unwrap();
        std::fs::write(dir.path().join("data/db/shop-prod.db"), b"prod rows").unwrap();
        std::fs::create_dir_all(dir.path().join("data/uploads/avatars")).unwrap();
        std::fs::write(dir.path().join("data/uploads/logo.png"), b"png").unwrap();
        std::fs::write(dir.path().join("data/uploads/avatars/a.png"), b"a").unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn db(&self, env: &str) -> PathBuf {
        self.path().join(format!("data/db/shop-{env}.db"))
    }

    fn fork_dir(&self, env: &str) -> PathBuf {
        self.path().join(format!("data/uploads/forks/{env}"))
    }

    fn forks(&self) -> Command {
        let mut cmd = forks_bin();
        cmd.current_dir(self.path());
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.forks().args(args).output().unwrap()
    }
}

fn forks_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_forks"));
    cmd.env_remove("FORKSTACK_ENV")
        .env_remove("ENV")
        .env_remove("FORKSTACK_LOG");
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout)
        .unwrap_or_else(|e| panic!("invalid JSON ({e}): {}", stdout(output)))
}

#[test]
fn cli_version_exits_zero() {
    let output = forks_bin().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("forks"));
}

#[test]
fn cli_help_lists_commands() {
    let output = forks_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let out = stdout(&output);
    for cmd in ["create", "switch", "delete", "list", "current", "show", "init"] {
        assert!(out.contains(cmd), "help must mention '{cmd}': {out}");
    }
}

#[test]
fn cli_list_empty_project() {
    let project = Project::new();
    let output = project.run(&["list"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("No forks found. Create one with: forks create"));

    let output = project.run(&["list", "--json"]);
    assert!(output.status.success());
    assert_eq!(json(&output), serde_json::json!([]));
}

#[test]
fn cli_current_defaults_to_dev() {
    let project = Project::new();
    let output = project.run(&["current"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "dev");

    let output = project.run(&["current", "--json"]);
    let v = json(&output);
    assert_eq!(v["name"], "dev");
    assert_eq!(v["origin"], "default");
    assert_eq!(v["exists"], true);
}

#[test]
fn cli_create_forks_every_resource_and_activates() {
    let project = Project::new();
    let output = project.run(&["create", "--name", "alice"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Created fork: alice"));

    assert_eq!(std::fs::read(project.db("alice")).unwrap(), b"prod rows");
    assert!(project.fork_dir("alice").join("logo.png").is_file());
    assert!(project.fork_dir("alice").join("avatars/a.png").is_file());

    let output = project.run(&["current"]);
    assert_eq!(stdout(&output).trim(), "alice");

    let output = project.run(&["list", "--json"]);
    let v = json(&output);
    let envs = v.as_array().unwrap();
    assert_eq!(envs.len(), 1);
    assert_eq!(envs[0]["name"], "alice");
    assert_eq!(envs[0]["status"], "ready");
    assert_eq!(envs[0]["active"], true);
}

#[test]
fn cli_create_json_reports_handles() {
    let project = Project::new();
    let output = project.run(&["--json", "create", "--name", "bob"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let v = json(&output);
    assert_eq!(v["name"], "bob");
    assert_eq!(v["source"], "prod");
    let db_ref = v["resources"]["database"]["external_ref"].as_str().unwrap();
    assert!(db_ref.starts_with("file://"), "{db_ref}");
    assert!(db_ref.ends_with("shop-bob.db"), "{db_ref}");
    assert_eq!(v["resources"]["storage:uploads"]["status"], "ready");
}

#[test]
fn cli_create_without_name_generates_one() {
    let project = Project::new();
    let output = project.run(&["--json", "create"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let name = json(&output)["name"].as_str().unwrap().to_owned();
    assert!(!name.is_empty());
    assert!(project.db(&name).is_file());
}

#[test]
fn cli_create_from_fork() {
    let project = Project::new();
    assert!(project.run(&["create", "--name", "alice"]).status.success());
    std::fs::write(project.db("alice"), b"alice rows").unwrap();

    let output = project.run(&["create", "--name", "carol", "--from", "alice"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(std::fs::read(project.db("carol")).unwrap(), b"alice rows");
    assert!(project.fork_dir("carol").join("logo.png").is_file());
}

#[test]
fn cli_create_duplicate_fails() {
    let project = Project::new();
    assert!(project.run(&["create", "--name", "alice"]).status.success());
    let output = project.run(&["create", "--name", "alice"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("already exists"));
}

#[test]
fn cli_create_failure_rolls_back() {
    let project = Project::new();
    std::fs::remove_dir_all(project.path().join("data/uploads")).unwrap();

    let output = project.run(&["create", "--name", "bob"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("failed to create 'bob'"));

    assert!(!project.db("bob").exists(), "database fork must be rolled back");
    let output = project.run(&["list", "--json"]);
    assert_eq!(json(&output), serde_json::json!([]));
    assert_eq!(stdout(&project.run(&["current"])).trim(), "dev");
}

#[test]
fn cli_create_invalid_name_is_config_error() {
    let project = Project::new();
    let output = project.run(&["create", "--name", "Not Valid!"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_protected_names_exit_4() {
    let project = Project::new();
    assert_eq!(project.run(&["create", "--name", "prod"]).status.code(), Some(4));
    assert_eq!(project.run(&["delete", "prod"]).status.code(), Some(4));
    assert_eq!(project.run(&["delete", "dev"]).status.code(), Some(4));
    assert!(project.db("prod").is_file());
}

#[test]
fn cli_switch_round_trip() {
    let project = Project::new();
    assert!(project.run(&["create", "--name", "alice"]).status.success());

    let output = project.run(&["switch", "dev"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&project.run(&["current"])).trim(), "dev");

    let output = project.run(&["--json", "switch", "alice"]);
    assert!(output.status.success());
    let v = json(&output);
    assert_eq!(v["name"], "alice");
    assert_eq!(v["previous"], "dev");
    assert_eq!(v["warnings"], serde_json::json!([]));
    assert_eq!(stdout(&project.run(&["current"])).trim(), "alice");
}

#[test]
fn cli_switch_unknown_leaves_pointer() {
    let project = Project::new();
    assert!(project.run(&["create", "--name", "alice"]).status.success());
    let output = project.run(&["switch", "ghost"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("ghost"));
    assert_eq!(stdout(&project.run(&["current"])).trim(), "alice");
}

#[test]
fn cli_switch_warns_on_missing_resource() {
    let project = Project::new();
    assert!(project.run(&["create", "--name", "alice"]).status.success());
    assert!(project.run(&["switch", "dev"]).status.success());
    std::fs::remove_file(project.db("alice")).unwrap();

    let output = project.run(&["--json", "switch", "alice"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let warnings = json(&output)["warnings"].as_array().unwrap().clone();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().starts_with("database"));
}

#[test]
fn cli_delete_active_resets_to_dev() {
    let project = Project::new();
    assert!(project.run(&["create", "--name", "alice"]).status.success());

    let output = project.run(&["delete", "alice"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Deleted fork: alice"));
    assert!(!project.db("alice").exists());
    assert!(!project.fork_dir("alice").exists());
    assert!(project.db("prod").is_file());
    assert!(project.path().join("data/uploads/logo.png").is_file());

    assert_eq!(stdout(&project.run(&["current"])).trim(), "dev");
    assert!(stdout(&project.run(&["list"])).contains("No forks found"));
}

#[test]
fn cli_delete_is_idempotent() {
    let project = Project::new();
    assert!(project.run(&["create", "--name", "alice"]).status.success());
    assert!(project.run(&["delete", "alice"]).status.success());

    let output = project.run(&["--json", "delete", "alice"]);
    assert!(output.status.success());
    assert_eq!(json(&output)["existed"], false);
}

#[test]
fn cli_show_environment() {
    let project = Project::new();
    assert!(project.run(&["create", "--name", "alice"]).status.success());

    let output = project.run(&["show", "alice"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("alice"));
    assert!(out.contains("storage:uploads"));

    let output = project.run(&["show", "ghost"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn cli_override_env_var_wins() {
    let project = Project::new();
    assert!(project.run(&["create", "--name", "alice"]).status.success());

    let output = project
        .forks()
        .arg("current")
        .env("FORKSTACK_ENV", "production")
        .output()
        .unwrap();
    assert_eq!(stdout(&output).trim(), "prod");

    let output = project
        .forks()
        .arg("current")
        .env("ENV", "dev")
        .output()
        .unwrap();
    assert_eq!(stdout(&output).trim(), "dev");
}

#[test]
fn cli_explicit_config_path() {
    let project = Project::new();
    let elsewhere = tempfile::tempdir().unwrap();
    let config = project.path().join(".forkstack.toml");
    let output = forks_bin()
        .current_dir(elsewhere.path())
        .args(["--config", config.to_str().unwrap(), "create", "--name", "alice"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(project.db("alice").is_file());
}

#[test]
fn cli_missing_config_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let output = forks_bin()
        .args(["--config", dir.path().join("nope.toml").to_str().unwrap(), "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("config error"));
}

#[test]
fn cli_invalid_config_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join(".forkstack.toml");
    std::fs::write(&config, "[project]\nname = \"shop\"\n").unwrap();
    let output = forks_bin()
        .current_dir(dir.path())
        .arg("list")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_init_writes_config_and_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let output = forks_bin().current_dir(dir.path()).arg("init").output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    let written = std::fs::read_to_string(dir.path().join(".forkstack.toml")).unwrap();
    assert!(written.contains("[project]"));

    let output = forks_bin().current_dir(dir.path()).arg("init").output().unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--force"));

    let output = forks_bin()
        .current_dir(dir.path())
        .args(["init", "--force"])
        .output()
        .unwrap();
    assert!(output.status.success());
}

#[test]
fn cli_completions_bash() {
    let output = forks_bin().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("forks"));
}

#[test]
fn cli_man_pages() {
    let dir = tempfile::tempdir().unwrap();
    let output = forks_bin()
        .args(["man-pages", dir.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(dir.path().join("forks.1").is_file());
    assert!(dir.path().join("forks-create.1").is_file());
}

//! Registry-built local adapters driven end to end, the way the
//! orchestrator drives them: create in order, locate, delete in reverse.

use forkstack_providers::{CallContext, ProviderRegistry};
use forkstack_schema::{ProjectConfig, ResourceKey};
use std::path::Path;
use std::time::Duration;

const CONFIG: &str = r#"
[project]
name = "shop"

[database]
provider = "local"
dir = "db"

[storage.media]
provider = "local"
root = "media"
prefix = "branches/"
"#;

fn seed(root: &Path) {
    std::fs::create_dir_all(root.join("db")).unwrap();
    std::fs::write(root.join("db/shop-prod.db"), b"rows").unwrap();
    std::fs::create_dir_all(root.join("media/img")).unwrap();
    std::fs::write(root.join("media/img/cat.jpg"), b"cat").unwrap();
}

fn ctx() -> CallContext {
    CallContext::new("shop", Duration::from_secs(10))
}

#[test]
fn fork_locate_delete_through_registry() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let config = ProjectConfig::parse_str(CONFIG).unwrap();
    let registry = ProviderRegistry::from_config(&config, dir.path());
    assert_eq!(
        registry.keys(),
        vec![ResourceKey::Database, ResourceKey::storage("media")]
    );

    let mut created = Vec::new();
    for (key, adapter) in registry.iter() {
        let handle = adapter.create(&ctx(), "alice", "prod").unwrap();
        assert_eq!(handle.kind, key.kind());
        created.push((key.clone(), handle));
    }
    assert!(dir.path().join("db/shop-alice.db").is_file());
    assert!(dir.path().join("media/branches/alice/img/cat.jpg").is_file());

    for (key, handle) in &created {
        let adapter = registry.get(key).unwrap();
        let found = adapter.locate(&ctx(), "alice").unwrap();
        assert_eq!(found.external_ref, handle.external_ref);
    }

    for (key, _) in created.iter().rev() {
        registry.get(key).unwrap().delete(&ctx(), "alice").unwrap();
    }
    assert!(!dir.path().join("db/shop-alice.db").exists());
    assert!(!dir.path().join("media/branches/alice").exists());
    assert!(dir.path().join("media/img/cat.jpg").is_file());

    for (key, _) in registry.iter() {
        let err = registry
            .get(key)
            .unwrap()
            .locate(&ctx(), "alice")
            .unwrap_err();
        assert!(err.is_not_found(), "{key}: {err}");
    }
}

#[test]
fn forks_of_production_do_not_copy_other_forks() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let config = ProjectConfig::parse_str(CONFIG).unwrap();
    let registry = ProviderRegistry::from_config(&config, dir.path());
    let storage = registry.get(&ResourceKey::storage("media")).unwrap();

    storage.create(&ctx(), "alice", "prod").unwrap();
    std::fs::write(dir.path().join("media/branches/alice/only-alice.txt"), b"a").unwrap();
    storage.create(&ctx(), "bob", "prod").unwrap();

    let bob = dir.path().join("media/branches/bob");
    assert!(bob.join("img/cat.jpg").is_file());
    assert!(!bob.join("branches").exists());
    assert!(!bob.join("only-alice.txt").exists());

    storage.create(&ctx(), "carol", "alice").unwrap();
    assert!(dir
        .path()
        .join("media/branches/carol/only-alice.txt")
        .is_file());
}

#[test]
fn missing_production_database_is_permanent() {
    let dir = tempfile::tempdir().unwrap();
    let config = ProjectConfig::parse_str(CONFIG).unwrap();
    let registry = ProviderRegistry::from_config(&config, dir.path());
    let db = registry.get(&ResourceKey::Database).unwrap();
    let err = db.create(&ctx(), "alice", "prod").unwrap_err();
    assert!(!err.is_transient());
    assert!(!err.is_not_found());
}

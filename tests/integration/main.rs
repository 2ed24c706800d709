//! Integration tests for depgraph
//!
//! These tests verify that the crates work together and that the CLI binary
//! behaves at its edges.

use depgraph_cache::{expire_if_stale, CacheStore, DependencyCache, FileStore, DEFAULT_MAX_AGE};
use depgraph_core::{DiscoveryConfig, PackageManifest, PackageName};
use depgraph_discovery::{CancelToken, DiscoveryEngine, DiscoveryRequest};
use depgraph_registry::MockRegistry;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

fn depgraph() -> Command {
    Command::new(env!("CARGO_BIN_EXE_depgraph"))
}

fn cookies_registry() -> Arc<MockRegistry> {
    Arc::new(
        MockRegistry::new()
            .with_package("cookies", &["depd", "keygrip"])
            .with_package("keygrip", &["tsscmp"])
            .with_package("depd", &[])
            .with_package("tsscmp", &[]),
    )
}

/// Test that the CLI can be invoked
#[test]
fn test_cli_invocation() {
    let output = depgraph().arg("--help").output().expect("Failed to execute depgraph");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("depgraph"));
    assert!(stdout.contains("graph"));
    assert!(stdout.contains("manifest"));
}

#[test]
fn test_serve_help_describes_open_flag() {
    let output = depgraph().args(["serve", "--help"]).output().expect("Failed to execute depgraph");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("--open"));
    assert!(stdout.contains("health endpoint"), "help was: {stdout}");
}

#[test]
fn test_version_command() {
    let output = depgraph().arg("version").output().expect("Failed to execute depgraph");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("depgraph v{}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_manifest_command_rejects_bad_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("package.json");
    std::fs::write(&path, r#"{"name": "my-app"}"#).unwrap();

    let output = depgraph()
        .current_dir(dir.path())
        .args(["--no-cache", "manifest"])
        .arg(&path)
        .output()
        .expect("Failed to execute depgraph");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("dependencies"), "stderr was: {stderr}");
}

#[test]
fn test_cache_commands_on_empty_dir() {
    let dir = TempDir::new().unwrap();

    let output = depgraph()
        .current_dir(dir.path())
        .args(["cache", "stats"])
        .output()
        .expect("Failed to execute depgraph");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("entries:       0"));

    let output = depgraph()
        .current_dir(dir.path())
        .args(["cache", "clear"])
        .output()
        .expect("Failed to execute depgraph");
    assert!(String::from_utf8_lossy(&output.stdout).contains("Removed 0"));
}

/// A persisted cache serves a later process without touching the registry
#[tokio::test]
async fn test_persistent_cache_across_engines() {
    let dir = TempDir::new().unwrap();

    let registry = cookies_registry();
    let cache = Arc::new(DependencyCache::new(FileStore::open(dir.path(), None).unwrap()));
    let engine = DiscoveryEngine::new(registry.clone(), cache, DiscoveryConfig::default());
    let first = tokio_test::assert_ok!(engine.discover_from_registry("cookies", |_| {}).await);
    assert_eq!(registry.total_fetches(), 4);
    drop(engine);

    let registry = cookies_registry();
    let cache = Arc::new(DependencyCache::new(FileStore::open(dir.path(), None).unwrap()));
    let engine = DiscoveryEngine::new(registry.clone(), cache, DiscoveryConfig::default());
    let second = tokio_test::assert_ok!(engine.discover_from_registry("cookies", |_| {}).await);

    assert_eq!(registry.total_fetches(), 0);
    assert_eq!(second.cache_hits, 4);
    assert_eq!(first.graph.export(), second.graph.export());
}

#[tokio::test]
async fn test_stale_cache_is_expired_at_startup() {
    let dir = TempDir::new().unwrap();
    {
        let cache = DependencyCache::new(FileStore::open(dir.path(), None).unwrap());
        cache.put(&PackageName::new("cookies").unwrap(), &[]);
    }

    let cache = DependencyCache::new(FileStore::open(dir.path(), None).unwrap());
    let written = cache.last_accessed().unwrap();
    let two_days_later = written + chrono::TimeDelta::hours(48);
    assert_eq!(expire_if_stale(&cache, DEFAULT_MAX_AGE, two_days_later), Some(1));

    let reopened = DependencyCache::new(FileStore::open(dir.path(), None).unwrap());
    assert_eq!(reopened.stats().entries, 0);
}

#[tokio::test]
async fn test_manifest_traversal() {
    let manifest = PackageManifest::parse(
        r#"{"name": "my-app", "version": "1.0.0", "dependencies": {"cookies": "^0.9.0", "internal-lib": "1.0.0"}}"#,
    )
    .unwrap();
    let registry = cookies_registry();
    let engine = DiscoveryEngine::new(
        registry.clone(),
        Arc::new(DependencyCache::new(depgraph_cache::MemoryStore::new())),
        DiscoveryConfig::default(),
    );

    let report = engine
        .discover(DiscoveryRequest::from_manifest(&manifest), |_| {}, &CancelToken::new())
        .await
        .unwrap();

    let graph = report.graph.export();
    assert_eq!(graph.root_node_id, "my-app");
    assert_eq!(graph.nodes.len(), 6);
    assert!(graph.has_edge("my-app", "cookies"));
    assert!(graph.has_edge("my-app", "internal-lib"));
    assert!(graph.has_edge("keygrip", "tsscmp"));
    assert_eq!(registry.exists_count(), 0);
}

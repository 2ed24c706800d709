//! CLI command implementations

use anyhow::Context;
use depgraph_cache::{expire_if_stale, CacheStore, DependencyCache, FileStore, MemoryStore};
use depgraph_core::{CacheConfig, DepgraphConfig, GraphJson, PackageManifest, ServerConfig};
use depgraph_discovery::{CancelToken, DiscoveryEngine, DiscoveryReport, DiscoveryRequest, Progress};
use depgraph_registry::HttpRegistry;
use depgraph_server::DepgraphServer;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Open the on-disk cache (or an in-memory one) and drop it if stale.
pub fn open_cache(config: &CacheConfig, no_cache: bool) -> anyhow::Result<Arc<dyn CacheStore>> {
    if no_cache || !config.enabled {
        tracing::debug!("Using in-memory cache");
        return Ok(Arc::new(DependencyCache::new(MemoryStore::new())));
    }

    let store = FileStore::open(&config.dir, config.capacity_bytes)
        .with_context(|| format!("cannot open cache in {}", config.dir.display()))?;
    let cache = DependencyCache::new(store);

    let max_age = Duration::from_secs(config.max_age_hours.saturating_mul(3600));
    if let Some(removed) = expire_if_stale(&cache, max_age, chrono::Utc::now()) {
        tracing::info!("Expired {} stale cache entries", removed);
    }
    Ok(Arc::new(cache))
}

pub fn build_engine(
    config: &DepgraphConfig,
    cache: Arc<dyn CacheStore>,
) -> anyhow::Result<DiscoveryEngine> {
    let registry = HttpRegistry::new(&config.registry)?;
    Ok(DiscoveryEngine::new(
        Arc::new(registry),
        cache,
        config.discovery.clone(),
    ))
}

fn log_progress(progress: Progress) {
    tracing::debug!(
        "{} in flight, {} discovered (last: {})",
        progress.in_flight,
        progress.discovered,
        progress.package
    );
}

fn write_graph(report: &DiscoveryReport, output: Option<&Path>) -> anyhow::Result<()> {
    for branch in &report.anomalies {
        tracing::warn!("{} treated as dependency-free: {}", branch.package, branch.anomaly);
    }

    let graph: GraphJson = report.graph.export();
    let json = serde_json::to_string_pretty(&graph)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("cannot write {}", path.display()))?;
            tracing::info!("Graph written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub async fn graph(engine: &DiscoveryEngine, name: &str, output: Option<&Path>) -> anyhow::Result<()> {
    tracing::info!("Resolving dependencies of {}", name);
    let report = engine.discover_from_registry(name, log_progress).await?;
    write_graph(&report, output)
}

pub async fn manifest(engine: &DiscoveryEngine, path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let manifest = PackageManifest::from_path(path)
        .with_context(|| format!("cannot use manifest {}", path.display()))?;
    tracing::info!(
        "Resolving {} dependencies of {}",
        manifest.dependencies.len(),
        manifest.name
    );

    let request = DiscoveryRequest::from_manifest(&manifest);
    let report = engine
        .discover(request, log_progress, &CancelToken::new())
        .await?;
    write_graph(&report, output)
}

pub async fn serve(engine: DiscoveryEngine, config: ServerConfig, open: bool) -> anyhow::Result<()> {
    tracing::info!("Starting depgraph server on {}:{}", config.host, config.port);

    let server = DepgraphServer::new(engine, config);
    let listener = server.bind().await?;

    // JSON health probe; the server has no UI
    if open {
        let url = format!("http://{}/api/health", listener.local_addr()?);
        if let Err(e) = open::that(&url) {
            tracing::warn!("Could not open browser at {}: {}", url, e);
        }
    }

    server.serve(listener).await
}

pub fn cache_stats(cache: &dyn CacheStore) -> anyhow::Result<()> {
    let stats = cache.stats();
    let last = cache
        .last_accessed()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    println!("entries:       {}", stats.entries);
    println!("size:          {:.1} KB", stats.size_kb);
    println!("last accessed: {}", last);
    Ok(())
}

pub fn cache_clear(cache: &dyn CacheStore) {
    let removed = cache.clear();
    println!("Removed {} cached entries", removed);
}

//! Traversal engine

use crate::cancel::CancelToken;
use crate::context::TraversalContext;
use crate::error::DiscoveryError;
use crate::progress::Progress;
use depgraph_cache::CacheStore;
use depgraph_core::{DependencyGraph, DiscoveryConfig, PackageManifest, PackageName};
use depgraph_registry::{FetchAnomaly, RegistryClient};
use futures_util::future::{join_all, BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// What to traverse
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryRequest {
    /// Start from a published package. Fails with `NotFound` if the registry
    /// does not know it.
    Registry { root: String },
    /// Start from a manifest's dependency names. The root itself is never
    /// looked up, and seeds missing from the registry are tolerated.
    SeedList { root: String, seeds: Vec<String> },
}

impl DiscoveryRequest {
    pub fn from_manifest(manifest: &PackageManifest) -> Self {
        DiscoveryRequest::SeedList {
            root: manifest.name.to_string(),
            seeds: manifest
                .dependency_names()
                .into_iter()
                .map(PackageName::into_string)
                .collect(),
        }
    }
}

/// A package whose dependencies could not be fetched and were treated as
/// empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchAnomaly {
    pub package: PackageName,
    pub anomaly: FetchAnomaly,
}

#[derive(Debug)]
pub struct DiscoveryReport {
    pub graph: DependencyGraph,
    pub anomalies: Vec<BranchAnomaly>,
    /// Registry fetches issued
    pub fetched: usize,
    /// Packages answered from the cache
    pub cache_hits: usize,
}

/// Drives traversals against a registry through a shared cache. One engine
/// may run many traversals at once; registry requests across all of them
/// are bounded by `max_concurrent_requests`.
pub struct DiscoveryEngine {
    registry: Arc<dyn RegistryClient>,
    cache: Arc<dyn CacheStore>,
    permits: Semaphore,
}

impl DiscoveryEngine {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        cache: Arc<dyn CacheStore>,
        config: DiscoveryConfig,
    ) -> Self {
        DiscoveryEngine {
            registry,
            cache,
            permits: Semaphore::new(config.max_concurrent_requests.max(1)),
        }
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub async fn discover_from_registry<F>(
        &self,
        root: &str,
        on_progress: F,
    ) -> Result<DiscoveryReport, DiscoveryError>
    where
        F: Fn(Progress) + Send + Sync,
    {
        let request = DiscoveryRequest::Registry {
            root: root.to_string(),
        };
        self.discover(request, on_progress, &CancelToken::new()).await
    }

    pub async fn discover_from_seed_list<F>(
        &self,
        root: &str,
        seeds: Vec<String>,
        on_progress: F,
    ) -> Result<DiscoveryReport, DiscoveryError>
    where
        F: Fn(Progress) + Send + Sync,
    {
        let request = DiscoveryRequest::SeedList {
            root: root.to_string(),
            seeds,
        };
        self.discover(request, on_progress, &CancelToken::new()).await
    }

    /// Run a traversal to completion, or until `cancel` fires.
    pub async fn discover<F>(
        &self,
        request: DiscoveryRequest,
        on_progress: F,
        cancel: &CancelToken,
    ) -> Result<DiscoveryReport, DiscoveryError>
    where
        F: Fn(Progress) + Send + Sync,
    {
        let started = Instant::now();

        let ctx = match request {
            DiscoveryRequest::Registry { root } => {
                let root = PackageName::new(root)?;
                if cancel.is_cancelled() {
                    return Err(DiscoveryError::Cancelled);
                }
                if !self.registry.package_exists(&root).await {
                    tracing::info!("Package {} not found on {}", root, self.registry.name());
                    return Err(DiscoveryError::NotFound(root));
                }

                let ctx = TraversalContext::new(root.clone(), &on_progress, cancel.clone());
                self.expand(&ctx, root).await;
                ctx
            }
            DiscoveryRequest::SeedList { root, seeds } => {
                let root = PackageName::new(root)?;
                let seeds: Vec<PackageName> = seeds
                    .into_iter()
                    .filter_map(|seed| match PackageName::new(&seed) {
                        Ok(seed) => Some(seed),
                        Err(e) => {
                            tracing::warn!("Skipping seed dependency: {}", e);
                            None
                        }
                    })
                    .collect();

                let ctx = TraversalContext::new(root.clone(), &on_progress, cancel.clone());
                // The manifest defines the root's dependencies
                ctx.mark_visited(&root);
                for seed in &seeds {
                    ctx.link(&root, seed);
                }
                let children = seeds
                    .into_iter()
                    .map(|seed| self.expand_child(&ctx, &root, seed));
                join_all(children).await;
                ctx
            }
        };
        self.flush_cache().await;

        if cancel.is_cancelled() {
            tracing::debug!("Traversal abandoned after {:?}", started.elapsed());
            return Err(DiscoveryError::Cancelled);
        }

        ctx.report_final();
        let report = ctx.into_report();
        tracing::info!(
            "Discovered {} packages, {} edges from {} in {:?} ({} fetched, {} cached, {} anomalies)",
            report.graph.node_count(),
            report.graph.edge_count(),
            report.graph.root(),
            started.elapsed(),
            report.fetched,
            report.cache_hits,
            report.anomalies.len()
        );
        Ok(report)
    }

    /// Persist the traversal's cache writes off the async workers.
    async fn flush_cache(&self) {
        let cache = Arc::clone(&self.cache);
        if let Err(e) = tokio::task::spawn_blocking(move || cache.flush()).await {
            tracing::warn!("Cache flush task failed: {}", e);
        }
    }

    fn expand<'a>(&'a self, ctx: &'a TraversalContext<'a>, name: PackageName) -> BoxFuture<'a, ()> {
        async move {
            if ctx.is_cancelled() || !ctx.mark_visited(&name) {
                return;
            }

            let Some(dependencies) = self.resolve(ctx, &name).await else {
                return;
            };

            let children = dependencies
                .into_iter()
                .map(|dep| self.expand_child(ctx, &name, dep));
            join_all(children).await;
        }
        .boxed()
    }

    async fn expand_child(&self, ctx: &TraversalContext<'_>, parent: &PackageName, dep: PackageName) {
        ctx.begin(&dep);
        self.expand(ctx, dep.clone()).await;
        ctx.complete(parent, dep);
    }

    /// Cache-aside lookup. `None` means the traversal was cancelled and the
    /// result must be dropped.
    async fn resolve(&self, ctx: &TraversalContext<'_>, name: &PackageName) -> Option<Vec<PackageName>> {
        if let Some(dependencies) = self.cache.get(name) {
            tracing::debug!("Cache hit for {} ({} deps)", name, dependencies.len());
            ctx.record_cache_hit();
            return Some(dependencies);
        }

        let result = {
            let _permit = match self.permits.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::warn!("Request limiter closed: {}", e);
                    return None;
                }
            };
            if ctx.is_cancelled() {
                return None;
            }
            ctx.record_fetch();
            tracing::debug!("Fetching {}", name);
            self.registry.fetch_dependencies(name).await
        };

        if ctx.is_cancelled() {
            tracing::debug!("Discarding late result for {}", name);
            return None;
        }

        match result {
            Ok(dependencies) => {
                self.cache.put(name, &dependencies);
                Some(dependencies)
            }
            Err(anomaly) => {
                tracing::debug!("No dependencies for {}: {}", name, anomaly);
                if !anomaly.is_transient() {
                    self.cache.put(name, &[]);
                }
                ctx.record_anomaly(name.clone(), anomaly);
                Some(Vec::new())
            }
        }
    }
}

impl std::fmt::Debug for DiscoveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryEngine")
            .field("registry", &self.registry.name())
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

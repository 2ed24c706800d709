//! In-memory registry for tests

use crate::client::{FetchAnomaly, RegistryClient};
use dashmap::DashMap;
use depgraph_core::PackageName;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Fixture {
    Dependencies(Vec<String>),
    Anomaly(FetchAnomaly),
}

/// Registry double with per-package fixtures and call counters. Packages
/// without a fixture behave like a registry 404.
#[derive(Debug, Default)]
pub struct MockRegistry {
    fixtures: DashMap<String, Fixture>,
    fetch_calls: DashMap<String, usize>,
    exists_calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` with the given dependency names.
    pub fn with_package(self, name: &str, dependencies: &[&str]) -> Self {
        self.fixtures.insert(
            name.to_string(),
            Fixture::Dependencies(dependencies.iter().map(|d| d.to_string()).collect()),
        );
        self
    }

    /// Make fetches for `name` fail with `anomaly`. The package still counts
    /// as existing unless the anomaly is a 404.
    pub fn with_anomaly(self, name: &str, anomaly: FetchAnomaly) -> Self {
        self.fixtures.insert(name.to_string(), Fixture::Anomaly(anomaly));
        self
    }

    /// Sleep before answering each fetch, to force request interleaving.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `fetch_dependencies` calls made for `name`.
    pub fn fetch_count(&self, name: &str) -> usize {
        self.fetch_calls.get(name).map(|c| *c.value()).unwrap_or(0)
    }

    /// Total `fetch_dependencies` calls across all names.
    pub fn total_fetches(&self) -> usize {
        self.fetch_calls.iter().map(|c| *c.value()).sum()
    }

    pub fn exists_count(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RegistryClient for MockRegistry {
    async fn package_exists(&self, name: &PackageName) -> bool {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        match self.fixtures.get(name.as_str()).map(|f| f.value().clone()) {
            Some(Fixture::Dependencies(_)) => true,
            Some(Fixture::Anomaly(FetchAnomaly::Status(404))) => false,
            Some(Fixture::Anomaly(FetchAnomaly::Transport(_))) => false,
            Some(Fixture::Anomaly(_)) => true,
            None => false,
        }
    }

    async fn fetch_dependencies(
        &self,
        name: &PackageName,
    ) -> Result<Vec<PackageName>, FetchAnomaly> {
        *self.fetch_calls.entry(name.to_string()).or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        // Clone out of the map so no shard lock is held by the caller
        let fixture = self.fixtures.get(name.as_str()).map(|f| f.value().clone());
        match fixture {
            Some(Fixture::Dependencies(deps)) => Ok(deps
                .iter()
                .filter_map(|d| PackageName::new(d).ok())
                .collect()),
            Some(Fixture::Anomaly(anomaly)) => Err(anomaly),
            None => Err(FetchAnomaly::Status(404)),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

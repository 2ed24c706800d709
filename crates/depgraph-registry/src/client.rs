//! Registry client trait and fetch anomalies

use depgraph_core::PackageName;
use thiserror::Error;

/// Why a dependency fetch produced no usable list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchAnomaly {
    /// The registry answered with a non-success status.
    #[error("registry returned status {0}")]
    Status(u16),
    /// The request never completed (connect error, timeout, broken body).
    #[error("request failed: {0}")]
    Transport(String),
    /// The body was not a registry document.
    #[error("malformed registry document: {0}")]
    Malformed(String),
    /// No `dist-tags.latest` or no `versions` map. Internal and unpublished
    /// packages look like this.
    #[error("package has no published versions")]
    Unpublished,
    /// `dist-tags.latest` points at a version missing from `versions`.
    #[error("latest version {0} is not listed in versions")]
    MissingVersion(String),
}

impl FetchAnomaly {
    /// Transient anomalies may succeed on a later attempt and must not be
    /// remembered as "zero dependencies".
    pub fn is_transient(&self) -> bool {
        match self {
            FetchAnomaly::Status(404) => false,
            FetchAnomaly::Status(_) | FetchAnomaly::Transport(_) => true,
            FetchAnomaly::Malformed(_)
            | FetchAnomaly::Unpublished
            | FetchAnomaly::MissingVersion(_) => false,
        }
    }
}

/// Package registry backend.
#[async_trait::async_trait]
pub trait RegistryClient: Send + Sync {
    /// True only on an explicit "found" response. Transport failures degrade
    /// to `false`; this never errors.
    async fn package_exists(&self, name: &PackageName) -> bool;

    /// Dependency names declared by the latest version of `name`.
    /// `Ok(vec![])` means the package is confirmed to have no dependencies.
    async fn fetch_dependencies(&self, name: &PackageName)
        -> Result<Vec<PackageName>, FetchAnomaly>;

    /// Best-effort variant of `fetch_dependencies`: any anomaly becomes an
    /// empty list.
    async fn fetch_dependency_names(&self, name: &PackageName) -> Vec<PackageName> {
        match self.fetch_dependencies(name).await {
            Ok(dependencies) => dependencies,
            Err(anomaly) => {
                tracing::debug!("Treating {} as dependency-free: {}", name, anomaly);
                Vec::new()
            }
        }
    }

    /// Get provider name
    fn name(&self) -> &str;
}

//! Traversal-level failures

use depgraph_core::{InvalidPackageName, PackageName};
use thiserror::Error;

/// Failures that abort a whole traversal. Per-package fetch problems never
/// show up here; they are reported as `BranchAnomaly` values instead.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("package {0} not found in the registry")]
    NotFound(PackageName),
    #[error(transparent)]
    InvalidName(#[from] InvalidPackageName),
    #[error("traversal cancelled")]
    Cancelled,
}

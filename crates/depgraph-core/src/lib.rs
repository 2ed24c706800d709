//! depgraph core — package names, the dependency graph, its render-ready export,
//! manifest input and runtime configuration

pub mod model;
pub mod graph;
pub mod export;
pub mod manifest;
pub mod config;


pub use model::{PackageName, DependencyEdge, InvalidPackageName};
pub use graph::{DependencyGraph, GraphError};
pub use export::{GraphJson, ExportNode, ExportEdge};
pub use manifest::{PackageManifest, ManifestError};
pub use config::{DepgraphConfig, RegistryConfig, CacheConfig, DiscoveryConfig, ServerConfig, ConfigError, CACHE_DIR, CONFIG_FILE};

//! Concurrent dependency discovery
//!
//! Expands a package's transitive dependencies through the registry (via the
//! cache), fanning out across siblings while fetching each package at most
//! once per traversal.

pub mod engine;
pub mod error;
pub mod progress;
pub mod cancel;
mod context;


pub use engine::{DiscoveryEngine, DiscoveryRequest, DiscoveryReport, BranchAnomaly};
pub use error::DiscoveryError;
pub use progress::Progress;
pub use cancel::CancelToken;

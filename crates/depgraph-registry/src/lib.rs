//! Registry client for depgraph
//!
//! Two calls against the package registry: an existence probe and a
//! dependency-list fetch. The fetch is typed (`FetchAnomaly`) so degraded
//! results can be told apart in logs and tests, and collapsed to an empty
//! list at the `fetch_dependency_names` boundary.

pub mod client;
pub mod schema;
pub mod http;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

#[cfg(test)]
mod tests;

pub use client::{RegistryClient, FetchAnomaly};
pub use http::{HttpRegistry, HttpRegistryError};
pub use schema::Packument;

#[cfg(any(test, feature = "test-support"))]
pub use mock::MockRegistry;

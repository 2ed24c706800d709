//! Progress snapshots

use depgraph_core::PackageName;

/// Snapshot taken each time a dependency finishes expanding. Snapshots from
/// parallel branches may arrive out of order, so treat each as "latest".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Expansions started but not yet finished
    pub in_flight: usize,
    /// Distinct dependencies discovered so far
    pub discovered: usize,
    /// Package whose dependency just completed
    pub package: PackageName,
}

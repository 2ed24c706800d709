//! Per-traversal state

use crate::cancel::CancelToken;
use crate::engine::{BranchAnomaly, DiscoveryReport};
use crate::progress::Progress;
use depgraph_core::{DependencyGraph, PackageName};
use depgraph_registry::FetchAnomaly;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

pub(crate) type ProgressFn<'a> = dyn Fn(Progress) + Send + Sync + 'a;

struct State {
    graph: DependencyGraph,
    visited: HashSet<PackageName>,
    in_flight: Vec<PackageName>,
    discovered: HashSet<PackageName>,
    anomalies: Vec<BranchAnomaly>,
    fetched: usize,
    cache_hits: usize,
}

/// Everything one traversal mutates. Created per top-level call and never
/// shared between calls. The lock is only taken for synchronous sections.
pub(crate) struct TraversalContext<'p> {
    state: Mutex<State>,
    on_progress: &'p ProgressFn<'p>,
    cancel: CancelToken,
}

impl<'p> TraversalContext<'p> {
    pub(crate) fn new(root: PackageName, on_progress: &'p ProgressFn<'p>, cancel: CancelToken) -> Self {
        TraversalContext {
            state: Mutex::new(State {
                graph: DependencyGraph::new(root),
                visited: HashSet::new(),
                in_flight: Vec::new(),
                discovered: HashSet::new(),
                anomalies: Vec::new(),
                fetched: 0,
                cache_hits: 0,
            }),
            on_progress,
            cancel,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Check-and-mark in one step. Returns false if `name` was already
    /// visited, in which case the caller must not expand it.
    pub(crate) fn mark_visited(&self, name: &PackageName) -> bool {
        self.lock().visited.insert(name.clone())
    }

    pub(crate) fn record_fetch(&self) {
        self.lock().fetched += 1;
    }

    pub(crate) fn record_cache_hit(&self) {
        self.lock().cache_hits += 1;
    }

    pub(crate) fn record_anomaly(&self, package: PackageName, anomaly: FetchAnomaly) {
        self.lock().anomalies.push(BranchAnomaly { package, anomaly });
    }

    /// Add `from -> to` without counting `to` as in flight.
    pub(crate) fn link(&self, from: &PackageName, to: &PackageName) {
        let mut state = self.lock();
        state.graph.add_node(to.clone());
        if let Err(e) = state.graph.add_edge(from, to) {
            tracing::warn!("Skipping edge: {}", e);
        }
    }

    pub(crate) fn begin(&self, dep: &PackageName) {
        self.lock().in_flight.push(dep.clone());
    }

    /// Record that `dep` (a dependency of `parent`) finished expanding and
    /// report progress. A cancelled traversal leaves the graph untouched.
    pub(crate) fn complete(&self, parent: &PackageName, dep: PackageName) {
        let progress = {
            let mut state = self.lock();
            if let Some(pos) = state.in_flight.iter().position(|n| *n == dep) {
                state.in_flight.swap_remove(pos);
            }
            if self.cancel.is_cancelled() {
                return;
            }

            // Children finish before their parent, so both ends may be new
            state.graph.add_node(parent.clone());
            state.graph.add_node(dep.clone());
            if let Err(e) = state.graph.add_edge(parent, &dep) {
                tracing::warn!("Skipping edge: {}", e);
            }
            state.discovered.insert(dep);

            Progress {
                in_flight: state.in_flight.len(),
                discovered: state.discovered.len(),
                package: parent.clone(),
            }
        };
        (self.on_progress)(progress);
    }

    /// Terminal progress call, made once the whole traversal settled.
    pub(crate) fn report_final(&self) {
        let progress = {
            let state = self.lock();
            Progress {
                in_flight: state.in_flight.len(),
                discovered: state.discovered.len(),
                package: state.graph.root().clone(),
            }
        };
        (self.on_progress)(progress);
    }

    pub(crate) fn into_report(self) -> DiscoveryReport {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        DiscoveryReport {
            graph: state.graph,
            anomalies: state.anomalies,
            fetched: state.fetched,
            cache_hits: state.cache_hits,
        }
    }
}

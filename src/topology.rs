//! # Topology Snapshot
//!
//! A [`TopologySnapshot`] is the immutable, role-partitioned view of the nodes that
//! answered the last round, each bucket sorted by that round's latency (fastest first).
//! Snapshots are built by a [`TopologyBuilder`] while probes complete and are never
//! modified once built; the cluster replaces them wholesale.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::node::Node;

/// Published view of the healthy members.
pub struct TopologySnapshot<C> {
    primaries: Vec<Arc<Node<C>>>,
    replicas: Vec<Arc<Node<C>>>,
    generation: u64,
    refreshed_at: Option<Instant>,
}

impl<C> TopologySnapshot<C> {
    /// The snapshot visible before the first round completes.
    pub fn empty() -> Self {
        Self {
            primaries: Vec::new(),
            replicas: Vec::new(),
            generation: 0,
            refreshed_at: None,
        }
    }

    /// Alive members reporting the primary role, fastest first.
    pub fn primaries(&self) -> &[Arc<Node<C>>] {
        &self.primaries
    }

    /// Alive members reporting the replica role, fastest first.
    pub fn replicas(&self) -> &[Arc<Node<C>>] {
        &self.replicas
    }

    /// Sequence number of the round that produced this snapshot, 0 before any round.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn refreshed_at(&self) -> Option<Instant> {
        self.refreshed_at
    }

    pub fn primary(&self) -> Option<&Arc<Node<C>>> {
        self.primaries.first()
    }

    /// Primary if any, else the fastest replica.
    pub fn primary_preferred(&self) -> Option<&Arc<Node<C>>> {
        self.primaries.first().or_else(|| self.replicas.first())
    }

    pub fn alive_count(&self) -> usize {
        self.primaries.len() + self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alive_count() == 0
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }
}

impl<C> Clone for TopologySnapshot<C> {
    fn clone(&self) -> Self {
        Self {
            primaries: self.primaries.clone(),
            replicas: self.replicas.clone(),
            generation: self.generation,
            refreshed_at: self.refreshed_at,
        }
    }
}

impl<C> Default for TopologySnapshot<C> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<C> fmt::Debug for TopologySnapshot<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let endpoints = |nodes: &[Arc<Node<C>>]| {
            nodes.iter().map(|n| n.endpoint().to_string()).collect::<Vec<_>>()
        };
        f.debug_struct("TopologySnapshot")
            .field("generation", &self.generation)
            .field("primaries", &endpoints(&self.primaries))
            .field("replicas", &endpoints(&self.replicas))
            .finish()
    }
}

/// Accumulates the successful probes of one round.
///
/// Latencies are captured alongside each node so sorting uses the values measured in
/// this round even if a node is probed again before the snapshot is dropped.
pub struct TopologyBuilder<C> {
    primaries: Vec<(Arc<Node<C>>, Duration)>,
    replicas: Vec<(Arc<Node<C>>, Duration)>,
}

impl<C> TopologyBuilder<C> {
    pub fn new() -> Self {
        Self {
            primaries: Vec::new(),
            replicas: Vec::new(),
        }
    }

    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            primaries: Vec::with_capacity(nodes),
            replicas: Vec::with_capacity(nodes),
        }
    }

    pub fn record(&mut self, node: Arc<Node<C>>, primary: bool, latency: Duration) {
        if primary {
            self.primaries.push((node, latency));
        } else {
            self.replicas.push((node, latency));
        }
    }

    /// Sort both buckets by latency (stable, so equal latencies keep arrival order).
    pub fn build(mut self, refreshed_at: Instant) -> TopologySnapshot<C> {
        self.primaries.sort_by_key(|(_, latency)| *latency);
        self.replicas.sort_by_key(|(_, latency)| *latency);

        TopologySnapshot {
            primaries: self.primaries.into_iter().map(|(node, _)| node).collect(),
            replicas: self.replicas.into_iter().map(|(node, _)| node).collect(),
            generation: 0,
            refreshed_at: Some(refreshed_at),
        }
    }
}

impl<C> Default for TopologyBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

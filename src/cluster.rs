//! # Cluster Monitor
//!
//! [`Cluster`] owns the fixed member list, refreshes the topology in a background worker
//! and answers selection calls from the last published [`TopologySnapshot`].
//!
//! ## Rounds
//!
//! Each round spawns one probe task per node, all bounded by the same deadline
//! (`update_timeout` from the start of the round). Successful probes are recorded into a
//! single round-scoped [`TopologyBuilder`] behind a mutex; once every task has finished
//! the builder sorts both buckets and the snapshot is swapped in atomically.
//!
//! ## Readers
//!
//! [`Cluster::primary`] and [`Cluster::primary_preferred`] only load the current
//! snapshot pointer. They never lock, block or perform I/O, and they always observe one
//! complete round.
//!
//! ## Lifecycle
//!
//! `Constructed` (nodes are added) → `Running` (after [`Cluster::start_updating`]) →
//! `Stopping` → `Stopped` (after [`Cluster::stop`]). Stop is only observed between rounds;
//! the worker is joined before any connection is closed. Teardown runs in its own task, so
//! it completes even when the future returned by `stop` is dropped early.

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ClusterOption, ClusterSettings};
use crate::connection::{NodeConnection, PgNodeConnection};
use crate::error::{Result, RouterError};
use crate::node::Node;
use crate::topology::{TopologyBuilder, TopologySnapshot};

/// Observable lifecycle state of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    Constructed,
    Running,
    /// Stop was requested; the worker is being joined or connections are being closed.
    Stopping,
    Stopped,
}

enum Lifecycle {
    Constructed,
    Running {
        stop_tx: oneshot::Sender<()>,
        worker: JoinHandle<()>,
    },
    /// Flips to `true` once the teardown task has closed every node.
    Stopping { closed: watch::Receiver<bool> },
}

impl Lifecycle {
    fn state(&self) -> ClusterState {
        match self {
            Lifecycle::Constructed => ClusterState::Constructed,
            Lifecycle::Running { .. } => ClusterState::Running,
            Lifecycle::Stopping { closed } if teardown_finished(closed) => ClusterState::Stopped,
            Lifecycle::Stopping { .. } => ClusterState::Stopping,
        }
    }
}

// A teardown task that panicked drops its sender; nothing is left to wait for.
fn teardown_finished(closed: &watch::Receiver<bool>) -> bool {
    *closed.borrow() || closed.has_changed().is_err()
}

/// State shared between the cluster handle and its update worker.
struct Shared<C> {
    id: Uuid,
    settings: ClusterSettings,
    nodes: RwLock<Vec<Arc<Node<C>>>>,
    topology: ArcSwap<TopologySnapshot<C>>,
}

impl<C: NodeConnection> Shared<C> {
    async fn check_all_nodes(&self, deadline: Instant) -> TopologySnapshot<C> {
        let nodes = self.nodes.read().clone();
        let accumulator = Arc::new(Mutex::new(TopologyBuilder::with_capacity(nodes.len())));

        let mut probes = JoinSet::new();
        for node in nodes {
            let accumulator = Arc::clone(&accumulator);
            let logger = self.settings.logger.clone();
            probes.spawn(async move {
                let result = node.probe(deadline, logger.as_deref()).await;
                if let Ok(outcome) = result {
                    accumulator
                        .lock()
                        .record(node, outcome.primary, outcome.latency);
                }
            });
        }

        while let Some(joined) = probes.join_next().await {
            if let Err(e) = joined {
                warn!(cluster_id = %self.id, error = %e, "Probe task did not complete");
            }
        }

        let builder = match Arc::try_unwrap(accumulator) {
            Ok(accumulator) => accumulator.into_inner(),
            Err(accumulator) => std::mem::take(&mut *accumulator.lock()),
        };
        builder.build(Instant::now())
    }

    fn publish(&self, snapshot: TopologySnapshot<C>) {
        let primaries = snapshot.primaries().len();
        let replicas = snapshot.replicas().len();
        let primary = snapshot.primary().map(|n| n.endpoint().to_string());

        // Generation is derived from the snapshot being replaced, so concurrent
        // publishers never install a lower generation over a higher one.
        let mut generation = 0;
        let previous = self.topology.rcu(|current| {
            generation = current.generation() + 1;
            snapshot.clone().with_generation(generation)
        });

        debug!(
            cluster_id = %self.id,
            generation,
            primaries,
            replicas,
            "Topology published"
        );

        let previous_primary = previous.primary().map(|n| n.endpoint().to_string());
        if primary != previous_primary {
            info!(
                cluster_id = %self.id,
                generation,
                from = previous_primary.as_deref().unwrap_or("none"),
                to = primary.as_deref().unwrap_or("none"),
                "Primary changed"
            );
        }
        if primaries + replicas == 0 && (!previous.is_empty() || previous.generation() == 0) {
            warn!(cluster_id = %self.id, generation, "No cluster member is reachable");
        }
    }

    async fn refresh(&self) {
        let deadline = Instant::now() + self.settings.update_timeout;
        let snapshot = self.check_all_nodes(deadline).await;
        self.publish(snapshot);
    }
}

/// Client-side view of a replicated cluster.
pub struct Cluster<C = PgNodeConnection> {
    shared: Arc<Shared<C>>,
    lifecycle: Mutex<Lifecycle>,
}

impl<C: NodeConnection> Cluster<C> {
    pub fn new(options: impl IntoIterator<Item = ClusterOption>) -> Self {
        let settings = ClusterSettings::from_options(options);
        let id = Uuid::new_v4();

        debug!(
            cluster_id = %id,
            update_interval_ms = settings.update_interval.as_millis() as u64,
            update_timeout_ms = settings.update_timeout.as_millis() as u64,
            "Cluster created"
        );

        Self {
            shared: Arc::new(Shared {
                id,
                settings,
                nodes: RwLock::new(Vec::new()),
                topology: ArcSwap::from_pointee(TopologySnapshot::empty()),
            }),
            lifecycle: Mutex::new(Lifecycle::Constructed),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn state(&self) -> ClusterState {
        self.lifecycle.lock().state()
    }

    pub fn update_interval(&self) -> Duration {
        self.shared.settings.update_interval
    }

    pub fn update_timeout(&self) -> Duration {
        self.shared.settings.update_timeout
    }

    /// Registered nodes in registration order.
    pub fn nodes(&self) -> Vec<Arc<Node<C>>> {
        self.shared.nodes.read().clone()
    }

    /// Register a member. Only allowed before monitoring starts.
    pub fn add_node(&self, node: Node<C>) -> Result<Arc<Node<C>>> {
        let lifecycle = self.lifecycle.lock();
        if !matches!(*lifecycle, Lifecycle::Constructed) {
            return Err(RouterError::InvalidState(format!(
                "cannot add node '{}' to a {:?} cluster",
                node.endpoint(),
                lifecycle.state()
            )));
        }

        let node = Arc::new(node);
        self.shared.nodes.write().push(Arc::clone(&node));
        debug!(cluster_id = %self.shared.id, node = node.endpoint(), "Node registered");
        Ok(node)
    }

    /// Run one round, publish it, and keep refreshing every `update_interval` in the
    /// background. Returns once the first snapshot is visible.
    ///
    /// A zero update interval or timeout is rejected with [`RouterError::Configuration`]
    /// and leaves the cluster `Constructed`.
    pub async fn start_updating(&self) -> Result<()> {
        let settings = &self.shared.settings;
        if settings.update_interval.is_zero() || settings.update_timeout.is_zero() {
            return Err(RouterError::Configuration(format!(
                "update interval ({:?}) and update timeout ({:?}) must be greater than zero",
                settings.update_interval, settings.update_timeout
            )));
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        {
            let mut lifecycle = self.lifecycle.lock();
            if !matches!(*lifecycle, Lifecycle::Constructed) {
                return Err(RouterError::InvalidState(format!(
                    "cannot start a {:?} cluster",
                    lifecycle.state()
                )));
            }

            let (stop_tx, stop_rx) = oneshot::channel();
            let worker = tokio::spawn(update_loop(Arc::clone(&self.shared), stop_rx, ready_tx));
            *lifecycle = Lifecycle::Running { stop_tx, worker };
        }

        info!(
            cluster_id = %self.shared.id,
            nodes = self.shared.nodes.read().len(),
            "Cluster monitoring started"
        );

        ready_rx.await.map_err(|_| {
            RouterError::Worker("update worker exited before the first round".to_string())
        })
    }

    /// Probe every node concurrently under `deadline` and build the resulting snapshot.
    /// Nodes that fail or miss the deadline are left out.
    pub async fn check_all_nodes(&self, deadline: Instant) -> TopologySnapshot<C> {
        self.shared.check_all_nodes(deadline).await
    }

    /// Atomically replace the visible snapshot.
    ///
    /// The published generation is always one above the snapshot it replaces, also when
    /// this races the background worker.
    pub fn publish(&self, snapshot: TopologySnapshot<C>) {
        self.shared.publish(snapshot);
    }

    /// The snapshot selection calls currently answer from.
    pub fn topology(&self) -> Arc<TopologySnapshot<C>> {
        self.shared.topology.load_full()
    }

    /// Lowest-latency writable node, if any.
    pub fn primary(&self) -> Option<Arc<Node<C>>> {
        self.shared.topology.load().primary().cloned()
    }

    /// Lowest-latency writable node, else lowest-latency read-only node.
    pub fn primary_preferred(&self) -> Option<Arc<Node<C>>> {
        self.shared.topology.load().primary_preferred().cloned()
    }

    /// Stop the update worker, wait for it, then close every node.
    ///
    /// A round in flight is allowed to finish first. Teardown continues in the background
    /// if this future is dropped; calling `stop` again waits for it to complete. Once
    /// teardown is done further calls return immediately. Selection calls keep answering
    /// from the last published snapshot.
    pub async fn stop(&self) {
        let mut closed = {
            let mut lifecycle = self.lifecycle.lock();
            match &*lifecycle {
                Lifecycle::Stopping { closed } => closed.clone(),
                Lifecycle::Constructed | Lifecycle::Running { .. } => {
                    let (closed_tx, closed_rx) = watch::channel(false);
                    let previous = std::mem::replace(
                        &mut *lifecycle,
                        Lifecycle::Stopping {
                            closed: closed_rx.clone(),
                        },
                    );
                    let worker = match previous {
                        Lifecycle::Running { stop_tx, worker } => {
                            let _ = stop_tx.send(());
                            Some(worker)
                        }
                        _ => None,
                    };
                    tokio::spawn(teardown(Arc::clone(&self.shared), worker, closed_tx));
                    closed_rx
                }
            }
        };

        // An error means the teardown task is gone; there is nothing left to wait for
        let _ = closed.wait_for(|done| *done).await;
    }
}

async fn teardown<C: NodeConnection>(
    shared: Arc<Shared<C>>,
    worker: Option<JoinHandle<()>>,
    closed_tx: watch::Sender<bool>,
) {
    if let Some(worker) = worker {
        if let Err(e) = worker.await {
            warn!(cluster_id = %shared.id, error = %e, "Update worker ended abnormally");
        }
    }

    let nodes = shared.nodes.read().clone();
    for node in &nodes {
        node.close().await;
    }

    info!(cluster_id = %shared.id, nodes = nodes.len(), "Cluster stopped");
    let _ = closed_tx.send(true);
}

async fn update_loop<C: NodeConnection>(
    shared: Arc<Shared<C>>,
    mut stop_rx: oneshot::Receiver<()>,
    ready_tx: oneshot::Sender<()>,
) {
    shared.refresh().await;
    let _ = ready_tx.send(());

    let interval = shared.settings.update_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // A dropped sender means the cluster handle is gone
            _ = &mut stop_rx => {
                debug!(cluster_id = %shared.id, "Update worker shutting down");
                break;
            }
            _ = ticker.tick() => shared.refresh().await,
        }
    }
}

impl<C> fmt::Debug for Cluster<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster")
            .field("id", &self.shared.id)
            .field("state", &self.lifecycle.lock().state())
            .field("settings", &self.shared.settings)
            .field("topology", &*self.shared.topology.load())
            .finish()
    }
}

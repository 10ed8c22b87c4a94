//! Shared fixtures for cluster scenario tests.
//!
//! A [`SimulatedMember`] plays one database server. Its behavior can be switched while the
//! cluster is running through the [`MemberControl`] handle, which also exposes probe and
//! close counters.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use pg_ha_router::{
    with_update_interval, with_update_timeout, Cluster, ClusterLogger, LogField, LogLevel,
    NodeConnection, Node, Result, RouterError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How a simulated member answers the role probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Primary { latency: Duration },
    Replica { latency: Duration },
    /// Refuses the probe immediately.
    Down,
    /// Accepts the probe and never answers.
    Unresponsive,
}

impl Behavior {
    pub fn primary_ms(ms: u64) -> Self {
        Behavior::Primary { latency: Duration::from_millis(ms) }
    }

    pub fn replica_ms(ms: u64) -> Self {
        Behavior::Replica { latency: Duration::from_millis(ms) }
    }
}

#[derive(Debug)]
struct MemberState {
    behavior: Mutex<Behavior>,
    probes: AtomicUsize,
    closes: AtomicUsize,
    probed_after_close: AtomicBool,
}

/// Test-side handle on a simulated member.
#[derive(Debug, Clone)]
pub struct MemberControl {
    state: Arc<MemberState>,
}

impl MemberControl {
    pub fn set(&self, behavior: Behavior) {
        *self.state.behavior.lock() = behavior;
    }

    pub fn probes(&self) -> usize {
        self.state.probes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn probed_after_close(&self) -> bool {
        self.state.probed_after_close.load(Ordering::SeqCst)
    }
}

/// Connection to a simulated member.
#[derive(Debug)]
pub struct SimulatedMember {
    database: String,
    state: Arc<MemberState>,
}

impl SimulatedMember {
    pub fn new(database: &str, behavior: Behavior) -> (Self, MemberControl) {
        let state = Arc::new(MemberState {
            behavior: Mutex::new(behavior),
            probes: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            probed_after_close: AtomicBool::new(false),
        });
        let control = MemberControl { state: Arc::clone(&state) };
        (
            Self {
                database: database.to_string(),
                state,
            },
            control,
        )
    }
}

#[async_trait]
impl NodeConnection for SimulatedMember {
    async fn is_primary(&self) -> Result<bool> {
        self.state.probes.fetch_add(1, Ordering::SeqCst);
        if self.state.closes.load(Ordering::SeqCst) > 0 {
            self.state.probed_after_close.store(true, Ordering::SeqCst);
        }

        let behavior = *self.state.behavior.lock();
        match behavior {
            Behavior::Primary { latency } => {
                tokio::time::sleep(latency).await;
                Ok(true)
            }
            Behavior::Replica { latency } => {
                tokio::time::sleep(latency).await;
                Ok(false)
            }
            Behavior::Down => Err(RouterError::Database("connection refused".to_string())),
            Behavior::Unresponsive => std::future::pending().await,
        }
    }

    fn database(&self) -> &str {
        &self.database
    }

    async fn close(&self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Cluster with short cadence for tests, one member per `(endpoint, behavior)`.
pub fn simulated_cluster(
    members: &[(&str, Behavior)],
    interval: Duration,
    timeout: Duration,
) -> (Cluster<SimulatedMember>, Vec<MemberControl>) {
    let cluster = Cluster::new([with_update_interval(interval), with_update_timeout(timeout)]);
    let controls = members
        .iter()
        .map(|(endpoint, behavior)| {
            let (member, control) = SimulatedMember::new("app", *behavior);
            cluster
                .add_node(Node::new(*endpoint, member))
                .expect("cluster accepts nodes before start");
            control
        })
        .collect();
    (cluster, controls)
}

/// Endpoints of a bucket, in order.
pub fn endpoints(nodes: &[Arc<Node<SimulatedMember>>]) -> Vec<String> {
    nodes.iter().map(|n| n.endpoint().to_string()).collect()
}

/// Logger keeping events in memory.
#[derive(Debug, Default)]
pub struct CapturingLogger {
    events: Mutex<Vec<(LogLevel, String)>>,
}

impl CapturingLogger {
    pub fn count(&self, level: LogLevel) -> usize {
        self.events.lock().iter().filter(|(l, _)| *l == level).count()
    }
}

impl ClusterLogger for CapturingLogger {
    fn log(&self, level: LogLevel, message: &str, _fields: &[LogField<'_>]) {
        self.events.lock().push((level, message.to_string()));
    }
}

//! # Cluster Node
//!
//! A [`Node`] wraps one member's connection together with its last-known health. The
//! health fields are only written by [`Node::probe`], and the cluster never runs two
//! probes of the same node at once, so the mutex guarding them is uncontended in practice.
//! It is never held across an await point.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::connection::NodeConnection;
use crate::error::{Result, RouterError};
use crate::logging::{ClusterLogger, LogField, LogLevel};

/// Last-known health of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHealth {
    /// Outcome of the last probe. Only gates log emission; selection trusts the snapshot.
    pub alive: bool,
    /// Role reported by the last successful probe.
    pub primary: bool,
    /// Elapsed time of the last probe attempt, successful or not.
    pub latency: Duration,
    /// Number of probes attempted so far.
    pub probes: u64,
    pub last_error: Option<String>,
}

impl Default for NodeHealth {
    fn default() -> Self {
        // Members are presumed alive so that a first failure is reported once
        Self {
            alive: true,
            primary: false,
            latency: Duration::ZERO,
            probes: 0,
            last_error: None,
        }
    }
}

/// Result of one successful probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub primary: bool,
    pub latency: Duration,
}

/// One cluster member.
pub struct Node<C> {
    endpoint: String,
    connection: C,
    health: Mutex<NodeHealth>,
    closed: AtomicBool,
}

impl<C> Node<C> {
    pub fn new(endpoint: impl Into<String>, connection: C) -> Self {
        Self {
            endpoint: endpoint.into(),
            connection,
            health: Mutex::new(NodeHealth::default()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The member's connection handle, for issuing application queries.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Copy of the last-known health.
    pub fn health(&self) -> NodeHealth {
        self.health.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<C: NodeConnection> Node<C> {
    pub fn database(&self) -> &str {
        self.connection.database()
    }

    /// Run the role probe under `deadline`, recording its latency whatever the outcome.
    ///
    /// A failure is logged at error level only on the alive to dead transition, so a
    /// member that stays down does not flood the logs.
    pub async fn probe(
        &self,
        deadline: Instant,
        logger: Option<&dyn ClusterLogger>,
    ) -> Result<ProbeOutcome> {
        let started = Instant::now();
        let result = match tokio::time::timeout_at(deadline, self.connection.is_primary()).await {
            Ok(result) => result,
            Err(_) => Err(RouterError::Timeout(deadline.saturating_duration_since(started))),
        };
        let latency = started.elapsed();

        let mut health = self.health.lock();
        health.latency = latency;
        health.probes += 1;

        match result {
            Ok(primary) => {
                let recovered = !health.alive;
                health.alive = true;
                health.primary = primary;
                health.last_error = None;
                drop(health);

                if let Some(logger) = logger {
                    let database = self.connection.database();
                    let latency_text = format!("{latency:?}");
                    let fields: [LogField<'_>; 4] = [
                        ("node", &self.endpoint),
                        ("database", &database),
                        ("primary", &primary),
                        ("latency", &latency_text),
                    ];
                    if recovered {
                        logger.log(LogLevel::Info, "Node is reachable again", &fields);
                    }
                    logger.log(LogLevel::Trace, "Node checked", &fields);
                }

                Ok(ProbeOutcome { primary, latency })
            }
            Err(err) => {
                let was_alive = health.alive;
                health.alive = false;
                health.last_error = Some(err.to_string());
                drop(health);

                if was_alive {
                    if let Some(logger) = logger {
                        let database = self.connection.database();
                        let fields: [LogField<'_>; 3] = [
                            ("node", &self.endpoint),
                            ("database", &database),
                            ("reason", &err),
                        ];
                        logger.log(LogLevel::Error, "Problem when checking this node", &fields);
                    }
                }

                Err(err)
            }
        }
    }

    /// Release the connection. Only the first call reaches the connection.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.connection.close().await;
    }
}

impl<C> fmt::Debug for Node<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("endpoint", &self.endpoint)
            .field("health", &*self.health.lock())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

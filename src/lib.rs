#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # PG HA Router
//!
//! Client-side high-availability routing for replicated PostgreSQL clusters.
//!
//! ## Overview
//!
//! A [`Cluster`] keeps probing every member in the background, works out which one is
//! the writable primary and which ones are read-only replicas, and hands out ready
//! connection handles. Application code asks for [`Cluster::primary`] or
//! [`Cluster::primary_preferred`] and never carries failover logic itself.
//!
//! ## Module Organization
//!
//! - [`cluster`] - Background update loop, snapshot publication and node selection
//! - [`node`] - One member, its health and its probe
//! - [`topology`] - Immutable role-partitioned, latency-sorted snapshots
//! - [`connection`] - Connection capability and the PostgreSQL implementation
//! - [`config`] - Construction options and file/environment configuration
//! - [`bootstrap`] - Building a PostgreSQL cluster from configuration
//! - [`logging`] - Console logging setup and the pluggable node event logger
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pg_ha_router::{with_update_interval, Cluster, Node, PgNodeConnection, PoolSettings};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cluster = Cluster::new([with_update_interval(Duration::from_secs(2))]);
//! for (host, url) in [
//!     ("db-1", "postgresql://app@db-1.internal/orders"),
//!     ("db-2", "postgresql://app@db-2.internal/orders"),
//! ] {
//!     let connection = PgNodeConnection::connect_lazy(url, &PoolSettings::default())?;
//!     cluster.add_node(Node::new(host, connection))?;
//! }
//! cluster.start_updating().await?;
//!
//! if let Some(node) = cluster.primary() {
//!     sqlx::query("INSERT INTO audit (event) VALUES ('started')")
//!         .execute(node.connection().pool())
//!         .await?;
//! }
//!
//! cluster.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and scenario tests, no database required
//! ```

pub mod bootstrap;
pub mod cluster;
pub mod config;
pub mod connection;
pub mod constants;
pub mod error;
pub mod logging;
pub mod node;
pub mod topology;

#[cfg(test)]
pub(crate) mod test_utils;

pub use bootstrap::bootstrap_cluster;
pub use cluster::{Cluster, ClusterState};
pub use config::{
    with_logger, with_update_interval, with_update_timeout, ClusterConfig, ClusterOption,
    ClusterSettings, NodeConfig,
};
pub use connection::{NodeConnection, PgNodeConnection, PoolSettings};
pub use error::{Result, RouterError};
pub use logging::{init_structured_logging, ClusterLogger, LogField, LogLevel, TracingLogger};
pub use node::{Node, NodeHealth, ProbeOutcome};
pub use topology::{TopologyBuilder, TopologySnapshot};

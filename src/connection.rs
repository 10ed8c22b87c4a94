//! # Node Connections
//!
//! The engine never talks to a database directly. Each [`Node`](crate::node::Node) owns a
//! [`NodeConnection`], which knows how to run the role probe, which database it points at,
//! and how to release its resources. [`PgNodeConnection`] is the PostgreSQL implementation
//! backed by an `sqlx` pool; callers use [`PgNodeConnection::pool`] to issue their own
//! queries against the node selected by the cluster.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_ROLE_QUERY};
use crate::error::{Result, RouterError};

/// Query capability required from every cluster member.
///
/// `is_primary` is always awaited under a deadline by the caller; dropping the future
/// cancels the probe, so implementations must be cancel-safe.
#[async_trait]
pub trait NodeConnection: Send + Sync + 'static {
    /// Run the role probe: `true` when the member accepts writes.
    async fn is_primary(&self) -> Result<bool>;

    /// Logical name of the target database, used in log attributes.
    fn database(&self) -> &str;

    /// Release every underlying resource.
    async fn close(&self);
}

/// Pool sizing applied to each node's connection.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub role_query: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            role_query: DEFAULT_ROLE_QUERY.to_string(),
        }
    }
}

/// PostgreSQL member connection.
#[derive(Debug, Clone)]
pub struct PgNodeConnection {
    pool: PgPool,
    database: String,
    role_query: String,
}

impl PgNodeConnection {
    /// Build a lazily connected pool; an unreachable member does not fail construction,
    /// it only fails its probes until it comes back.
    pub fn connect_lazy(url: &str, settings: &PoolSettings) -> Result<Self> {
        let options = PgConnectOptions::from_str(url)?;
        let database = options.get_database().unwrap_or("postgres").to_string();

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_lazy_with(options);

        Ok(Self {
            pool,
            database,
            role_query: settings.role_query.clone(),
        })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, database: impl Into<String>, role_query: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
            role_query: role_query.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn role_query(&self) -> &str {
        &self.role_query
    }
}

#[async_trait]
impl NodeConnection for PgNodeConnection {
    async fn is_primary(&self) -> Result<bool> {
        let primary: bool = sqlx::query_scalar(&self.role_query)
            .fetch_one(&self.pool)
            .await
            .map_err(RouterError::from)?;
        Ok(primary)
    }

    fn database(&self) -> &str {
        &self.database
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

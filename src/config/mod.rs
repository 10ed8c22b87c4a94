//! # Cluster Configuration
//!
//! Two layers of configuration:
//!
//! - [`ClusterOption`] values (`with_logger`, `with_update_interval`,
//!   `with_update_timeout`) tune a [`Cluster`](crate::cluster::Cluster) built in code.
//! - [`ClusterConfig`] describes a whole deployment (members and tunables) and is loaded
//!   from an optional file plus `PGHA__*` environment overrides.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pg_ha_router::config::ClusterConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // PGHA__UPDATE_INTERVAL_MS=2000 overrides the file value
//! let config = ClusterConfig::load(Some(Path::new("config/cluster.toml")))?;
//! println!("monitoring {} members", config.resolved_nodes()?.len());
//! # Ok(())
//! # }
//! ```

pub mod options;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::connection::PoolSettings;
use crate::constants::{
    DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_ROLE_QUERY, DEFAULT_UPDATE_INTERVAL,
    DEFAULT_UPDATE_TIMEOUT, ENV_PREFIX,
};
use crate::error::{Result, RouterError};

pub use options::{
    with_logger, with_update_interval, with_update_timeout, ClusterOption, ClusterSettings,
};

/// One cluster member.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct NodeConfig {
    /// Logical endpoint name used in logs and selection results.
    pub host: String,
    /// Connection URL of the member.
    pub url: String,
}

/// Deployment description of a cluster.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub update_interval_ms: u64,
    pub update_timeout_ms: u64,
    /// Pool size of each member's connection.
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    /// Boolean query answering "is this member writable".
    pub role_query: String,
    pub nodes: Vec<NodeConfig>,
    /// Members given as bare URLs; the endpoint name is derived as `host:port`.
    pub node_urls: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: DEFAULT_UPDATE_INTERVAL.as_millis() as u64,
            update_timeout_ms: DEFAULT_UPDATE_TIMEOUT.as_millis() as u64,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT.as_millis() as u64,
            role_query: DEFAULT_ROLE_QUERY.to_string(),
            nodes: Vec::new(),
            node_urls: Vec::new(),
        }
    }
}

impl ClusterConfig {
    /// Load from an optional file (format from its extension) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Load from the process environment only.
    pub fn from_env() -> Result<Self> {
        Self::load_with_env(None, None)
    }

    /// Load with an explicit environment map instead of the process environment.
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading cluster configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("node_urls")
                .try_parsing(true)
                .source(env),
        );

        let config: ClusterConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            update_interval_ms = config.update_interval_ms,
            update_timeout_ms = config.update_timeout_ms,
            nodes = config.nodes.len() + config.node_urls.len(),
            "Cluster configuration loaded"
        );

        Ok(config)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_millis(self.update_timeout_ms)
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
            role_query: self.role_query.clone(),
        }
    }

    /// Explicit members followed by the ones given as bare URLs.
    pub fn resolved_nodes(&self) -> Result<Vec<NodeConfig>> {
        let mut nodes = self.nodes.clone();
        for url in &self.node_urls {
            let options = PgConnectOptions::from_str(url).map_err(|e| {
                RouterError::Configuration(format!("Invalid node url '{url}': {e}"))
            })?;
            nodes.push(NodeConfig {
                host: format!("{}:{}", options.get_host(), options.get_port()),
                url: url.clone(),
            });
        }
        Ok(nodes)
    }

    pub fn validate(&self) -> Result<()> {
        if self.update_interval_ms == 0 {
            return Err(RouterError::Configuration(
                "update_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.update_timeout_ms == 0 {
            return Err(RouterError::Configuration(
                "update_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.update_timeout_ms >= self.update_interval_ms {
            // Rounds then run back to back; the ticker delays instead of bursting
            warn!(
                update_timeout_ms = self.update_timeout_ms,
                update_interval_ms = self.update_interval_ms,
                "Update timeout is not shorter than the update interval"
            );
        }
        if self.max_connections == 0 {
            return Err(RouterError::Configuration(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        if self.role_query.trim().is_empty() {
            return Err(RouterError::Configuration("role_query must not be empty".to_string()));
        }

        let nodes = self.resolved_nodes()?;
        if nodes.is_empty() {
            return Err(RouterError::Configuration(
                "at least one node must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(node.host.as_str()) {
                return Err(RouterError::Configuration(format!(
                    "duplicate node host '{}'",
                    node.host
                )));
            }
        }

        Ok(())
    }
}

//! # Cluster Bootstrap
//!
//! Builds a PostgreSQL [`Cluster`] from a [`ClusterConfig`]: one lazily connected pool per
//! member, tunables taken from the configuration, and any extra options appended so they
//! can override it.

use std::sync::Arc;
use tracing::info;

use crate::cluster::Cluster;
use crate::config::{with_update_interval, with_update_timeout, ClusterConfig, ClusterOption};
use crate::connection::PgNodeConnection;
use crate::error::Result;
use crate::node::Node;

impl Cluster<PgNodeConnection> {
    /// Build a cluster with every configured member registered; monitoring is not started.
    pub fn from_config(
        config: &ClusterConfig,
        options: impl IntoIterator<Item = ClusterOption>,
    ) -> Result<Self> {
        config.validate()?;

        let mut all_options = vec![
            with_update_interval(config.update_interval()),
            with_update_timeout(config.update_timeout()),
        ];
        all_options.extend(options);

        let cluster = Self::new(all_options);
        let pool_settings = config.pool_settings();
        for node in config.resolved_nodes()? {
            let connection = PgNodeConnection::connect_lazy(&node.url, &pool_settings)?;
            cluster.add_node(Node::new(node.host, connection))?;
        }

        Ok(cluster)
    }
}

/// Build a cluster from configuration and start monitoring it.
///
/// Returns once the first round is published.
pub async fn bootstrap_cluster(
    config: &ClusterConfig,
    options: impl IntoIterator<Item = ClusterOption>,
) -> Result<Arc<Cluster<PgNodeConnection>>> {
    let cluster = Arc::new(Cluster::from_config(config, options)?);
    cluster.start_updating().await?;

    let topology = cluster.topology();
    info!(
        cluster_id = %cluster.id(),
        primaries = topology.primaries().len(),
        replicas = topology.replicas().len(),
        "Cluster bootstrapped"
    );

    Ok(cluster)
}

//! # Cluster Monitor
//!
//! Command-line tool that loads a cluster configuration, keeps the topology up to date and
//! periodically reports which member would be selected. Useful to check a configuration
//! against a live cluster and to watch a failover happen.

use anyhow::Context;
use clap::Parser;
use pg_ha_router::{bootstrap_cluster, init_structured_logging, with_logger, ClusterConfig, TracingLogger};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "cluster-monitor")]
#[command(about = "Watch primary/replica selection of a PostgreSQL cluster")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (toml, yaml or json); PGHA__* variables override it
    #[arg(short, long, env = "PGHA_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds between two reports
    #[arg(short, long, default_value_t = 5)]
    report_interval: u64,

    /// Output format (table, json)
    #[arg(long, default_value = "table")]
    format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let config = ClusterConfig::load(cli.config.as_deref()).context("loading cluster configuration")?;
    let cluster = bootstrap_cluster(&config, [with_logger(TracingLogger::new())])
        .await
        .context("starting cluster monitoring")?;

    let mut reports = tokio::time::interval(Duration::from_secs(cli.report_interval.max(1)));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, stopping cluster monitoring");
                break;
            }
            _ = reports.tick() => {
                let topology = cluster.topology();
                let primary = topology.primary().map(|n| n.endpoint().to_string());
                let fallback = topology.primary_preferred().map(|n| n.endpoint().to_string());
                let replicas: Vec<String> =
                    topology.replicas().iter().map(|n| n.endpoint().to_string()).collect();

                if cli.format == "json" {
                    let report = serde_json::json!({
                        "generation": topology.generation(),
                        "primary": primary,
                        "primary_preferred": fallback,
                        "replicas": replicas,
                        "nodes": cluster.nodes().iter().map(|n| {
                            let health = n.health();
                            serde_json::json!({
                                "endpoint": n.endpoint(),
                                "alive": health.alive,
                                "primary": health.primary,
                                "latency_ms": health.latency.as_secs_f64() * 1000.0,
                                "last_error": health.last_error,
                            })
                        }).collect::<Vec<_>>(),
                    });
                    println!("{report}");
                } else {
                    println!(
                        "generation={:<6} primary={:<24} primary_preferred={:<24} replicas=[{}]",
                        topology.generation(),
                        primary.as_deref().unwrap_or("none"),
                        fallback.as_deref().unwrap_or("none"),
                        replicas.join(", ")
                    );
                }
            }
        }
    }

    cluster.stop().await;
    Ok(())
}

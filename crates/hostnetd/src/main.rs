//! hostnetd - Host Network Plugin Manager Daemon
//!
//! Entry point for the daemon. Waits for the metadata service, then spawns
//! one reconciliation loop per watcher (ARP table, conntrack DNAT table,
//! dangling veths) and runs until SIGINT.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use hostnet_arpsync::ArpWatcher;
use hostnet_common::{parse_sync_interval, spawn_watcher, Result};
use hostnet_conntracksync::ConntrackWatcher;
use hostnet_kernel::{ConntrackCli, RouteNetlink};
use hostnet_metadata::MetadataClient;
use hostnet_runtime::DockerCli;
use hostnet_vethsync::VethWatcher;

/// Host-side network plugin manager.
///
/// Keeps the kernel's ARP, conntrack and veth state consistent with the
/// cluster metadata service.
#[derive(Debug, Parser)]
#[command(name = "hostnetd", version)]
struct Cli {
    /// Base URL of the cluster metadata service
    #[arg(long, default_value = "http://metadata.internal/2016-07-29")]
    metadata_url: String,

    /// Customize the interval of arpsync in seconds
    #[arg(long, default_value = "")]
    arpsync_interval: String,

    /// Customize the interval of conntracksync in seconds
    #[arg(long, default_value = "")]
    conntracksync_interval: String,

    /// Customize the interval of vethsync in seconds
    #[arg(long, default_value = "")]
    vethsync_interval: String,

    /// Name prefix of host-side veth links
    #[arg(long, default_value = "veth")]
    veth_prefix: String,

    /// Turn on debug logging
    #[arg(long)]
    debug: bool,
}

/// Initializes the tracing/logging subsystem.
fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    info!("--- starting hostnetd ---");

    match run(cli).await {
        Ok(()) => {
            info!("hostnetd exiting normally");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "hostnetd exiting with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let metadata = Arc::new(MetadataClient::connect(&cli.metadata_url).await?);
    let netlink = Arc::new(RouteNetlink::new());
    let conntrack = Arc::new(ConntrackCli::new());
    let runtime = Arc::new(DockerCli::new());

    spawn_watcher(
        ArpWatcher::new(metadata.clone(), netlink.clone()),
        parse_sync_interval(
            &cli.arpsync_interval,
            hostnet_arpsync::DEFAULT_SYNC_INTERVAL_SECS,
        ),
    );
    spawn_watcher(
        ConntrackWatcher::new(metadata.clone(), conntrack),
        parse_sync_interval(
            &cli.conntracksync_interval,
            hostnet_conntracksync::DEFAULT_SYNC_INTERVAL_SECS,
        ),
    );
    spawn_watcher(
        VethWatcher::new(metadata, netlink, runtime, cli.veth_prefix),
        parse_sync_interval(
            &cli.vethsync_interval,
            hostnet_vethsync::DEFAULT_SYNC_INTERVAL_SECS,
        ),
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| hostnet_common::HostnetError::runtime("signal", e.to_string()))?;
    info!("received SIGINT, shutting down");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["hostnetd"]);
        assert_eq!(cli.metadata_url, "http://metadata.internal/2016-07-29");
        assert_eq!(cli.arpsync_interval, "");
        assert_eq!(cli.veth_prefix, "veth");
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_interval_overrides() {
        let cli = Cli::parse_from([
            "hostnetd",
            "--conntracksync-interval",
            "30",
            "--debug",
        ]);
        assert_eq!(cli.conntracksync_interval, "30");
        assert!(cli.debug);

        // Garbage intervals are accepted here and fall back at parse time.
        let interval = parse_sync_interval(&cli.arpsync_interval, 120);
        assert_eq!(interval.as_secs(), 120);
    }
}

//! Chain connector binary.
//!
//! Resolves a chain node from the configured endpoint or network, keeps the
//! connection alive through failover and reports its status until stopped.

use clap::Parser;
use connector_catalog::{EndpointCatalog, EndpointSelector};
use connector_session::{
    BlacklistScope, Client, ClientFactory, ConnectionEstablisher, ConnectionEvent, TcpTransport,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[macro_use]
mod logging;
mod config;

use config::ConnectorConfig;
use logging::ConnectorLogFormatter;

/// Chain node connector with transparent failover
#[derive(Parser, Debug)]
#[command(name = "chain-connector", version, about = "Chain node connector with failover")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Explicit node address, e.g. 10.0.0.5:9944 (wins over --network)
    #[arg(long)]
    chain_endpoint: Option<String>,

    /// Catalog network to connect to
    #[arg(long)]
    network: Option<String>,

    /// Connect timeout per attempt, e.g. 5s
    #[arg(long)]
    connect_timeout: Option<humantime::Duration>,

    /// Delay between failed attempts, e.g. 250ms
    #[arg(long)]
    retry_delay: Option<humantime::Duration>,

    /// Keep a separate blacklist per network
    #[arg(long)]
    per_network_blacklist: bool,

    /// Status report interval
    #[arg(long, default_value = "30s")]
    status_interval: humantime::Duration,

    /// Print the catalog networks and exit
    #[arg(long)]
    list_networks: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if Duration::from(args.status_interval).is_zero() {
        anyhow::bail!("--status-interval must be greater than zero");
    }

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("chain_connector={}", args.log_level).parse()?)
        .add_directive(format!("connector_session={}", args.log_level).parse()?)
        .add_directive(format!("connector_catalog={}", args.log_level).parse()?);

    let formatter = ConnectorLogFormatter::new("connector".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .event_format(formatter)
        .init();

    info!("Starting chain connector v{}", env!("CARGO_PKG_VERSION"));

    let mut connector_config = ConnectorConfig::load_from_file(&args.config)?;
    apply_args(&mut connector_config, &args);
    connector_config.validate()?;

    let catalog = Arc::new(connector_config.catalog()?);

    if args.list_networks {
        print_networks(&catalog);
        return Ok(());
    }

    let establisher_config = connector_config.establisher_config();
    info!(
        "Establisher config: connect_timeout={:?}, retry_delay={:?}, blacklist_scope={:?}",
        establisher_config.connect_timeout,
        establisher_config.retry_delay,
        establisher_config.blacklist_scope
    );

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let mut establisher = ConnectionEstablisher::new(
        EndpointSelector::new(catalog.clone()),
        Arc::new(TcpTransport::new()),
        establisher_config,
    );
    establisher.set_event_sender(event_tx);
    let establisher = Arc::new(establisher);

    let event_task = tokio::spawn(log_events(event_rx));

    let factory = ClientFactory::new(establisher.clone());
    let client = match factory.create_by_config(&connector_config.chain).await {
        Ok(client) => client,
        Err(e) => {
            component_error!("client", "Failed to connect: {}", e);
            let known: Vec<&str> = catalog.networks().into_iter().map(|n| n.as_str()).collect();
            info!("Known networks: {}", known.join(", "));
            event_task.abort();
            return Err(e.into());
        }
    };

    component_info!(
        "client",
        "Client ready on {:?} (network: {:?})",
        client.endpoint().await,
        client.network()
    );

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut status = tokio::time::interval(Duration::from(args.status_interval));
    status.tick().await;

    loop {
        tokio::select! {
            _ = status.tick() => {
                report_status(&client, &establisher).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT signal, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal, shutting down");
                break;
            }
        }
    }

    client.close().await;
    event_task.abort();
    info!("Chain connector stopped");

    Ok(())
}

/// Command line flags override file and environment settings
fn apply_args(config: &mut ConnectorConfig, args: &Args) {
    if let Some(endpoint) = &args.chain_endpoint {
        config.chain.chain_endpoint = Some(endpoint.clone());
    }
    if let Some(network) = &args.network {
        config.chain.network = Some(network.clone());
    }
    if let Some(timeout) = args.connect_timeout {
        config.connect_timeout = timeout.into();
    }
    if let Some(delay) = args.retry_delay {
        config.retry_delay = delay.into();
    }
    if args.per_network_blacklist {
        config.blacklist_scope = BlacklistScope::PerNetwork;
    }
}

fn print_networks(catalog: &EndpointCatalog) {
    for network in catalog.networks() {
        let endpoints = catalog.lookup(network).unwrap_or_default();
        println!("{}", network);
        for endpoint in endpoints {
            println!("  {}", endpoint);
        }
    }
}

async fn report_status(client: &Arc<Client>, establisher: &ConnectionEstablisher) {
    let blacklisted = establisher.blacklist().await.len();
    let connected = client.is_connected().await;
    match client.endpoint().await.filter(|_| connected) {
        Some(endpoint) => component_info!(
            "status",
            "Connected to {} ({} endpoints blacklisted)",
            endpoint,
            blacklisted
        ),
        None => component_warn!(
            "status",
            "Not connected ({} endpoints blacklisted)",
            blacklisted
        ),
    }
}

async fn log_events(mut rx: mpsc::UnboundedReceiver<ConnectionEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            ConnectionEvent::Connected { session, endpoint } => {
                component_info!("session", "Session {} established to {}", session, endpoint)
            }
            ConnectionEvent::AttemptFailed { endpoint, reason } => {
                component_warn!("session", "Attempt to {} failed: {}", endpoint, reason)
            }
            ConnectionEvent::Exhausted {
                network,
                cause,
                attempted,
            } => component_error!(
                "session",
                "Network {} exhausted after {} attempts: {}",
                network,
                attempted.len(),
                cause
            ),
            ConnectionEvent::Disconnected { session, endpoint } => {
                component_warn!("failover", "Session {} to {} lost", session, endpoint)
            }
            ConnectionEvent::Reconnected {
                network,
                previous,
                session,
                endpoint,
            } => component_info!(
                "failover",
                "Session {} replaced by {} on {} ({})",
                previous,
                session,
                endpoint,
                network
            ),
            ConnectionEvent::ReconnectFailed {
                network,
                previous,
                reason,
            } => component_error!(
                "failover",
                "Could not replace session {} on {}: {}",
                previous,
                network,
                reason
            ),
        }
    }
}

//! `hostboxd` — runs every configured service on its own port.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hostbox_server::config::AppConfig;
use hostbox_server::network::{NetworkConfig, ServiceModule};
use hostbox_server::plugins;
use hostbox_server::service::{
    now_millis, ServiceInstance, ServiceRegistry, SweepRunnable, SweepWorker,
};

#[derive(Parser)]
#[command(name = "hostboxd")]
#[command(version)]
#[command(about = "Multi-tenant content hosting server")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HOSTBOX_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Root directory for relative paths in the config (defaults to the
    /// config file's directory)
    #[arg(long)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hostbox_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let root = match cli.root {
        Some(root) => root,
        None => cli
            .config
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let config = AppConfig::load(&cli.config, &root)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    anyhow::ensure!(!config.services.is_empty(), "no services configured");

    let registry = Arc::new(ServiceRegistry::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut servers = Vec::with_capacity(config.services.len());

    for service_config in config.services {
        let name = service_config.name.clone();
        let bus = plugins::install(&service_config)
            .with_context(|| format!("failed to set up handler for service '{name}'"))?;
        let network = NetworkConfig::for_service(&service_config);
        let instance = Arc::new(
            ServiceInstance::new(service_config, bus)
                .with_context(|| format!("failed to initialize service '{name}'"))?,
        );
        registry.register(Arc::clone(&instance));

        let mut module = ServiceModule::new(network, instance);
        let port = module
            .start()
            .await
            .with_context(|| format!("failed to bind port for service '{name}'"))?;
        info!(service = %name, port, "service started");

        let mut shutdown = shutdown_rx.clone();
        servers.push(tokio::spawn(async move {
            let result = module
                .serve(async move {
                    let _ = shutdown.changed().await;
                })
                .await;
            if let Err(err) = result {
                error!(service = %name, error = %err, "server exited with error");
            }
        }));
    }

    // Expired content left over from the previous run is dropped before the
    // periodic sweeper takes over.
    let expired = registry.sweep(now_millis()).await;
    if expired > 0 {
        info!(expired, "removed expired content at startup");
    }

    let mut sweeper = config
        .expire_check_interval
        .map(|interval| SweepWorker::start(SweepRunnable::new(Arc::clone(&registry)), interval));

    info!(services = registry.len(), "all services running");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");

    let _ = shutdown_tx.send(true);
    if let Some(sweeper) = sweeper.as_mut() {
        sweeper.stop().await;
    }
    for server in servers {
        let _ = server.await;
    }

    info!("shutdown complete");
    Ok(())
}

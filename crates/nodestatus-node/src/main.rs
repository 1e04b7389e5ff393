//! NodeStatus - server monitoring hub.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nodestatus_node::{
    config::Config, gateway, observability::init_logging, registry::hash_password, AppState,
    FileRegistry, WebhookNotifier,
};
use nodestatus_realtime::{NodeStatus, PushConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// NodeStatus - live status of your servers
#[derive(Parser, Debug)]
#[command(name = "nodestatus")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the hub
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Listen address (overrides the configuration file)
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(long)]
        log_level: Option<String>,

        /// Emit JSON logs
        #[arg(long)]
        json: bool,
    },
    /// Print an Argon2 hash for a registry entry
    HashPassword {
        /// Password to hash
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    match Args::parse().command {
        Command::Serve {
            config,
            listen,
            log_level,
            json,
        } => {
            let mut cfg = Config::load(&config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            if let Some(listen) = listen {
                cfg.listen = listen;
            }
            if let Some(level) = log_level {
                cfg.log_level = level;
            }
            cfg.log_json |= json;
            serve(cfg).await
        }
        Command::HashPassword { password } => {
            let hash = hash_password(&password).context("Failed to hash password")?;
            println!("{hash}");
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    init_logging(&config.log_level, config.log_json);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting NodeStatus");

    let registry = Arc::new(FileRegistry::new(&config.registry_path));
    let mut builder = NodeStatus::builder(registry).push(PushConfig::from(&config.push));
    if let Some(url) = &config.notify.webhook_url {
        let notifier = WebhookNotifier::new(url.clone()).context("Failed to build webhook client")?;
        builder = builder.hook(Arc::new(notifier));
        tracing::info!(url = %url, "Webhook notifications enabled");
    }
    let service = Arc::new(builder.build());

    service.init().await.with_context(|| {
        format!(
            "Failed to load server registry {}",
            config.registry_path.display()
        )
    })?;
    let reconciler = service.spawn_reconciler(config.reconcile_interval());

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    tracing::info!(
        listen = %config.listen,
        push_interval_ms = config.push.interval_ms,
        push_enabled = config.push.enabled,
        "NodeStatus is ready"
    );

    gateway::serve(listener, AppState { service }, shutdown_signal())
        .await
        .context("Server error")?;

    reconciler.abort();
    tracing::info!("NodeStatus stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

//! Route-tree RPC demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ http::RpcServer ──▶ rpc::RpcRouter ──▶ Route
//!                      (request id,         (compiled path     (middlewares,
//!                       trace, timeout,      table, 404/405)    validator,
//!                       body limit)                             handler)
//!     Client Response
//!     ◀─────────────── JSON / plain text ◀───────────────────────┘
//!
//!     Cross-cutting: config (+ watcher), auth key ring, observability,
//!                    lifecycle (signals, shutdown)
//! ```

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use notify::RecommendedWatcher;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use rpc_tree::auth::KeyRing;
use rpc_tree::config::{load_config, ConfigWatcher, RpcConfig};
use rpc_tree::demo;
use rpc_tree::http::RpcServer;
use rpc_tree::lifecycle::{wait_for_shutdown, Shutdown};
use rpc_tree::observability::{logging, metrics};
use rpc_tree::rpc::RpcRouter;

#[derive(Parser)]
#[command(name = "rpc-tree")]
#[command(about = "Serve the demo route tree", long_about = None)]
struct Args {
    /// TOML configuration file; watched for secret rotation.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RpcConfig::default(),
    };

    logging::init(config.observability.log_format);
    tracing::info!("rpc-tree v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        reject_duplicate_paths = config.router.reject_duplicate_paths,
        auth = ?config.auth,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let ring = Arc::new(key_ring(&config)?);
    let rpc = RpcRouter::from_tree(
        &demo::routes(ring.clone()),
        config.router.collision_policy(),
    )?;

    let shutdown = Shutdown::new();
    let _watcher = match &args.config {
        Some(path) => Some(watch_config(path, ring, shutdown.subscribe())?),
        None => None,
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = RpcServer::new(config, rpc);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        _ = wait_for_shutdown() => {
            shutdown.trigger();
            server_task.await??;
        }
        result = &mut server_task => result??,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Key ring from config, or a throwaway secret when none is configured.
fn key_ring(config: &RpcConfig) -> Result<KeyRing, Box<dyn Error>> {
    if config.auth.secrets.is_empty() {
        tracing::warn!("No auth.secrets configured, signing with an ephemeral secret");
        let ring = KeyRing::new([uuid::Uuid::new_v4().to_string()])?.with_config(&config.auth);
        return Ok(ring);
    }
    Ok(KeyRing::from_config(&config.auth)?)
}

/// Apply secret changes from the config file until shutdown.
fn watch_config(
    path: &Path,
    ring: Arc<KeyRing>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<RecommendedWatcher, notify::Error> {
    let (watcher, mut updates) = ConfigWatcher::new(path);
    let handle = watcher.run()?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(config) = updates.recv() => apply_reload(&ring, &config),
                _ = shutdown.recv() => break,
                else => break,
            }
        }
    });
    Ok(handle)
}

fn apply_reload(ring: &KeyRing, config: &RpcConfig) {
    if config.auth.secrets.is_empty() {
        tracing::warn!("Reloaded config has no auth.secrets, keeping current signing secrets");
    } else if let Err(e) = ring.sync_secrets(&config.auth.secrets) {
        tracing::error!(error = %e, "Failed to apply reloaded secrets");
    } else {
        tracing::info!(kids = ?ring.kids(), "Signing secrets updated");
    }
    tracing::info!("Sections other than auth.secrets take effect after a restart");
}

//! sysaskd - daemon answering natural-language questions about this machine.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sysaskd::config::{Config, API_KEY_ENV};
use sysaskd::executor::ShellRunner;
use sysaskd::generator;
use sysaskd::inventory::SysinfoInventory;
use sysaskd::llm::{ChatClient, Completion};
use sysaskd::resolver::QueryResolver;
use sysaskd::server::{self, DaemonState};

#[derive(Parser)]
#[command(version, about = "Answers natural-language questions about this machine")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = sysaskd::config::CONFIG_PATH)]
    config: PathBuf,

    /// Unix socket to listen on
    #[arg(long, default_value = server::DEFAULT_SOCKET_PATH)]
    socket: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("sysaskd v{} starting", env!("CARGO_PKG_VERSION"));

    let (status_tx, status_rx) = watch::channel("Initializing...".to_string());

    let config = Config::load(&args.config)?;
    let static_context = generator::load_static_context(config.resolver.context_file.as_deref());

    let (llm, degraded): (Option<Arc<dyn Completion>>, bool) = match Config::api_key() {
        Some(api_key) => match ChatClient::new(&config.llm, api_key) {
            Ok(client) => (Some(Arc::new(client)), false),
            Err(e) => {
                warn!("Completion client init failed: {}", e);
                (None, true)
            }
        },
        None => {
            warn!("{} not set, running without the language model", API_KEY_ENV);
            (None, true)
        }
    };

    let notice = if degraded {
        "Setup failed, using basic mode..."
    } else {
        "Ready..."
    };
    let _ = status_tx.send(notice.to_string());
    info!("{}", notice);

    let resolver = QueryResolver::new(
        llm,
        Arc::new(ShellRunner::new(&config.executor)),
        Arc::new(SysinfoInventory),
        static_context,
    );

    let state = Arc::new(DaemonState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        start_time: Instant::now(),
        resolver,
        max_retries: config.resolver.max_retries,
        degraded,
        status: status_rx,
    });

    server::start_server(&args.socket, state).await
}

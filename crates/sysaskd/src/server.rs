//! RPC server - Unix socket endpoint for the desktop-shell collaborator.
//!
//! Newline-delimited JSON-RPC 2.0. One method resolves queries, one reports
//! the lifecycle status the daemon pushed through the watch channel during
//! startup.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::resolver::QueryResolver;
use sysask_shared::rpc::{QueryParams, RpcMethod, RpcRequest, RpcResponse, StatusData};

pub const DEFAULT_SOCKET_PATH: &str = "/run/sysask/sysask.sock";

/// Daemon state shared across connections
pub struct DaemonState {
    pub version: String,
    pub start_time: Instant,
    pub resolver: QueryResolver,
    pub max_retries: u32,
    pub degraded: bool,
    pub status: watch::Receiver<String>,
}

/// Start the RPC server and accept connections forever.
pub async fn start_server(socket_path: &Path, state: Arc<DaemonState>) -> Result<()> {
    if let Some(socket_dir) = socket_path.parent() {
        tokio::fs::create_dir_all(socket_dir)
            .await
            .context("Failed to create socket directory")?;
    }

    // Remove a stale socket from a previous run
    let _ = tokio::fs::remove_file(socket_path).await;

    let listener = UnixListener::bind(socket_path).context("Failed to bind Unix socket")?;
    info!("RPC server listening on {}", socket_path.display());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o666))?;
    }

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(stream: UnixStream, state: Arc<DaemonState>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .context("Failed to read from socket")?;

        if bytes_read == 0 {
            break;
        }

        let request: RpcRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Invalid request JSON: {}", e);
                continue;
            }
        };

        let response = handle_request(request, &state).await;
        let response_json = serde_json::to_string(&response)? + "\n";
        writer
            .write_all(response_json.as_bytes())
            .await
            .context("Failed to write response")?;
    }

    Ok(())
}

async fn handle_request(request: RpcRequest, state: &DaemonState) -> RpcResponse {
    match request.method {
        RpcMethod::Query => {
            let params: QueryParams = match request
                .params
                .and_then(|params| serde_json::from_value(params).ok())
            {
                Some(params) => params,
                None => {
                    return RpcResponse::error(
                        request.id,
                        -32602,
                        "query method requires {\"query\": string} params".to_string(),
                    )
                }
            };

            let envelope = state.resolver.resolve(&params.query, state.max_retries).await;
            match serde_json::to_value(&envelope) {
                Ok(value) => RpcResponse::success(request.id, value),
                Err(e) => RpcResponse::error(request.id, -32603, e.to_string()),
            }
        }
        RpcMethod::Status => {
            let status = StatusData {
                version: state.version.clone(),
                uptime_secs: state.start_time.elapsed().as_secs(),
                degraded: state.degraded,
                status: state.status.borrow().clone(),
            };
            match serde_json::to_value(&status) {
                Ok(value) => RpcResponse::success(request.id, value),
                Err(e) => RpcResponse::error(request.id, -32603, e.to_string()),
            }
        }
    }
}

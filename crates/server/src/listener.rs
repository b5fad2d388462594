//! Per-connection request handling: one line-delimited JSON request in,
//! one JSON response out, dispatched through the single `TsaState`
//! mutex that serializes command handling (§5).

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use tsa_core::TsaError;
use tsa_server::{
    protocol::{Request, Response, MAX_REQUEST_BYTES},
    TsaState,
};

pub async fn handle_connection(
    mut stream: TcpStream,
    state: Arc<Mutex<TsaState>>,
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), TsaError> {
    let mut buf = vec![0u8; MAX_REQUEST_BYTES];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Ok(());
    }

    // The original lowercases the whole payload before parsing it as JSON.
    let lowered = String::from_utf8_lossy(&buf[..n]).to_lowercase();
    let request: Request = match serde_json::from_str(&lowered) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "malformed request");
            return write_response(&mut stream, &Response::failed("malformed request")).await;
        }
    };

    let argument_string = match &request.arguments {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    info!(command = %request.command, "processing command");

    let mut guard = state.lock().await;
    // Readiness is checked before the command is even dispatched, so
    // every command is gated here, not just the ones that touch the
    // graph/registry directly.
    let response = match guard.ensure_ready().await {
        Err(e) => Err(e),
        Ok(()) => match request.command.as_str() {
            "addpolicychain" => guard.handle_add_policy_chain(&argument_string).await,
            "removepolicychain" => guard.handle_remove_policy_chain(&argument_string).await,
            "unregistermiddleboxcommand" => guard.handle_unregister_middlebox(&argument_string).await,
            "replacedpiinstancecommand" => guard.handle_replace_dpi_instance(&argument_string).await,
            "printdpicontroller" => guard.forward_to_dpi_controller("printdpicontrollerstatuscommand").await,
            "printdpicontrollerfull" => guard.forward_to_dpi_controller("printdpicontrollerfullstatuscommand").await,
            "exit" => {
                let _ = shutdown_tx.send(true);
                Ok(Response::success(""))
            }
            other => Err(TsaError::UnknownCommand(other.to_string())),
        },
    };
    drop(guard);

    let response = response.unwrap_or_else(|e| {
        warn!(error = %e, "command failed");
        match e {
            TsaError::NotReady => Response::failed("Please run pingall"),
            other => Response::failed(other.to_string()),
        }
    });

    write_response(&mut stream, &response).await
}

async fn write_response(stream: &mut TcpStream, response: &Response) -> Result<(), TsaError> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    stream.write_all(line.as_bytes()).await?;
    Ok(())
}

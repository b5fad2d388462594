mod listener;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use tsa_core::Config;
use tsa_server::TsaState;

/// Positional CLI fidelity with the original `<dpiControllerIp>
/// <dpiControllerPort> [debug]` invocation; everything else is
/// configured through the environment (`Config::from_env`).
#[derive(Parser, Debug)]
#[command(name = "tsa", about = "Traffic steering agent")]
struct Args {
    /// DPI controller host, overrides TSA_DPI_CONTROLLER_ADDR's host.
    dpi_controller_ip: Option<String>,
    /// DPI controller port, overrides TSA_DPI_CONTROLLER_ADDR's port.
    dpi_controller_port: Option<u16>,
    /// Verbose logging, overrides TSA_DEBUG.
    #[arg(long, env = "TSA_DEBUG")]
    debug: bool,
}

fn load_config(args: &Args) -> Config {
    tsa_core::config::load_dotenv();
    let mut config = Config::from_env();

    if let (Some(ip), Some(port)) = (&args.dpi_controller_ip, args.dpi_controller_port) {
        match format!("{}:{}", ip, port).parse::<SocketAddr>() {
            Ok(addr) => config.dpi_controller_addr = addr,
            Err(e) => warn!(error = %e, ip, port, "ignoring invalid dpi controller override"),
        }
    }
    if args.debug {
        config.debug = true;
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if std::env::var("TSA_DEBUG").map(|v| v == "true").unwrap_or(false) || args.debug {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let config = load_config(&args);
    info!(listen_addr = %config.listen_addr, sdn_controller_url = %config.sdn_controller_url, "starting tsa");

    let state = Arc::new(Mutex::new(TsaState::new(config.clone())));
    let tcp_listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "listening for FE/DPI-controller connections");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    loop {
        tokio::select! {
            accepted = tcp_listener.accept() => {
                let (stream, peer) = accepted?;
                let state = state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = listener::handle_connection(stream, state, shutdown_tx).await {
                        warn!(error = %e, %peer, "connection handler failed");
                    }
                });
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("exit command received, shutting down");
                    break;
                }
            }
        }
    }

    Ok(())
}

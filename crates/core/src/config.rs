use std::env;
use std::net::SocketAddr;

/// Load `.env` if present (silently ignored when missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Runtime configuration for the TSA back-end.
///
/// Built from environment variables (`Config::from_env`), with the
/// handful of values the original process took as positional CLI
/// arguments (`<dpiControllerIp> <dpiControllerPort> [debug]`)
/// overridable from `tsa-server`'s `clap` parser.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the SDN controller's REST API, e.g. `http://127.0.0.1:8080`.
    pub sdn_controller_url: String,
    /// Address the command server listens on for FE/DPI-controller connections.
    pub listen_addr: SocketAddr,
    /// Address of the peer DPI controller process.
    pub dpi_controller_addr: SocketAddr,
    /// Path to the attachment configuration file (`tsaConfigFile.txt`).
    pub config_file: String,
    /// Verbose logging (`debug` positional argument in the original).
    pub debug: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let sdn_controller_url = env_or("TSA_SDN_CONTROLLER_URL", "http://127.0.0.1:8080");
        let listen_addr = env_or("TSA_LISTEN_ADDR", "10.0.0.101:9093")
            .parse()
            .unwrap_or_else(|_| "0.0.0.0:9093".parse().unwrap());
        let dpi_controller_addr = env_or("TSA_DPI_CONTROLLER_ADDR", "10.0.0.100:9091")
            .parse()
            .unwrap_or_else(|_| "0.0.0.0:9091".parse().unwrap());
        let config_file = env_or("TSA_CONFIG_FILE", "tsaConfigFile.txt");
        let debug = env_or("TSA_DEBUG", "false") == "true";

        Self {
            sdn_controller_url,
            listen_addr,
            dpi_controller_addr,
            config_file,
            debug,
        }
    }
}

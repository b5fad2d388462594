use thiserror::Error;

/// The error taxonomy used across the TSA crates.
///
/// Every fallible internal operation returns `Result<T, TsaError>`. The
/// command server never lets one of these escape its accept loop — it
/// converts the variant into a `failed` JSON response and keeps serving.
#[derive(Error, Debug)]
pub enum TsaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("topology/registry not ready: Please run pingall")]
    NotReady,

    #[error("failed to parse command: {0}")]
    ParseError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("downstream failure: {0}")]
    DownstreamFailure(String),

    #[error("illegal command: {0}")]
    UnknownCommand(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

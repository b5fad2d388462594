//! The peer JSON protocol (§6): newline-delimited `{"command": ...,
//! "arguments": ...}` requests and `{"return value": "success"|
//! "failed", "data": ...}` responses, used identically for TSA-as-
//! server (FE, DPI controller inbound) and TSA-as-client (outbound
//! calls to the DPI controller).

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tsa_core::TsaError;

pub const SUCCESS: &str = "success";
pub const FAILED: &str = "failed";

/// Requests this TCP connection will accept are capped at this many
/// bytes, matching the original's `recv(8096)`.
pub const MAX_REQUEST_BYTES: usize = 8096;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub command: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "return value")]
    pub return_value: String,
    pub data: String,
}

impl Response {
    pub fn success(data: impl Into<String>) -> Self {
        Self {
            return_value: SUCCESS.to_string(),
            data: data.into(),
        }
    }

    pub fn failed(data: impl Into<String>) -> Self {
        Self {
            return_value: FAILED.to_string(),
            data: data.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.return_value.eq_ignore_ascii_case(SUCCESS)
    }
}

/// Connect to `addr`, send `command`/`arguments` as a single
/// newline-terminated JSON line, and read back one response line
/// (§5: "the server may open an outbound TCP connection to the DPI
/// controller, send a JSON request, and block on its reply").
pub async fn send_request(addr: SocketAddr, command: &str, arguments: Value) -> Result<Response, TsaError> {
    let mut stream = TcpStream::connect(addr).await?;
    let request = Request {
        command: command.to_string(),
        arguments,
    };
    let mut line = serde_json::to_string(&request)?;
    line.push('\n');
    stream.write_all(line.as_bytes()).await?;

    let mut buf = vec![0u8; MAX_REQUEST_BYTES];
    let n = stream.read(&mut buf).await?;
    let response: Response = serde_json::from_slice(&buf[..n])?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_envelope_uses_space_in_key() {
        let value = serde_json::to_value(Response::success("ok")).unwrap();
        assert_eq!(value["return value"], "success");
        assert_eq!(value["data"], "ok");
    }

    #[test]
    fn is_success_is_case_insensitive() {
        assert!(Response {
            return_value: "SUCCESS".to_string(),
            data: String::new(),
        }
        .is_success());
    }
}

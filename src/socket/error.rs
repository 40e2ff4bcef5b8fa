use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport and protocol failures of the coordinator socket.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("Transport failed to open: {0}")]
    Open(String),
    #[error("Failed to open coordinator socket. Code: {0}")]
    UnexpectedOpenCode(u16),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Coordinator socket closed. Code: {code}, Reason: {reason}")]
    Closed { code: u16, reason: String },
    #[error("Coordinator socket liveness threshold reached")]
    LivenessThreshold,
    #[error("Connect attempt was cancelled")]
    ConnectCancelled,
}

/// Structured rejection from the server, carried by a `connection.error`
/// event. Kept separate from [`SocketError`] so callers can tell "network
/// broke" from "server rejected us".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("API error {code} (HTTP {status_code}): {message}")]
pub struct ApiError {
    pub code: i32,
    pub message: String,
    #[serde(rename = "StatusCode", alias = "status_code")]
    pub status_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub more_info: Option<String>,
}

use std::time::Duration;

/// Normal-closure code per RFC 6455. A close with this code carries no error.
pub const CLEAN_CLOSE_CODE: u16 = 1000;

/// Configuration for the underlying WebSocket connection.
#[derive(Clone, Debug)]
pub struct SocketConfig {
    /// Coordinator endpoint, e.g. `wss://video.example.com/connect`.
    pub url: String,
    /// Close code treated as a clean shutdown.
    pub clean_close_code: u16,
}

impl SocketConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            clean_close_code: CLEAN_CLOSE_CODE,
        }
    }
}

/// Configuration for the coordinator socket.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub api_key: String,
    pub socket: SocketConfig,
    /// Interval between health-check heartbeats.
    pub health_interval: Duration,
    /// Number of unacknowledged heartbeat ticks before the connection is
    /// declared dead.
    pub liveness_threshold: u32,
    /// Flush interval of the inbound message batcher.
    pub batch_interval: Duration,
}

impl CoordinatorConfig {
    pub fn new(api_key: impl Into<String>, socket: SocketConfig) -> Self {
        Self {
            api_key: api_key.into(),
            socket,
            health_interval: Duration::from_secs(25),
            liveness_threshold: 3,
            batch_interval: Duration::from_millis(300),
        }
    }
}

//! JSON codec for coordinator frames.

use serde::Serialize;

use crate::events::VideoEvent;

/// Encodes outbound messages and decodes inbound frames. Failures are
/// returned, never panicked; the socket decides whether a given failure is
/// fatal (handshake) or droppable (steady state).
#[derive(Debug, Clone, Default)]
pub struct CoordinatorParser;

impl CoordinatorParser {
    pub fn new() -> Self {
        Self
    }

    pub fn encode<T: Serialize>(&self, value: &T) -> Result<String, serde_json::Error> {
        serde_json::to_string(value)
    }

    pub fn decode(&self, text: &str) -> Result<VideoEvent, serde_json::Error> {
        serde_json::from_str(text)
    }
}

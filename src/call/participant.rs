//! Participant projection used by the sort engine.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Ingest protocol of a participant's media. Variant order is the sort rank:
/// RTMP sorts before WHIP, WHIP before SIP, and so on down to WebRTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VideoSource {
    Rtmp,
    Whip,
    Sip,
    Rtsp,
    Srt,
    WebRtc,
}

impl VideoSource {
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

/// Whether a participant's tile is currently rendered on screen. The UI
/// reports this back; until it does, visibility is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    Visible,
    Invisible,
    #[default]
    Unknown,
}

/// Read-only view of one call participant. The sort engine orders references
/// to these, it never mutates them.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    /// Stable identity within the call session.
    pub session_id: String,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub dominant_speaker: bool,
    pub screen_sharing_enabled: bool,
    pub visibility: Visibility,
    pub source: VideoSource,
}

impl Participant {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            joined_at: Utc::now(),
            audio_enabled: false,
            video_enabled: false,
            dominant_speaker: false,
            screen_sharing_enabled: false,
            visibility: Visibility::Unknown,
            source: VideoSource::WebRtc,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }
}

/// Pinned participants: session id to pin timestamp (epoch millis). Owned by
/// the call layer; the comparator only consults membership.
pub type PinMap = HashMap<String, i64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_rank_follows_ingest_order() {
        assert!(VideoSource::Rtmp < VideoSource::Whip);
        assert!(VideoSource::Whip < VideoSource::Sip);
        assert!(VideoSource::Sip < VideoSource::Rtsp);
        assert!(VideoSource::Rtsp < VideoSource::Srt);
        assert!(VideoSource::Srt < VideoSource::WebRtc);
        assert_eq!(VideoSource::Rtmp.rank(), 0);
        assert_eq!(VideoSource::WebRtc.rank(), 5);
    }
}

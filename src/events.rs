//! Wire model of the coordinator protocol.
//!
//! Inbound frames decode to exactly one [`VideoEvent`] variant; outbound
//! traffic is the [`WsAuthMessageRequest`] sent right after the transport
//! opens, plus heartbeats (a re-send of the last [`ConnectedEvent`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::socket::error::ApiError;

/// User payload carried by `connection.ok`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teams: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_user_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Projection of the authenticated user, produced once the handshake
/// completes and carried inside [`crate::socket::ConnectionState::Connected`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedUser {
    pub id: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub language: Option<String>,
    pub role: Option<String>,
    pub teams: Vec<String>,
    pub blocked_user_ids: Vec<String>,
    pub custom: HashMap<String, serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&UserResponse> for ConnectedUser {
    fn from(me: &UserResponse) -> Self {
        Self {
            id: me.id.clone(),
            name: me.name.clone(),
            image: me.image.clone(),
            language: me.language.clone(),
            role: me.role.clone(),
            teams: me.teams.clone(),
            blocked_user_ids: me.blocked_user_ids.clone(),
            custom: me.custom.clone(),
            created_at: me.created_at,
            updated_at: me.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedEvent {
    pub connection_id: String,
    pub me: UserResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionErrorEvent {
    pub error: ApiError,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRingEvent {
    pub call_cid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallAcceptedEvent {
    pub call_cid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRejectedEvent {
    pub call_cid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallCreatedEvent {
    pub call_cid: String,
    #[serde(default)]
    pub ringing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEndedEvent {
    pub call_cid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallUpdatedEvent {
    pub call_cid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLiveStartedEvent {
    pub call_cid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSessionStartedEvent {
    pub call_cid: String,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSessionEndedEvent {
    pub call_cid: String,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSessionParticipantJoinedEvent {
    pub call_cid: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinCallResponseEvent {
    pub call_cid: String,
    #[serde(default)]
    pub created: bool,
}

/// Every event the coordinator can push over the socket. The `type` field of
/// the JSON frame selects the variant; an unknown type is a decode error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VideoEvent {
    #[serde(rename = "connection.ok")]
    Connected(ConnectedEvent),
    #[serde(rename = "connection.error")]
    ConnectionError(ConnectionErrorEvent),
    #[serde(rename = "call.ring")]
    CallRing(CallRingEvent),
    #[serde(rename = "call.accepted")]
    CallAccepted(CallAcceptedEvent),
    #[serde(rename = "call.rejected")]
    CallRejected(CallRejectedEvent),
    #[serde(rename = "call.created")]
    CallCreated(CallCreatedEvent),
    #[serde(rename = "call.ended")]
    CallEnded(CallEndedEvent),
    #[serde(rename = "call.updated")]
    CallUpdated(CallUpdatedEvent),
    #[serde(rename = "call.live_started")]
    CallLiveStarted(CallLiveStartedEvent),
    #[serde(rename = "call.session_started")]
    CallSessionStarted(CallSessionStartedEvent),
    #[serde(rename = "call.session_ended")]
    CallSessionEnded(CallSessionEndedEvent),
    #[serde(rename = "call.session_participant_joined")]
    CallSessionParticipantJoined(CallSessionParticipantJoinedEvent),
    #[serde(rename = "call.join_response")]
    JoinCallResponse(JoinCallResponseEvent),
}

impl VideoEvent {
    /// Call cid the event belongs to, if it is a call-scoped event.
    pub fn call_cid(&self) -> Option<&str> {
        match self {
            VideoEvent::Connected(_) | VideoEvent::ConnectionError(_) => None,
            VideoEvent::CallRing(e) => Some(&e.call_cid),
            VideoEvent::CallAccepted(e) => Some(&e.call_cid),
            VideoEvent::CallRejected(e) => Some(&e.call_cid),
            VideoEvent::CallCreated(e) => Some(&e.call_cid),
            VideoEvent::CallEnded(e) => Some(&e.call_cid),
            VideoEvent::CallUpdated(e) => Some(&e.call_cid),
            VideoEvent::CallLiveStarted(e) => Some(&e.call_cid),
            VideoEvent::CallSessionStarted(e) => Some(&e.call_cid),
            VideoEvent::CallSessionEnded(e) => Some(&e.call_cid),
            VideoEvent::CallSessionParticipantJoined(e) => Some(&e.call_cid),
            VideoEvent::JoinCallResponse(e) => Some(&e.call_cid),
        }
    }
}

/// Everything needed to authenticate a user against the coordinator.
#[derive(Debug, Clone, Default)]
pub struct ConnectUserData {
    pub id: String,
    pub token: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub language: Option<String>,
    pub invisible: bool,
    pub custom: HashMap<String, serde_json::Value>,
}

/// User details section of the auth message. Empty-string fields are elided
/// rather than sent as `""`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectUserDetailsRequest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub invisible: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, serde_json::Value>,
}

/// Auth message sent as the first frame after the transport opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsAuthMessageRequest {
    pub token: String,
    pub user_details: ConnectUserDetailsRequest,
}

impl WsAuthMessageRequest {
    pub fn from_connect_data(data: &ConnectUserData) -> Self {
        fn non_empty(value: &Option<String>) -> Option<String> {
            value.as_deref().filter(|s| !s.is_empty()).map(String::from)
        }
        Self {
            token: data.token.clone(),
            user_details: ConnectUserDetailsRequest {
                id: data.id.clone(),
                name: non_empty(&data.name),
                image: non_empty(&data.image),
                language: non_empty(&data.language),
                invisible: data.invisible,
                custom: data.custom.clone(),
            },
        }
    }
}

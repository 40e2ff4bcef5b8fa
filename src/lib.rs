//! Client SDK core for real-time group video calling.
//!
//! The crate owns the signaling side of a call session: the coordinator
//! WebSocket ([`socket::CoordinatorSocket`]), the ringing state machine
//! ([`call::reducers`]), and the participant ordering engine
//! ([`call::sort::ParticipantSortEngine`]). Media transport (WebRTC) and UI
//! are external collaborators that consume the state this crate publishes.

pub mod batch;
pub mod call;
pub mod config;
pub mod events;
pub mod health;
pub mod http;
pub mod parser;
pub mod socket;
pub mod subscription;
pub mod trace;
pub mod transport;

pub use config::{CoordinatorConfig, SocketConfig};
pub use events::{ConnectUserData, ConnectedUser, VideoEvent};
pub use socket::{ApiError, ConnectionState, CoordinatorSocket, SocketError};
pub use subscription::{Subscription, SubscriptionManager};
pub use trace::Tracer;

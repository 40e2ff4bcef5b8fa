pub mod coordinator;
pub mod error;

pub use coordinator::{
    ConnectedState, ConnectionState, CoordinatorSocket, CoordinatorSocketListener,
    DisconnectedState,
};
pub use error::{ApiError, SocketError};

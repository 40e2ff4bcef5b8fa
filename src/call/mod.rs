//! Call-session state: ringing machine and participant ordering.

pub mod participant;
pub mod reducers;
pub mod ringing;
pub mod sort;

pub use participant::{Participant, PinMap, VideoSource, Visibility};
pub use reducers::{Reduction, RingingReducer, RingingReducers};
pub use ringing::RingingState;
pub use sort::ParticipantSortEngine;

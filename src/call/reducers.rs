//! Per-event ringing state reducers.
//!
//! Every coordinator call event has exactly one reducer. A reducer is a pure
//! function `(state, event) -> Reduction<Output>` where `Output` statically
//! enumerates the states the event can transition to; an event whose reducer
//! output type is uninhabited provably never changes the state. Applying the
//! result to the authoritative state holder is the caller's job.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::ringing::RingingState;
use crate::events::{
    CallAcceptedEvent, CallCreatedEvent, CallEndedEvent, CallLiveStartedEvent, CallRejectedEvent,
    CallRingEvent, CallSessionEndedEvent, CallSessionParticipantJoinedEvent,
    CallSessionStartedEvent, CallUpdatedEvent, JoinCallResponseEvent, VideoEvent,
};

/// Result of reducing one event: either the untouched input state, or one of
/// the transitions the event's reducer declares.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduction<T> {
    NoChange(RingingState),
    Transition(T),
}

impl<T: Into<RingingState>> Reduction<T> {
    /// Collapses the reduction into the resulting ringing state.
    pub fn into_state(self) -> RingingState {
        match self {
            Reduction::NoChange(state) => state,
            Reduction::Transition(transition) => transition.into(),
        }
    }
}

/// Output type of reducers that are reserved no-ops: uninhabited, so the
/// compiler guarantees they only ever produce `NoChange`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoTransition {}

impl From<NoTransition> for RingingState {
    fn from(transition: NoTransition) -> Self {
        match transition {}
    }
}

pub trait RingingReducer {
    type Event;
    type Output: Into<RingingState>;

    fn reduce(&self, state: RingingState, event: &Self::Event) -> Reduction<Self::Output>;
}

/// `call.ring` always lands in `Incoming`, whatever came before.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncomingTransition;

impl From<IncomingTransition> for RingingState {
    fn from(_: IncomingTransition) -> Self {
        RingingState::Incoming {
            accepted_by_me: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct CallRingReducer;

impl RingingReducer for CallRingReducer {
    type Event = CallRingEvent;
    type Output = IncomingTransition;

    fn reduce(&self, _state: RingingState, _event: &CallRingEvent) -> Reduction<Self::Output> {
        Reduction::Transition(IncomingTransition)
    }
}

/// `call.accepted` either goes live here or on another device, depending on
/// where the accept happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcceptedTransition {
    Active,
    ActiveOnOtherDevice,
}

impl From<AcceptedTransition> for RingingState {
    fn from(transition: AcceptedTransition) -> Self {
        match transition {
            AcceptedTransition::Active => RingingState::Active,
            AcceptedTransition::ActiveOnOtherDevice => RingingState::ActiveOnOtherDevice,
        }
    }
}

/// Reducer for `call.accepted`. The accepted-on-this-device flag is
/// call-scoped state owned by the call layer and injected at construction.
pub struct CallAcceptedReducer {
    accepted_on_this_device: Arc<AtomicBool>,
}

impl CallAcceptedReducer {
    pub fn new(accepted_on_this_device: Arc<AtomicBool>) -> Self {
        Self {
            accepted_on_this_device,
        }
    }
}

impl RingingReducer for CallAcceptedReducer {
    type Event = CallAcceptedEvent;
    type Output = AcceptedTransition;

    fn reduce(&self, _state: RingingState, _event: &CallAcceptedEvent) -> Reduction<Self::Output> {
        if self.accepted_on_this_device.load(Ordering::SeqCst) {
            Reduction::Transition(AcceptedTransition::Active)
        } else {
            Reduction::Transition(AcceptedTransition::ActiveOnOtherDevice)
        }
    }
}

// The reducers below keep their typed slot but do not transition today.
// Each can grow its own transition without touching the others.

macro_rules! no_change_reducer {
    ($(#[$doc:meta])* $name:ident, $event:ty) => {
        $(#[$doc])*
        #[derive(Debug, Default)]
        pub struct $name;

        impl RingingReducer for $name {
            type Event = $event;
            type Output = NoTransition;

            fn reduce(&self, state: RingingState, _event: &$event) -> Reduction<Self::Output> {
                Reduction::NoChange(state)
            }
        }
    };
}

no_change_reducer!(CallCreatedReducer, CallCreatedEvent);
no_change_reducer!(
    /// Reserved: ended calls will eventually clear the ringing phase.
    CallEndedReducer,
    CallEndedEvent
);
no_change_reducer!(
    /// Reserved: a rejection by the final callee will move to `RejectedByAll`.
    CallRejectedReducer,
    CallRejectedEvent
);
no_change_reducer!(CallUpdatedReducer, CallUpdatedEvent);
no_change_reducer!(CallLiveStartedReducer, CallLiveStartedEvent);
no_change_reducer!(CallSessionStartedReducer, CallSessionStartedEvent);
no_change_reducer!(CallSessionEndedReducer, CallSessionEndedEvent);
no_change_reducer!(
    CallSessionParticipantJoinedReducer,
    CallSessionParticipantJoinedEvent
);
no_change_reducer!(JoinCallResponseReducer, JoinCallResponseEvent);

/// One reducer per event type, routed from a decoded [`VideoEvent`].
///
/// Adding a new call event means adding a field here and wiring it in
/// [`RingingReducers::apply`]; there is no silent fallthrough for call
/// events.
pub struct RingingReducers {
    pub ring: CallRingReducer,
    pub accepted: CallAcceptedReducer,
    pub created: CallCreatedReducer,
    pub ended: CallEndedReducer,
    pub rejected: CallRejectedReducer,
    pub updated: CallUpdatedReducer,
    pub live_started: CallLiveStartedReducer,
    pub session_started: CallSessionStartedReducer,
    pub session_ended: CallSessionEndedReducer,
    pub session_participant_joined: CallSessionParticipantJoinedReducer,
    pub join_response: JoinCallResponseReducer,
}

impl RingingReducers {
    pub fn new(accepted_on_this_device: Arc<AtomicBool>) -> Self {
        Self {
            ring: CallRingReducer,
            accepted: CallAcceptedReducer::new(accepted_on_this_device),
            created: CallCreatedReducer,
            ended: CallEndedReducer,
            rejected: CallRejectedReducer,
            updated: CallUpdatedReducer,
            live_started: CallLiveStartedReducer,
            session_started: CallSessionStartedReducer,
            session_ended: CallSessionEndedReducer,
            session_participant_joined: CallSessionParticipantJoinedReducer,
            join_response: JoinCallResponseReducer,
        }
    }

    /// Computes the ringing state after `event`. Connection lifecycle events
    /// are not call events and leave the state alone.
    pub fn apply(&self, state: RingingState, event: &VideoEvent) -> RingingState {
        match event {
            VideoEvent::CallRing(e) => self.ring.reduce(state, e).into_state(),
            VideoEvent::CallAccepted(e) => self.accepted.reduce(state, e).into_state(),
            VideoEvent::CallCreated(e) => self.created.reduce(state, e).into_state(),
            VideoEvent::CallEnded(e) => self.ended.reduce(state, e).into_state(),
            VideoEvent::CallRejected(e) => self.rejected.reduce(state, e).into_state(),
            VideoEvent::CallUpdated(e) => self.updated.reduce(state, e).into_state(),
            VideoEvent::CallLiveStarted(e) => self.live_started.reduce(state, e).into_state(),
            VideoEvent::CallSessionStarted(e) => self.session_started.reduce(state, e).into_state(),
            VideoEvent::CallSessionEnded(e) => self.session_ended.reduce(state, e).into_state(),
            VideoEvent::CallSessionParticipantJoined(e) => {
                self.session_participant_joined.reduce(state, e).into_state()
            }
            VideoEvent::JoinCallResponse(e) => self.join_response.reduce(state, e).into_state(),
            VideoEvent::Connected(_) | VideoEvent::ConnectionError(_) => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_event() -> CallRingEvent {
        CallRingEvent {
            call_cid: "default:1".into(),
            session_id: None,
            user: None,
        }
    }

    fn accepted_event() -> CallAcceptedEvent {
        CallAcceptedEvent {
            call_cid: "default:1".into(),
            user: None,
        }
    }

    fn all_states() -> Vec<RingingState> {
        vec![
            RingingState::Idle,
            RingingState::Incoming {
                accepted_by_me: true,
            },
            RingingState::Incoming {
                accepted_by_me: false,
            },
            RingingState::Outgoing {
                accepted_by_callee: false,
            },
            RingingState::Active,
            RingingState::ActiveOnOtherDevice,
            RingingState::RejectedByAll,
        ]
    }

    /// `call.ring` lands in `Incoming(accepted_by_me=false)` from any state.
    #[test]
    fn ring_reducer_is_input_independent() {
        let reducer = CallRingReducer;
        for state in all_states() {
            let result = reducer.reduce(state, &ring_event()).into_state();
            assert_eq!(
                result,
                RingingState::Incoming {
                    accepted_by_me: false
                }
            );
        }
    }

    #[test]
    fn accepted_reducer_follows_the_device_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        let reducer = CallAcceptedReducer::new(flag.clone());

        let result = reducer.reduce(RingingState::Idle, &accepted_event());
        assert_eq!(result, Reduction::Transition(AcceptedTransition::Active));
        assert_eq!(result.into_state(), RingingState::Active);

        flag.store(false, Ordering::SeqCst);
        let result = reducer.reduce(RingingState::Idle, &accepted_event());
        assert_eq!(result.into_state(), RingingState::ActiveOnOtherDevice);
    }

    /// No-op reducers hand back the exact input state.
    #[test]
    fn reserved_reducers_return_no_change() {
        for state in all_states() {
            let result = CallEndedReducer.reduce(
                state.clone(),
                &CallEndedEvent {
                    call_cid: "default:1".into(),
                    user: None,
                },
            );
            assert_eq!(result, Reduction::NoChange(state));
        }
    }

    /// Every declared event type routes to a reducer and yields a state,
    /// never panicking, for every input state.
    #[test]
    fn reducer_set_is_total_over_all_events() {
        let reducers = RingingReducers::new(Arc::new(AtomicBool::new(false)));
        let events: Vec<VideoEvent> = vec![
            VideoEvent::CallRing(ring_event()),
            VideoEvent::CallAccepted(accepted_event()),
            VideoEvent::CallCreated(CallCreatedEvent {
                call_cid: "default:1".into(),
                ringing: true,
            }),
            VideoEvent::CallEnded(CallEndedEvent {
                call_cid: "default:1".into(),
                user: None,
            }),
            VideoEvent::CallRejected(CallRejectedEvent {
                call_cid: "default:1".into(),
                user: None,
                reason: None,
            }),
            VideoEvent::CallUpdated(CallUpdatedEvent {
                call_cid: "default:1".into(),
            }),
            VideoEvent::CallLiveStarted(CallLiveStartedEvent {
                call_cid: "default:1".into(),
            }),
            VideoEvent::CallSessionStarted(CallSessionStartedEvent {
                call_cid: "default:1".into(),
                session_id: "s1".into(),
            }),
            VideoEvent::CallSessionEnded(CallSessionEndedEvent {
                call_cid: "default:1".into(),
                session_id: "s1".into(),
            }),
            VideoEvent::CallSessionParticipantJoined(CallSessionParticipantJoinedEvent {
                call_cid: "default:1".into(),
                session_id: "s1".into(),
                user: None,
            }),
            VideoEvent::JoinCallResponse(JoinCallResponseEvent {
                call_cid: "default:1".into(),
                created: false,
            }),
        ];

        for state in all_states() {
            for event in &events {
                let _ = reducers.apply(state.clone(), event);
            }
        }
    }

    /// Only ring and accepted change state today; the rest leave it alone.
    #[test]
    fn apply_keeps_state_for_reserved_events() {
        let reducers = RingingReducers::new(Arc::new(AtomicBool::new(false)));
        let state = RingingState::Outgoing {
            accepted_by_callee: false,
        };
        let event = VideoEvent::CallUpdated(CallUpdatedEvent {
            call_cid: "default:1".into(),
        });
        assert_eq!(reducers.apply(state.clone(), &event), state);
    }
}

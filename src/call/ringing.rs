//! Ringing phase of a call.

use serde::Serialize;

/// Current ringing phase. Exactly one value is live per call; the call-state
/// layer owns it and advances it by feeding inbound events through the
/// reducers in [`super::reducers`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub enum RingingState {
    /// No ringing activity.
    #[default]
    Idle,
    /// Someone is calling us.
    Incoming { accepted_by_me: bool },
    /// We are calling someone.
    Outgoing { accepted_by_callee: bool },
    /// Call is live on this device.
    Active,
    /// Call was accepted on another device of the same user.
    ActiveOnOtherDevice,
    /// Every callee rejected the call.
    RejectedByAll,
}

impl RingingState {
    pub fn is_ringing(&self) -> bool {
        matches!(self, Self::Incoming { .. } | Self::Outgoing { .. })
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn can_accept(&self) -> bool {
        matches!(
            self,
            Self::Incoming {
                accepted_by_me: false
            }
        )
    }
}

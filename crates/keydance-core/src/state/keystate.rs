// Keydance Key State
// Tracking record for one in-flight macro key and its stage

use std::fmt;

use strum_macros::{Display, EnumIter};

use crate::host::TimerToken;
use crate::policy::TimeoutKind;
use crate::{Key, KeyPos, Mods};

/// Stage of an in-flight macro key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Stage {
    /// Not tracked
    #[strum(serialize = "STAGE_NONE")]
    None,
    /// Macro key is down, nothing else happened yet
    #[strum(serialize = "STAGE_TOUCH")]
    Touch,
    /// Macro key was tapped; waiting for another tap of the same key
    #[strum(serialize = "STAGE_SEQUENCE")]
    Sequence,
    /// Macro key is down and a following key went down after it
    #[strum(serialize = "STAGE_FOL_TOUCH")]
    FollowingTouch,
    /// Macro key resolved to a hold and is still down
    #[strum(serialize = "STAGE_HOLD")]
    Hold,
    /// Macro key went up while the following key is still down
    #[strum(serialize = "STAGE_RELEASE")]
    Release,
}

/// The key that went down while the macro key was ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowingKey {
    pub pos: KeyPos,
    pub key: Key,
}

/// The single timer a record may have armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimeout {
    pub token: TimerToken,
    pub kind: TimeoutKind,
}

/// Re-entrancy guard of a record.
///
/// A frozen record is replaying synthesized events and ignores everything
/// that reaches the dispatcher until it thaws, so it never reacts to its own
/// output. Other records still see those events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Guard {
    #[default]
    Open,
    Frozen,
}

/// Tracking record for one in-flight macro key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyState {
    /// The macro key this record tracks
    pub key: Key,
    pub stage: Stage,
    /// Count of same-key taps in the current sequence, 0-based
    pub sequence_len: u8,
    /// Modifiers active right before the TOUCH action ran
    pub mods_before_touch: Mods,
    /// Modifiers the TOUCH action itself switched on
    pub mods_with_touch: Mods,
    pub following: Option<FollowingKey>,
    pub timeout: Option<PendingTimeout>,
    pub guard: Guard,
}

impl KeyState {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            stage: Stage::None,
            sequence_len: 0,
            mods_before_touch: Mods::empty(),
            mods_with_touch: Mods::empty(),
            following: None,
            timeout: None,
            guard: Guard::Open,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.guard == Guard::Frozen
    }

    /// Whether `pos` is where the following key sits
    pub fn is_following_pos(&self, pos: KeyPos) -> bool {
        self.following.is_some_and(|f| f.pos == pos)
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KeyState(key={}, stage={}, seq={}",
            self.key, self.stage, self.sequence_len
        )?;
        if let Some(following) = self.following {
            write!(f, ", following={}@{}", following.key, following.pos)?;
        }
        if let Some(timeout) = self.timeout {
            write!(f, ", timeout={} {}", timeout.kind, timeout.token)?;
        }
        if self.is_frozen() {
            write!(f, ", frozen")?;
        }
        write!(f, ")")
    }
}

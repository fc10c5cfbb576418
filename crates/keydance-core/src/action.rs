// Keydance Actions
// Key events from the host and the actions the engine emits

use std::fmt;

use crate::{Key, KeyPos};

/// Represents the edge of a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Release,
    Press,
}

impl Action {
    /// Returns true if this is a PRESS event
    pub fn is_pressed(self) -> bool {
        matches!(self, Action::Press)
    }

    /// Returns true if this is a RELEASE event
    pub fn is_released(self) -> bool {
        matches!(self, Action::Release)
    }

    pub fn from_pressed(pressed: bool) -> Self {
        if pressed {
            Action::Press
        } else {
            Action::Release
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Release => write!(f, "released"),
            Action::Press => write!(f, "pressed"),
        }
    }
}

/// A single key event flowing through the host pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Key id as resolved by the host for this event
    pub key: Key,
    /// Physical matrix position that produced the event
    pub pos: KeyPos,
    pub action: Action,
}

impl KeyEvent {
    pub fn new(key: Key, pos: KeyPos, action: Action) -> Self {
        Self { key, pos, action }
    }

    pub fn press(key: Key, pos: KeyPos) -> Self {
        Self::new(key, pos, Action::Press)
    }

    pub fn release(key: Key, pos: KeyPos) -> Self {
        Self::new(key, pos, Action::Release)
    }

    pub fn is_pressed(&self) -> bool {
        self.action.is_pressed()
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} {}", self.key, self.pos, self.action)
    }
}

/// What a macro key resolved to, as reported to the action sink.
///
/// The sink decides what each of these produces for a given key and
/// sequence length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroAction {
    /// The macro key went down and is not yet resolved
    Touch,
    /// The macro key resolved to a tap
    Tap,
    /// The macro key resolved to a hold
    Hold,
    /// A held macro key was released
    Release,
}

impl fmt::Display for MacroAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroAction::Touch => write!(f, "ACT_TOUCH"),
            MacroAction::Tap => write!(f, "ACT_TAP"),
            MacroAction::Hold => write!(f, "ACT_HOLD"),
            MacroAction::Release => write!(f, "ACT_RELEASE"),
        }
    }
}

// Keydance Host Interfaces
//
// The core never owns the key pipeline, modifier state, layers or timers.
// It reaches them through these traits, which the host implements.

use std::fmt;

use crate::{Action, Key, KeyEvent, KeyPos, MacroAction, Mods};

/// Opaque handle for a scheduled timer callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(pub u32);

impl fmt::Display for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The host key-event pipeline.
pub trait EventPipeline {
    /// Resolve the key id a matrix position produces right now
    fn key_at(&self, pos: KeyPos) -> Key;

    /// Resolve the key for an event at `pos`.
    ///
    /// A release must report the key its press produced even when the
    /// layer changed in between. Hosts that remember held positions
    /// override this; the default looks at the current layer state.
    fn resolve(&mut self, pos: KeyPos, _action: Action) -> Key {
        self.key_at(pos)
    }

    /// Default host handling for an event the core did not consume
    fn forward(&mut self, event: KeyEvent);

    /// Block for `delay_ms` so the host can settle between synthesized events
    fn settle(&mut self, delay_ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(delay_ms)));
    }
}

/// Global modifier state and report flushing.
pub trait ModifierService {
    fn mods(&self) -> Mods;

    fn set_mods(&mut self, mods: Mods);

    /// Flush the current report to the output
    fn send_report(&mut self);

    fn add_mods(&mut self, mods: Mods) {
        let current = self.mods();
        self.set_mods(current | mods);
    }

    fn del_mods(&mut self, mods: Mods) {
        let current = self.mods();
        self.set_mods(current & !mods);
    }
}

/// Deferred callback scheduling.
///
/// When a scheduled timer comes due the host hands its token back to
/// [`Engine::on_timeout`](crate::Engine::on_timeout).
pub trait TimerService {
    fn schedule(&mut self, delay_ms: u32) -> TimerToken;

    /// Cancel a pending timer. Unknown or already-fired tokens are ignored.
    fn cancel(&mut self, token: TimerToken);
}

/// Receives every resolved macro action.
pub trait ActionSink {
    fn on_action(&mut self, key: Key, action: MacroAction, sequence_len: u8);
}

/// Layer switching.
pub trait LayerService {
    fn highest_layer(&self) -> u8;

    fn layer_move(&mut self, layer: u8);
}

/// A key together with the modifiers it is sent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Keystroke {
    pub key: Key,
    pub mods: Mods,
}

impl Keystroke {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            mods: Mods::empty(),
        }
    }

    pub fn with_mods(key: Key, mods: Mods) -> Self {
        Self { key, mods }
    }
}

impl fmt::Display for Keystroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mods.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}-{}", self.mods, self.key)
        }
    }
}

/// Plain keystroke output used by behaviors.
pub trait KeyOutput {
    fn register_code(&mut self, stroke: Keystroke);

    fn unregister_code(&mut self, stroke: Keystroke);

    fn tap_code(&mut self, stroke: Keystroke) {
        self.register_code(stroke);
        self.unregister_code(stroke);
    }

    /// Whether caps word is active, which shifts tapped letters
    fn caps_word_on(&self) -> bool {
        false
    }
}

/// Everything the state machine needs from its host.
pub trait Host: EventPipeline + ModifierService + TimerService + ActionSink {}

impl<T> Host for T where T: EventPipeline + ModifierService + TimerService + ActionSink {}

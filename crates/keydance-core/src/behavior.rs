// Keydance Behaviors
// Ready-made action handlers for the common tap/hold key shapes
//
// A behavior turns the engine's TOUCH/TAP/HOLD/RELEASE actions for one
// macro key into keystrokes, modifier changes or layer switches.

use std::fmt;

use indexmap::IndexMap;

use crate::host::{KeyOutput, Keystroke, LayerService, ModifierService};
use crate::layer::LayerReturn;
use crate::{Key, MacroAction, Mods};

/// Sequence length at which a behavior stops acting as modifier or layer
/// and holds its tap key instead. The default never triggers in practice.
pub const DEFAULT_THRESHOLD: u16 = 1000;

/// What a macro key does for each action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Tap sends `tap`, hold works as `mods`
    ModTap {
        tap: Key,
        mods: Mods,
        threshold: u16,
        caps_word: bool,
    },
    /// Like `ModTap`, but `mods` switch on as soon as the key goes down
    ModTapEager {
        tap: Key,
        mods: Mods,
        threshold: u16,
        caps_word: bool,
    },
    /// Tap sends `tap`, hold switches to `layer`
    LayerTap {
        tap: Key,
        layer: u8,
        threshold: u16,
        caps_word: bool,
    },
}

impl Behavior {
    pub fn mod_tap(tap: Key, mods: Mods) -> Self {
        Behavior::ModTap {
            tap,
            mods,
            threshold: DEFAULT_THRESHOLD,
            caps_word: true,
        }
    }

    pub fn mod_tap_eager(tap: Key, mods: Mods) -> Self {
        Behavior::ModTapEager {
            tap,
            mods,
            threshold: DEFAULT_THRESHOLD,
            caps_word: true,
        }
    }

    pub fn layer_tap(tap: Key, layer: u8) -> Self {
        Behavior::LayerTap {
            tap,
            layer,
            threshold: DEFAULT_THRESHOLD,
            caps_word: true,
        }
    }

    /// Replace the threshold
    pub fn with_threshold(mut self, value: u16) -> Self {
        match &mut self {
            Behavior::ModTap { threshold, .. }
            | Behavior::ModTapEager { threshold, .. }
            | Behavior::LayerTap { threshold, .. } => *threshold = value,
        }
        self
    }

    /// Enable or disable caps-word shifting of the tap key
    pub fn with_caps_word(mut self, enabled: bool) -> Self {
        match &mut self {
            Behavior::ModTap { caps_word, .. }
            | Behavior::ModTapEager { caps_word, .. }
            | Behavior::LayerTap { caps_word, .. } => *caps_word = enabled,
        }
        self
    }

    pub fn tap_key(&self) -> Key {
        match *self {
            Behavior::ModTap { tap, .. }
            | Behavior::ModTapEager { tap, .. }
            | Behavior::LayerTap { tap, .. } => tap,
        }
    }

    /// Run this behavior for one action.
    pub fn apply<H>(
        &self,
        host: &mut H,
        layer_return: &mut LayerReturn,
        action: MacroAction,
        sequence_len: u8,
    ) where
        H: ModifierService + LayerService + KeyOutput + ?Sized,
    {
        match *self {
            Behavior::ModTap {
                tap,
                mods,
                threshold,
                caps_word,
            } => {
                let stroke = stroke_for(host, tap, caps_word);
                let below = u16::from(sequence_len) < threshold;
                match action {
                    MacroAction::Touch => {}
                    MacroAction::Tap => host.tap_code(stroke),
                    MacroAction::Hold if below => register_mods(host, mods),
                    MacroAction::Hold => host.register_code(stroke),
                    MacroAction::Release if below => unregister_mods(host, mods),
                    MacroAction::Release => {
                        host.unregister_code(stroke);
                        host.send_report();
                    }
                }
            }

            Behavior::ModTapEager {
                tap,
                mods,
                threshold,
                caps_word,
            } => {
                let stroke = stroke_for(host, tap, caps_word);
                let below = u16::from(sequence_len) < threshold;
                match action {
                    MacroAction::Touch => register_mods(host, mods),
                    MacroAction::Tap => {
                        unregister_mods(host, mods);
                        host.tap_code(stroke);
                    }
                    // A touch re-entered from a sequence sends no TOUCH,
                    // so the mods may not be on yet
                    MacroAction::Hold if below => register_mods(host, mods),
                    MacroAction::Hold => {
                        unregister_mods(host, mods);
                        host.register_code(stroke);
                    }
                    MacroAction::Release if below => unregister_mods(host, mods),
                    MacroAction::Release => host.unregister_code(stroke),
                }
            }

            Behavior::LayerTap {
                tap,
                layer,
                threshold,
                caps_word,
            } => {
                let stroke = stroke_for(host, tap, caps_word);
                let below = u16::from(sequence_len) < threshold;
                match action {
                    MacroAction::Touch => {}
                    MacroAction::Tap => host.tap_code(stroke),
                    MacroAction::Hold if below => layer_return.push(host, layer),
                    MacroAction::Hold => host.register_code(stroke),
                    MacroAction::Release => {
                        if below {
                            layer_return.restore(host);
                        }
                        host.unregister_code(stroke);
                    }
                }
            }
        }
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::ModTap { tap, mods, .. } => write!(f, "mod_tap({}, {})", tap, mods),
            Behavior::ModTapEager { tap, mods, .. } => {
                write!(f, "mod_tap_eager({}, {})", tap, mods)
            }
            Behavior::LayerTap { tap, layer, .. } => write!(f, "layer_tap({}, {})", tap, layer),
        }
    }
}

fn stroke_for<H: KeyOutput + ?Sized>(host: &H, tap: Key, caps_word: bool) -> Keystroke {
    if caps_word && host.caps_word_on() {
        Keystroke::with_mods(tap, Mods::LSHIFT)
    } else {
        Keystroke::new(tap)
    }
}

fn register_mods<H: ModifierService + ?Sized>(host: &mut H, mods: Mods) {
    host.add_mods(mods);
    host.send_report();
}

fn unregister_mods<H: ModifierService + ?Sized>(host: &mut H, mods: Mods) {
    host.del_mods(mods);
    host.send_report();
}

/// Behaviors keyed by macro key, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct Behaviors {
    map: IndexMap<Key, Behavior>,
}

impl Behaviors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Key, behavior: Behavior) -> Option<Behavior> {
        self.map.insert(key, behavior)
    }

    pub fn with(mut self, key: Key, behavior: Behavior) -> Self {
        self.insert(key, behavior);
        self
    }

    pub fn get(&self, key: Key) -> Option<&Behavior> {
        self.map.get(&key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.map.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, &Behavior)> {
        self.map.iter().map(|(k, b)| (*k, b))
    }

    /// Run the behavior bound to `key`. Returns false when there is none.
    pub fn apply<H>(
        &self,
        host: &mut H,
        layer_return: &mut LayerReturn,
        key: Key,
        action: MacroAction,
        sequence_len: u8,
    ) -> bool
    where
        H: ModifierService + LayerService + KeyOutput + ?Sized,
    {
        match self.map.get(&key) {
            Some(behavior) => {
                log::trace!("{} {} -> {}", key, action, behavior);
                behavior.apply(host, layer_return, action, sequence_len);
                true
            }
            None => false,
        }
    }
}

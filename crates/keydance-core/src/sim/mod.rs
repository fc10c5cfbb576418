// Keydance Simulator
// Deterministic in-memory host and driver for replaying key traces
//
// `VirtualHost` implements every host trait on top of layered keymaps, a
// modifier byte and a virtual-clock timer queue, and records what the
// engine made it do. `Simulator` pairs it with an `Engine`.

mod script;

pub use script::{Command, Script, ScriptError, Step};

use std::collections::HashMap;
use std::fmt;

use crate::behavior::Behaviors;
use crate::engine::Engine;
use crate::host::{
    ActionSink, EventPipeline, KeyOutput, Keystroke, LayerService, ModifierService, TimerService,
    TimerToken,
};
use crate::layer::LayerReturn;
use crate::timer::DeferredExecutor;
use crate::{Action, Key, KeyEvent, KeyPos, MacroAction, Mods};

/// One layer: what each matrix position produces
pub type Keymap = HashMap<KeyPos, Key>;

/// Everything observable the host did, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    Action {
        key: Key,
        action: MacroAction,
        sequence_len: u8,
    },
    /// An event the engine did not consume reached default handling
    Forwarded(KeyEvent),
    Report(Mods),
    Register(Keystroke),
    Unregister(Keystroke),
    Settle(u32),
    LayerMove(u8),
}

impl OutputEvent {
    pub fn action(key: Key, action: MacroAction, sequence_len: u8) -> Self {
        OutputEvent::Action {
            key,
            action,
            sequence_len,
        }
    }

    pub fn forwarded(key: Key, pos: KeyPos, action: Action) -> Self {
        OutputEvent::Forwarded(KeyEvent::new(key, pos, action))
    }
}

impl fmt::Display for OutputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputEvent::Action {
                key,
                action,
                sequence_len,
            } => write!(f, "{} {} seq={}", action, key, sequence_len),
            OutputEvent::Forwarded(event) => write!(f, "KEY {}", event),
            OutputEvent::Report(mods) => write!(f, "REPORT {}", mods),
            OutputEvent::Register(stroke) => write!(f, "REGISTER {}", stroke),
            OutputEvent::Unregister(stroke) => write!(f, "UNREGISTER {}", stroke),
            OutputEvent::Settle(ms) => write!(f, "SETTLE {}ms", ms),
            OutputEvent::LayerMove(layer) => write!(f, "LAYER {}", layer),
        }
    }
}

/// In-memory host with a virtual clock.
#[derive(Debug, Clone, Default)]
pub struct VirtualHost {
    layers: Vec<Keymap>,
    layer: u8,
    mods: Mods,
    caps_word: bool,
    timers: DeferredExecutor,
    layer_return: LayerReturn,
    behaviors: Behaviors,
    /// Key each held position produced when it went down
    held: HashMap<KeyPos, Key>,
    output: Vec<OutputEvent>,
}

impl VirtualHost {
    /// Create a host; `layers[0]` is the base layer.
    pub fn new(layers: Vec<Keymap>) -> Self {
        Self {
            layers,
            ..Self::default()
        }
    }

    pub fn with_behaviors(mut self, behaviors: Behaviors) -> Self {
        self.behaviors = behaviors;
        self
    }

    pub fn layer(&self) -> u8 {
        self.layer
    }

    pub fn set_caps_word(&mut self, on: bool) {
        self.caps_word = on;
    }

    pub fn timers(&self) -> &DeferredExecutor {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut DeferredExecutor {
        &mut self.timers
    }

    pub fn output(&self) -> &[OutputEvent] {
        &self.output
    }

    pub fn drain_output(&mut self) -> Vec<OutputEvent> {
        std::mem::take(&mut self.output)
    }

    /// Key a held position was resolved to on press
    pub fn held_key(&self, pos: KeyPos) -> Option<Key> {
        self.held.get(&pos).copied()
    }
}

impl EventPipeline for VirtualHost {
    /// Falls through to lower layers where the active one has no entry
    fn key_at(&self, pos: KeyPos) -> Key {
        let top = usize::from(self.layer).min(self.layers.len().saturating_sub(1));
        self.layers
            .iter()
            .take(top + 1)
            .rev()
            .find_map(|map| map.get(&pos).copied())
            .unwrap_or_else(|| {
                log::trace!("nothing mapped at {}", pos);
                Key(0)
            })
    }

    /// Presses are cached per position so the release reports the same key
    fn resolve(&mut self, pos: KeyPos, action: Action) -> Key {
        match action {
            Action::Press => {
                let key = self.key_at(pos);
                self.held.insert(pos, key);
                key
            }
            Action::Release => self.held.remove(&pos).unwrap_or_else(|| self.key_at(pos)),
        }
    }

    fn forward(&mut self, event: KeyEvent) {
        if let Some(mods) = Mods::from_key(event.key) {
            if event.is_pressed() {
                self.mods |= mods;
            } else {
                self.mods &= !mods;
            }
        }
        self.output.push(OutputEvent::Forwarded(event));
    }

    fn settle(&mut self, delay_ms: u32) {
        self.output.push(OutputEvent::Settle(delay_ms));
    }
}

impl ModifierService for VirtualHost {
    fn mods(&self) -> Mods {
        self.mods
    }

    fn set_mods(&mut self, mods: Mods) {
        self.mods = mods;
    }

    fn send_report(&mut self) {
        self.output.push(OutputEvent::Report(self.mods));
    }
}

impl TimerService for VirtualHost {
    fn schedule(&mut self, delay_ms: u32) -> TimerToken {
        self.timers.schedule(delay_ms)
    }

    fn cancel(&mut self, token: TimerToken) {
        self.timers.cancel(token);
    }
}

impl ActionSink for VirtualHost {
    fn on_action(&mut self, key: Key, action: MacroAction, sequence_len: u8) {
        self.output
            .push(OutputEvent::action(key, action, sequence_len));

        // Behaviors drive this host, so lift them out while they run
        let behaviors = std::mem::take(&mut self.behaviors);
        let mut layer_return = self.layer_return;
        behaviors.apply(self, &mut layer_return, key, action, sequence_len);
        self.layer_return = layer_return;
        self.behaviors = behaviors;
    }
}

impl LayerService for VirtualHost {
    fn highest_layer(&self) -> u8 {
        self.layer
    }

    fn layer_move(&mut self, layer: u8) {
        self.layer = layer;
        self.output.push(OutputEvent::LayerMove(layer));
    }
}

impl KeyOutput for VirtualHost {
    fn register_code(&mut self, stroke: Keystroke) {
        self.output.push(OutputEvent::Register(stroke));
    }

    fn unregister_code(&mut self, stroke: Keystroke) {
        self.output.push(OutputEvent::Unregister(stroke));
    }

    fn caps_word_on(&self) -> bool {
        self.caps_word
    }
}

/// Drives an [`Engine`] against a [`VirtualHost`] on virtual time.
#[derive(Debug)]
pub struct Simulator {
    engine: Engine,
    host: VirtualHost,
}

impl Simulator {
    pub fn new(engine: Engine, host: VirtualHost) -> Self {
        Self { engine, host }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn host(&self) -> &VirtualHost {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut VirtualHost {
        &mut self.host
    }

    /// Current virtual time in milliseconds
    pub fn now(&self) -> u64 {
        self.host.timers.now()
    }

    /// Press the key at `pos`. Returns whether the engine consumed it.
    pub fn press(&mut self, pos: KeyPos) -> bool {
        self.event(pos, Action::Press)
    }

    /// Release the key at `pos`. Returns whether the engine consumed it.
    pub fn release(&mut self, pos: KeyPos) -> bool {
        self.event(pos, Action::Release)
    }

    /// Press and release at the same instant
    pub fn tap(&mut self, pos: KeyPos) {
        self.press(pos);
        self.release(pos);
    }

    fn event(&mut self, pos: KeyPos, action: Action) -> bool {
        let event = KeyEvent::new(self.host.resolve(pos, action), pos, action);
        let consumed = self.engine.process_event(&mut self.host, event);
        if !consumed {
            self.host.forward(event);
        }
        consumed
    }

    /// Let `ms` pass, firing due timers in deadline order
    pub fn advance(&mut self, ms: u64) {
        let target = self.now() + ms;
        self.advance_to(target);
    }

    /// Let time pass up to `at_ms`. Each timer fires at its own deadline, so
    /// timers armed by a firing one are measured from that moment.
    pub fn advance_to(&mut self, at_ms: u64) {
        while self.fire_next(at_ms).is_some() {}
        self.host.timers.advance_to(at_ms);
    }

    /// Fire the earliest timer due by `until_ms`, if any.
    ///
    /// Returns the virtual time it fired at; the clock stays there.
    pub fn fire_next(&mut self, until_ms: u64) -> Option<u64> {
        let token = self.host.timers.pop_due(until_ms)?;
        let at_ms = self.now();
        self.engine.on_timeout(&mut self.host, token);
        Some(at_ms)
    }

    /// Run one script command at the current time
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Press(pos) => {
                self.press(pos);
            }
            Command::Release(pos) => {
                self.release(pos);
            }
            Command::Tap(pos) => self.tap(pos),
            Command::Wait => {}
        }
    }

    /// Replay a whole script
    pub fn run(&mut self, script: &Script) {
        for step in script.steps() {
            self.advance_to(step.at_ms);
            log::debug!("@{}ms {}", step.at_ms, step.command);
            self.apply(step.command);
        }
    }

    /// Drop all engine state and pending timers
    pub fn reset(&mut self) {
        self.engine.reset(&mut self.host);
    }

    pub fn output(&self) -> &[OutputEvent] {
        self.host.output()
    }

    pub fn drain_output(&mut self) -> Vec<OutputEvent> {
        self.host.drain_output()
    }
}

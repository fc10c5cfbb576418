// Keydance Core Library
// Tap/hold/sequence disambiguation for macro keys

pub mod action;
pub mod behavior;
pub mod config;
pub mod engine;
pub mod host;
pub mod key;
pub mod layer;
pub mod modifier;
pub mod policy;
pub mod sim;
pub mod state;
pub mod timer;

pub use action::{Action, KeyEvent, MacroAction};
pub use behavior::{Behavior, Behaviors};
pub use config::{Config, ConfigError};
pub use engine::{Engine, EngineConfig};
pub use host::{
    ActionSink, EventPipeline, Host, KeyOutput, Keystroke, LayerService, ModifierService,
    TimerService, TimerToken,
};
pub use key::{Key, KeyPos};
pub use layer::LayerReturn;
pub use modifier::{ModifierError, Mods};
pub use policy::{
    Feature, FeaturePolicy, Features, TimeoutKind, TimeoutPolicy, Timeouts,
    DEFAULT_TAPPING_TERM_MS,
};
pub use sim::{Keymap, OutputEvent, Script, ScriptError, Simulator, VirtualHost};
pub use state::{ActivePool, KeyState, Stage, DEFAULT_CAPACITY};
pub use timer::DeferredExecutor;

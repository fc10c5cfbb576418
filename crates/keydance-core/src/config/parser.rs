// Keydance Config Parser - TOML with Serde
// Parses engine settings, macro keys and layers from TOML

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::behavior::{Behavior, Behaviors, DEFAULT_THRESHOLD};
use crate::engine::EngineConfig;
use crate::policy::{
    Feature, FeaturePolicy, Features, TimeoutKind, TimeoutPolicy, Timeouts,
    DEFAULT_TAPPING_TERM_MS,
};
use crate::sim::Keymap;
use crate::state::DEFAULT_CAPACITY;
use crate::{Key, KeyPos, Mods};

const TIMEOUT_RANGE: (u32, u32) = (1, 10_000);
const DELAY_RANGE: (u32, u32) = (0, 100);
const CAPACITY_RANGE: (usize, usize) = (1, 64);

/// Configuration parser errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid modifier: {0}")]
    InvalidModifier(String),

    #[error("Invalid behavior: {0}")]
    InvalidBehavior(String),

    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),
}

/// Main configuration structure (root TOML table)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigToml {
    #[serde(default)]
    pub general: GeneralConfig,

    /// Global timeout overrides
    #[serde(default)]
    pub timeouts: TimeoutsToml,

    /// Global feature flags
    #[serde(default)]
    pub features: FeaturesToml,

    /// Macro keys
    #[serde(default, rename = "macro")]
    pub macros: Vec<MacroToml>,

    /// Keymap layers, base layer first
    #[serde(default, rename = "layer")]
    pub layers: Vec<LayerToml>,
}

/// General settings
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// Maximum number of macro keys in flight
    pub capacity: Option<usize>,
    /// Base for every timeout that is not set explicitly
    pub tapping_term_ms: Option<u32>,
    /// Pause between synthesized presses
    pub simultaneous_presses_delay_ms: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TimeoutsToml {
    pub tap: Option<u32>,
    pub sequence: Option<u32>,
    pub following_tap: Option<u32>,
    pub release: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FeaturesToml {
    pub mods_recall: Option<bool>,
    pub aggregate_taps: Option<bool>,
}

/// A key given either by name (`"A"`, `"KC_300"`) or by number (`300`)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum KeySpec {
    Code(u16),
    Name(String),
}

/// Behavior kinds accepted in `[[macro]]`
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    ModTap,
    ModTapEager,
    LayerTap,
}

/// `[[macro]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacroToml {
    /// The macro key itself
    pub key: KeySpec,
    pub behavior: Option<BehaviorKind>,
    /// Key sent on tap
    pub tap: Option<KeySpec>,
    /// Modifiers for mod_tap / mod_tap_eager, e.g. "Ctrl-Shift"
    pub mods: Option<String>,
    /// Target layer for layer_tap
    pub layer: Option<u8>,
    pub threshold: Option<u16>,
    pub caps_word: Option<bool>,
    /// Per-key timeout overrides
    #[serde(default)]
    pub timeouts: TimeoutsToml,
    /// Per-key feature overrides
    #[serde(default)]
    pub features: FeaturesToml,
}

/// `[[layer]]` entry: rows of key names, "" or "_" leaves a position empty
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerToml {
    pub name: Option<String>,
    pub rows: Vec<Vec<KeySpec>>,
}

/// Parsed and validated configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub engine: EngineConfig,
    pub behaviors: Behaviors,
    pub layers: Vec<Keymap>,
    /// Layer names, parallel to `layers`
    pub layer_names: Vec<Option<String>>,
}

impl Config {
    /// Parse a TOML configuration file
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let toml_config: ConfigToml =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;
        toml_config.to_config()
    }
}

impl ConfigToml {
    fn to_config(&self) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        // Parse general
        let capacity = self.general.capacity.unwrap_or(DEFAULT_CAPACITY);
        check_range("general.capacity", capacity, CAPACITY_RANGE)?;
        config.engine.capacity = capacity;

        let term = self.general.tapping_term_ms.unwrap_or(DEFAULT_TAPPING_TERM_MS);
        check_range("general.tapping_term_ms", term, TIMEOUT_RANGE)?;

        let delay = self.general.simultaneous_presses_delay_ms.unwrap_or(0);
        check_range("general.simultaneous_presses_delay_ms", delay, DELAY_RANGE)?;
        config.engine.simultaneous_presses_delay_ms = delay;

        // Global timeouts and features
        let mut timeouts = Timeouts::from_tapping_term(term);
        for (kind, ms) in self.timeouts.entries() {
            check_range(&format!("timeouts.{}", toml_name(kind)), ms, TIMEOUT_RANGE)?;
            timeouts.set(kind, ms);
        }
        let mut features = Features::default();
        for (feature, enabled) in self.features.entries() {
            features.set(feature, enabled);
        }
        let mut timeout_policy = TimeoutPolicy::new(timeouts);
        let mut feature_policy = FeaturePolicy::new(features);

        // Parse layers
        for (idx, layer) in self.layers.iter().enumerate() {
            config.layers.push(parse_layer(idx, layer)?);
            config.layer_names.push(layer.name.clone());
        }

        // Parse macro keys
        for entry in &self.macros {
            let key = parse_key_spec(&entry.key)?;
            if config.engine.macro_keys.contains(&key) {
                return Err(ConfigError::InvalidKey(format!("duplicate macro key {}", key)));
            }

            for (kind, ms) in entry.timeouts.entries() {
                check_range(
                    &format!("macro {} timeouts.{}", key, toml_name(kind)),
                    ms,
                    TIMEOUT_RANGE,
                )?;
                timeout_policy.set_override(key, kind, ms);
            }
            for (feature, enabled) in entry.features.entries() {
                feature_policy.set_override(key, feature, enabled);
            }

            if let Some(behavior) = entry.to_behavior(key, config.layers.len())? {
                log::debug!("macro {} -> {}", key, behavior);
                config.behaviors.insert(key, behavior);
            }
            config.engine.macro_keys.insert(key);
        }

        config.engine.timeouts = timeout_policy;
        config.engine.features = feature_policy;
        Ok(config)
    }
}

impl MacroToml {
    fn to_behavior(&self, key: Key, layer_count: usize) -> Result<Option<Behavior>, ConfigError> {
        let Some(kind) = self.behavior else {
            return Ok(None);
        };

        let tap = match &self.tap {
            Some(spec) => parse_key_spec(spec)?,
            None => {
                return Err(ConfigError::InvalidBehavior(format!(
                    "macro {} needs a tap key",
                    key
                )))
            }
        };

        let behavior = match kind {
            BehaviorKind::ModTap | BehaviorKind::ModTapEager => {
                let Some(list) = &self.mods else {
                    return Err(ConfigError::InvalidBehavior(format!(
                        "macro {} needs mods",
                        key
                    )));
                };
                let mods = Mods::parse_list(list)
                    .map_err(|e| ConfigError::InvalidModifier(e.to_string()))?;
                if mods.is_empty() {
                    return Err(ConfigError::InvalidModifier(format!(
                        "macro {} has an empty mods list",
                        key
                    )));
                }
                if kind == BehaviorKind::ModTap {
                    Behavior::mod_tap(tap, mods)
                } else {
                    Behavior::mod_tap_eager(tap, mods)
                }
            }
            BehaviorKind::LayerTap => {
                let Some(layer) = self.layer else {
                    return Err(ConfigError::InvalidBehavior(format!(
                        "macro {} needs a layer",
                        key
                    )));
                };
                if layer_count > 0 && usize::from(layer) >= layer_count {
                    return Err(ConfigError::ValueOutOfRange(format!(
                        "macro {} layer must be 0-{}, got {}",
                        key,
                        layer_count - 1,
                        layer
                    )));
                }
                Behavior::layer_tap(tap, layer)
            }
        };

        Ok(Some(
            behavior
                .with_threshold(self.threshold.unwrap_or(DEFAULT_THRESHOLD))
                .with_caps_word(self.caps_word.unwrap_or(true)),
        ))
    }
}

impl TimeoutsToml {
    fn entries(&self) -> impl Iterator<Item = (TimeoutKind, u32)> {
        [
            (TimeoutKind::Tap, self.tap),
            (TimeoutKind::Sequence, self.sequence),
            (TimeoutKind::FollowingTap, self.following_tap),
            (TimeoutKind::Release, self.release),
        ]
        .into_iter()
        .filter_map(|(kind, ms)| ms.map(|ms| (kind, ms)))
    }
}

impl FeaturesToml {
    fn entries(&self) -> impl Iterator<Item = (Feature, bool)> {
        [
            (Feature::ModsRecall, self.mods_recall),
            (Feature::AggregateTaps, self.aggregate_taps),
        ]
        .into_iter()
        .filter_map(|(feature, on)| on.map(|on| (feature, on)))
    }
}

fn toml_name(kind: TimeoutKind) -> &'static str {
    match kind {
        TimeoutKind::Tap => "tap",
        TimeoutKind::Sequence => "sequence",
        TimeoutKind::FollowingTap => "following_tap",
        TimeoutKind::Release => "release",
    }
}

fn check_range<T>(what: &str, value: T, (min, max): (T, T)) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(ConfigError::ValueOutOfRange(format!(
            "{} must be {}-{}, got {}",
            what, min, max, value
        )));
    }
    Ok(())
}

fn parse_layer(idx: usize, layer: &LayerToml) -> Result<Keymap, ConfigError> {
    let mut keymap = Keymap::new();
    for (row, keys) in layer.rows.iter().enumerate() {
        for (col, spec) in keys.iter().enumerate() {
            if matches!(spec, KeySpec::Name(name) if name.is_empty() || name == "_") {
                continue;
            }
            let (Ok(r), Ok(c)) = (u8::try_from(row), u8::try_from(col)) else {
                return Err(ConfigError::ValueOutOfRange(format!(
                    "layer {} position {},{} does not fit the matrix",
                    idx, row, col
                )));
            };
            keymap.insert(KeyPos::new(r, c), parse_key_spec(spec)?);
        }
    }
    Ok(keymap)
}

/// Parse a key name or code into a Key
fn parse_key_spec(spec: &KeySpec) -> Result<Key, ConfigError> {
    match spec {
        KeySpec::Code(code) => Ok(Key(*code)),
        KeySpec::Name(name) => parse_key(name),
    }
}

fn parse_key(name: &str) -> Result<Key, ConfigError> {
    let trimmed = name.trim();
    crate::key::key_from_name(trimmed).ok_or_else(|| ConfigError::InvalidKey(trimmed.to_string()))
}

// Keydance Policies
// Per-key timeout and feature-flag resolution with global fallbacks

use indexmap::IndexMap;

use strum_macros::{Display, EnumIter};

use crate::Key;

/// Default tapping term every timeout default is derived from (milliseconds)
pub const DEFAULT_TAPPING_TERM_MS: u32 = 200;

/// The four windows that resolve ambiguity when no further input arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum TimeoutKind {
    /// TOUCH -> HOLD
    #[strum(serialize = "TAP")]
    Tap,
    /// SEQUENCE -> NONE
    #[strum(serialize = "SEQUENCE")]
    Sequence,
    /// FOLLOWING_TOUCH -> HOLD
    #[strum(serialize = "FOLLOWING_TAP")]
    FollowingTap,
    /// RELEASE -> NONE
    #[strum(serialize = "RELEASE")]
    Release,
}

/// A full set of timeout durations in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub tap: u32,
    pub sequence: u32,
    pub following_tap: u32,
    pub release: u32,
}

impl Timeouts {
    /// Derive the standard ratios from a tapping term: the sequence window is
    /// half of it and the release window a quarter.
    pub fn from_tapping_term(term_ms: u32) -> Self {
        Self {
            tap: term_ms,
            sequence: term_ms / 2,
            following_tap: term_ms,
            release: term_ms / 4,
        }
    }

    pub fn get(&self, kind: TimeoutKind) -> u32 {
        match kind {
            TimeoutKind::Tap => self.tap,
            TimeoutKind::Sequence => self.sequence,
            TimeoutKind::FollowingTap => self.following_tap,
            TimeoutKind::Release => self.release,
        }
    }

    pub fn set(&mut self, kind: TimeoutKind, ms: u32) {
        match kind {
            TimeoutKind::Tap => self.tap = ms,
            TimeoutKind::Sequence => self.sequence = ms,
            TimeoutKind::FollowingTap => self.following_tap = ms,
            TimeoutKind::Release => self.release = ms,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from_tapping_term(DEFAULT_TAPPING_TERM_MS)
    }
}

/// Resolves timeouts per key, falling back to the global defaults.
#[derive(Debug, Clone, Default)]
pub struct TimeoutPolicy {
    defaults: Timeouts,
    overrides: IndexMap<Key, IndexMap<TimeoutKind, u32>>,
}

impl TimeoutPolicy {
    pub fn new(defaults: Timeouts) -> Self {
        Self {
            defaults,
            overrides: IndexMap::new(),
        }
    }

    pub fn defaults(&self) -> &Timeouts {
        &self.defaults
    }

    /// Override one timeout for one key
    pub fn set_override(&mut self, key: Key, kind: TimeoutKind, ms: u32) {
        self.overrides.entry(key).or_default().insert(kind, ms);
    }

    /// Builder-style variant of [`set_override`](Self::set_override)
    pub fn with_override(mut self, key: Key, kind: TimeoutKind, ms: u32) -> Self {
        self.set_override(key, kind, ms);
        self
    }

    /// Get the timeout for a key, or the global default when unset
    pub fn resolve(&self, key: Key, kind: TimeoutKind) -> u32 {
        self.overrides
            .get(&key)
            .and_then(|per_key| per_key.get(&kind))
            .copied()
            .unwrap_or_else(|| self.defaults.get(kind))
    }

    /// Every per-key override, in the order keys were first configured
    pub fn overrides(&self) -> impl Iterator<Item = (Key, TimeoutKind, u32)> + '_ {
        self.overrides
            .iter()
            .flat_map(|(key, per_key)| {
                per_key
                    .iter()
                    .map(move |(kind, ms)| (*key, *kind, *ms))
            })
    }
}

/// Optional behaviors that can be toggled per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Feature {
    /// Restore the pre-touch modifier state around the TAP action
    #[strum(serialize = "MODS_RECALL")]
    ModsRecall,
    /// Hold back TAP until the tap sequence ends, reporting the count once
    #[strum(serialize = "AGGREGATE_TAPS")]
    AggregateTaps,
}

/// Global feature flag defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub mods_recall: bool,
    pub aggregate_taps: bool,
}

impl Features {
    pub fn get(&self, feature: Feature) -> bool {
        match feature {
            Feature::ModsRecall => self.mods_recall,
            Feature::AggregateTaps => self.aggregate_taps,
        }
    }

    pub fn set(&mut self, feature: Feature, enabled: bool) {
        match feature {
            Feature::ModsRecall => self.mods_recall = enabled,
            Feature::AggregateTaps => self.aggregate_taps = enabled,
        }
    }
}

impl Default for Features {
    fn default() -> Self {
        Self {
            mods_recall: true,
            aggregate_taps: false,
        }
    }
}

/// Resolves feature flags per key, falling back to the global defaults.
#[derive(Debug, Clone, Default)]
pub struct FeaturePolicy {
    defaults: Features,
    overrides: IndexMap<Key, IndexMap<Feature, bool>>,
}

impl FeaturePolicy {
    pub fn new(defaults: Features) -> Self {
        Self {
            defaults,
            overrides: IndexMap::new(),
        }
    }

    pub fn defaults(&self) -> &Features {
        &self.defaults
    }

    pub fn set_override(&mut self, key: Key, feature: Feature, enabled: bool) {
        self.overrides.entry(key).or_default().insert(feature, enabled);
    }

    pub fn with_override(mut self, key: Key, feature: Feature, enabled: bool) -> Self {
        self.set_override(key, feature, enabled);
        self
    }

    pub fn enabled(&self, key: Key, feature: Feature) -> bool {
        self.overrides
            .get(&key)
            .and_then(|per_key| per_key.get(&feature))
            .copied()
            .unwrap_or_else(|| self.defaults.get(feature))
    }

    /// Every per-key override, in the order keys were first configured
    pub fn overrides(&self) -> impl Iterator<Item = (Key, Feature, bool)> + '_ {
        self.overrides
            .iter()
            .flat_map(|(key, per_key)| {
                per_key
                    .iter()
                    .map(move |(feature, enabled)| (*key, *feature, *enabled))
            })
    }
}

// Keydance Engine
// Entry point that arbitrates key events between in-flight macro keys
//
// Every host key event goes through `Engine::process_event`. Live records
// get the first look in pool order; an unclaimed press of a macro key opens
// a new record. Timer expiry comes back in through `Engine::on_timeout`.

mod timeout;
mod transition;

use std::collections::HashSet;

use crate::host::{Host, TimerService};
use crate::policy::{FeaturePolicy, TimeoutPolicy};
use crate::state::{ActivePool, DEFAULT_CAPACITY};
use crate::{Key, KeyEvent};

/// Configuration for the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of macro keys tracked at once
    pub capacity: usize,
    /// Pause inserted between a synthesized press and the action that
    /// depends on it (0 disables)
    pub simultaneous_presses_delay_ms: u32,
    pub timeouts: TimeoutPolicy,
    pub features: FeaturePolicy,
    /// Keys that run through the engine instead of straight to the host
    pub macro_keys: HashSet<Key>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            simultaneous_presses_delay_ms: 0,
            timeouts: TimeoutPolicy::default(),
            features: FeaturePolicy::default(),
            macro_keys: HashSet::new(),
        }
    }
}

impl EngineConfig {
    /// Default configuration tracking the given macro keys
    pub fn with_macro_keys(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            macro_keys: keys.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn is_macro_key(&self, key: Key) -> bool {
        self.macro_keys.contains(&key)
    }
}

/// The tap/hold/sequence state machine for all macro keys.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    pool: ActivePool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let pool = ActivePool::with_capacity(config.capacity);
        Self { config, pool }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only view of the in-flight records
    pub fn active(&self) -> &ActivePool {
        &self.pool
    }

    /// Process a single key event
    ///
    /// Returns true when the engine consumed the event; the host must then
    /// not handle it any further. Synthesized events produced while handling
    /// this one are dispatched back through here before it returns.
    pub fn process_event<H: Host + ?Sized>(&mut self, host: &mut H, event: KeyEvent) -> bool {
        log::debug!(">> GOT KEY {}", event);

        let mut idx = 0;
        while let Some(macro_key) = self.pool.get(idx).map(|s| s.key) {
            if self.process_state(host, macro_key, &event) {
                log::debug!("<< HANDLE KEY {} by {}", event, macro_key);
                return true;
            }
            // A record that resolved itself hands its slot to the next one,
            // which still has to see this event.
            if self.pool.get(idx).map(|s| s.key) == Some(macro_key) {
                idx += 1;
            }
        }

        if !event.is_pressed() {
            log::debug!("<< BYPASS KEY {}", event);
            return false;
        }

        if !self.config.is_macro_key(event.key) {
            log::debug!("<< BYPASS KEY {}", event);
            return false;
        }

        // Second press of a key that is already tracked
        if self.pool.contains(event.key) {
            log::debug!("<< ALREADY HANDLED KEY {}", event);
            return true;
        }

        if self.pool.allocate(event.key).is_none() {
            log::warn!(
                "<< POOL FULL ({} records), bypassing {}",
                self.pool.capacity(),
                event
            );
            return false;
        }
        debug_assert_eq!(
            self.pool.keys().filter(|k| *k == event.key).count(),
            1,
            "macro key tracked twice"
        );

        log::debug!("<< CREATE STATE {}", event);
        self.process_state(host, event.key, &event)
    }

    /// Drop every in-flight record and cancel its timer
    pub fn reset<H: TimerService + ?Sized>(&mut self, host: &mut H) {
        for state in self.pool.drain() {
            if let Some(timeout) = state.timeout {
                host.cancel(timeout.token);
            }
        }
    }
}

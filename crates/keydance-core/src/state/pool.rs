// Keydance Active-State Pool
// Bounded, insertion-ordered storage for in-flight macro key records

use smallvec::SmallVec;

use crate::host::TimerToken;
use crate::Key;

use super::KeyState;

/// Default number of macro keys that can be ambiguous at the same time
pub const DEFAULT_CAPACITY: usize = 10;

/// Ordered pool of live [`KeyState`] records.
///
/// Order is insertion order and doubles as the arbitration priority for
/// incoming events. Removing a record shifts every later record one slot
/// earlier. Records are addressed by index or by macro key; the key is
/// unique within the pool, so it stays valid across a compaction while an
/// index does not.
#[derive(Debug, Clone)]
pub struct ActivePool {
    states: SmallVec<[KeyState; DEFAULT_CAPACITY]>,
    capacity: usize,
}

impl ActivePool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            states: SmallVec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.states.len() >= self.capacity
    }

    /// Open a record for `key` at the end of the pool.
    ///
    /// Returns the new record's index, or `None` when the pool is full or the
    /// key is already tracked.
    pub fn allocate(&mut self, key: Key) -> Option<usize> {
        if self.is_full() || self.contains(key) {
            return None;
        }
        self.states.push(KeyState::new(key));
        Some(self.states.len() - 1)
    }

    /// Remove the record for `key`, compacting the rest in order
    pub fn release(&mut self, key: Key) -> Option<KeyState> {
        let idx = self.position(key)?;
        Some(self.states.remove(idx))
    }

    pub fn position(&self, key: Key) -> Option<usize> {
        self.states.iter().position(|s| s.key == key)
    }

    pub fn contains(&self, key: Key) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, idx: usize) -> Option<&KeyState> {
        self.states.get(idx)
    }

    pub fn find(&self, key: Key) -> Option<&KeyState> {
        self.states.iter().find(|s| s.key == key)
    }

    pub fn find_mut(&mut self, key: Key) -> Option<&mut KeyState> {
        self.states.iter_mut().find(|s| s.key == key)
    }

    /// Find the record whose pending timer carries `token`
    pub fn find_by_timer(&self, token: TimerToken) -> Option<&KeyState> {
        self.states
            .iter()
            .find(|s| s.timeout.is_some_and(|t| t.token == token))
    }

    /// Live records in priority order
    pub fn iter(&self) -> impl Iterator<Item = &KeyState> {
        self.states.iter()
    }

    /// Macro keys of live records in priority order
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.states.iter().map(|s| s.key)
    }

    /// Drop every record, returning them in order
    pub fn drain(&mut self) -> Vec<KeyState> {
        self.states.drain(..).collect()
    }
}

impl Default for ActivePool {
    fn default() -> Self {
        Self::new()
    }
}

// Keydance Deferred Executor
// Virtual-clock timer queue backing `TimerService` for simulation and tests
//
// The executor never runs callbacks itself. The driver advances time, pulls
// due tokens with `pop_due` and hands each one to `Engine::on_timeout`.

use crate::host::{TimerService, TimerToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Deferred {
    deadline_ms: u64,
    token: TimerToken,
}

/// Timer queue on a millisecond clock that only moves when told to.
///
/// Due timers come out earliest deadline first; timers sharing a deadline
/// come out in the order they were scheduled.
#[derive(Debug, Clone, Default)]
pub struct DeferredExecutor {
    now_ms: u64,
    next_token: u32,
    pending: Vec<Deferred>,
}

impl DeferredExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Number of timers still waiting to fire
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.pending.iter().any(|d| d.token == token)
    }

    /// Deadline of the next timer to fire, if any
    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.iter().map(|d| d.deadline_ms).min()
    }

    /// Remove and return the next timer due at or before `until_ms`.
    ///
    /// The clock moves to that timer's deadline, so anything it schedules is
    /// measured from the moment it fired.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<TimerToken> {
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, d)| d.deadline_ms <= until_ms)
            .min_by_key(|(_, d)| (d.deadline_ms, d.token))
            .map(|(idx, _)| idx)?;
        let due = self.pending.remove(idx);
        self.now_ms = self.now_ms.max(due.deadline_ms);
        Some(due.token)
    }

    /// Move the clock forward without firing anything
    pub fn advance_to(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    /// Forget every pending timer
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl TimerService for DeferredExecutor {
    fn schedule(&mut self, delay_ms: u32) -> TimerToken {
        self.next_token = self.next_token.wrapping_add(1);
        let token = TimerToken(self.next_token);
        self.pending.push(Deferred {
            deadline_ms: self.now_ms + u64::from(delay_ms),
            token,
        });
        token
    }

    fn cancel(&mut self, token: TimerToken) {
        self.pending.retain(|d| d.token != token);
    }
}

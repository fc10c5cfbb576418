// Keydance Timeouts
// Resolves ambiguity when a record's window closes without further input

use crate::host::{Host, TimerToken};
use crate::policy::{Feature, TimeoutKind};
use crate::state::Stage;

use super::Engine;

impl Engine {
    /// Handle a fired timer.
    ///
    /// Returns false when no record owns `token`, which happens for timers
    /// that were cancelled after the host already queued them.
    pub fn on_timeout<H: Host + ?Sized>(&mut self, host: &mut H, token: TimerToken) -> bool {
        let Some(state) = self.pool.find_by_timer(token) else {
            log::trace!("stale timer {}", token);
            return false;
        };
        let macro_key = state.key;
        let Some(pending) = state.timeout else {
            return false;
        };

        // Fired timers are gone from the host, nothing left to cancel.
        if let Some(state) = self.pool.find_mut(macro_key) {
            state.timeout = None;
        }
        log::debug!("{} TIMEOUT {} by {}", pending.kind, token, macro_key);

        match pending.kind {
            TimeoutKind::Tap => {
                self.next_stage(host, macro_key, Stage::Hold);
            }
            TimeoutKind::Sequence => {
                if self.feature(macro_key, Feature::AggregateTaps) {
                    self.do_tap(host, macro_key);
                }
                self.next_stage(host, macro_key, Stage::None);
            }
            TimeoutKind::FollowingTap => {
                self.next_stage(host, macro_key, Stage::Hold);
                self.settle(host);
                self.press_following(host, macro_key, false);
            }
            TimeoutKind::Release => {
                self.do_tap(host, macro_key);
                self.settle(host);
                self.press_following(host, macro_key, false);
                self.next_stage(host, macro_key, Stage::None);
            }
        }
        true
    }
}

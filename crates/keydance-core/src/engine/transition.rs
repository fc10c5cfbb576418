// Keydance Transitions
// Per-record stage table, timer arming and synthesized event replay

use crate::host::Host;
use crate::policy::{Feature, TimeoutKind};
use crate::state::{FollowingKey, Guard, PendingTimeout, Stage};
use crate::{Action, Key, KeyEvent, KeyPos, MacroAction, Mods};

use super::Engine;

impl Engine {
    /// Let the record for `macro_key` react to `event`.
    ///
    /// Returns true when the record consumed the event. Frozen records and
    /// records that no longer exist never consume anything.
    pub(super) fn process_state<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        macro_key: Key,
        event: &KeyEvent,
    ) -> bool {
        let Some(state) = self.pool.find(macro_key) else {
            return false;
        };
        if state.is_frozen() {
            return false;
        }

        let stage = state.stage;
        let is_macro = event.key == macro_key;
        let pressed = event.is_pressed();
        let at_following = state.is_following_pos(event.pos);

        match stage {
            Stage::None => {
                if is_macro && pressed {
                    self.next_stage(host, macro_key, Stage::Touch);
                    return true;
                }
                false
            }

            Stage::Touch => {
                if is_macro && !pressed {
                    self.next_stage(host, macro_key, Stage::Sequence);
                    if !self.feature(macro_key, Feature::AggregateTaps) {
                        self.do_tap(host, macro_key);
                    }
                    return true;
                }
                if !is_macro && pressed {
                    if let Some(state) = self.pool.find_mut(macro_key) {
                        state.following = Some(FollowingKey {
                            pos: event.pos,
                            key: event.key,
                        });
                    }
                    self.next_stage(host, macro_key, Stage::FollowingTouch);
                    return true;
                }
                false
            }

            Stage::Sequence => {
                if is_macro && pressed {
                    if let Some(state) = self.pool.find_mut(macro_key) {
                        state.sequence_len = state.sequence_len.saturating_add(1);
                    }
                    self.next_stage(host, macro_key, Stage::Touch);
                    return true;
                }
                if pressed {
                    // Another key breaks the sequence; it still goes through.
                    if self.feature(macro_key, Feature::AggregateTaps) {
                        self.do_tap(host, macro_key);
                    }
                    self.next_stage(host, macro_key, Stage::None);
                }
                false
            }

            Stage::FollowingTouch => {
                if is_macro && !pressed {
                    self.next_stage(host, macro_key, Stage::Release);
                    return true;
                }
                if !is_macro && at_following && !pressed {
                    self.next_stage(host, macro_key, Stage::Hold);
                    self.settle(host);
                    self.press_following(host, macro_key, true);
                    return true;
                }
                if !is_macro && !at_following && pressed {
                    self.next_stage(host, macro_key, Stage::Hold);
                    self.settle(host);
                    self.press_following(host, macro_key, false);
                    self.settle(host);
                    let pos = event.pos;
                    self.frozen(host, macro_key, |engine, host| {
                        engine.replay(host, pos, Action::Press);
                    });
                    return true;
                }
                false
            }

            Stage::Hold => {
                if is_macro && !pressed {
                    self.emit(host, macro_key, MacroAction::Release);
                    self.next_stage(host, macro_key, Stage::None);
                    return true;
                }
                false
            }

            Stage::Release => {
                if is_macro && pressed {
                    // Quick re-press: the first press was a tap that rolled
                    // into the following key, and a new touch begins.
                    self.do_tap(host, macro_key);
                    self.settle(host);
                    self.press_following(host, macro_key, false);
                    self.settle(host);
                    self.next_stage(host, macro_key, Stage::Touch);
                    if let Some(state) = self.pool.find_mut(macro_key) {
                        state.sequence_len = 0;
                    }
                    return true;
                }
                if !is_macro && at_following && !pressed {
                    self.emit(host, macro_key, MacroAction::Hold);
                    self.settle(host);
                    self.press_following(host, macro_key, true);
                    self.settle(host);
                    self.emit(host, macro_key, MacroAction::Release);
                    self.next_stage(host, macro_key, Stage::None);
                    return true;
                }
                if !is_macro && !at_following && pressed {
                    self.do_tap(host, macro_key);
                    self.settle(host);
                    self.press_following(host, macro_key, false);
                    self.next_stage(host, macro_key, Stage::None);
                    self.settle(host);
                    self.replay(host, event.pos, Action::Press);
                    return true;
                }
                false
            }
        }
    }

    /// Move a record to `next`, running the stage's entry work.
    ///
    /// The new timer is armed before the previous one is cancelled, and
    /// entering NONE frees the record.
    pub(super) fn next_stage<H: Host + ?Sized>(&mut self, host: &mut H, macro_key: Key, next: Stage) {
        let Some(state) = self.pool.find_mut(macro_key) else {
            log::warn!("no state for {} entering {}", macro_key, next);
            return;
        };
        log::debug!("STAGE by {}, {} -> {}", macro_key, state.stage, next);

        let previous = state.stage;
        let previous_timeout = state.timeout.take();
        state.stage = next;

        match next {
            Stage::None => {
                self.pool.release(macro_key);
            }
            Stage::Touch => {
                let before = host.mods();
                if let Some(state) = self.pool.find_mut(macro_key) {
                    state.mods_before_touch = before;
                }
                if previous == Stage::None {
                    self.emit(host, macro_key, MacroAction::Touch);
                }
                let with_touch = host.mods() & !before;
                if let Some(state) = self.pool.find_mut(macro_key) {
                    state.mods_with_touch = with_touch;
                }
                self.arm(host, macro_key, TimeoutKind::Tap);
            }
            Stage::Sequence => self.arm(host, macro_key, TimeoutKind::Sequence),
            Stage::FollowingTouch => self.arm(host, macro_key, TimeoutKind::FollowingTap),
            Stage::Release => self.arm(host, macro_key, TimeoutKind::Release),
            Stage::Hold => self.emit(host, macro_key, MacroAction::Hold),
        }

        if let Some(timeout) = previous_timeout {
            host.cancel(timeout.token);
        }
    }

    fn arm<H: Host + ?Sized>(&mut self, host: &mut H, macro_key: Key, kind: TimeoutKind) {
        let delay = self.config.timeouts.resolve(macro_key, kind);
        let token = host.schedule(delay);
        log::trace!("{} armed {} {} ({}ms)", macro_key, kind, token, delay);
        match self.pool.find_mut(macro_key) {
            Some(state) => state.timeout = Some(PendingTimeout { token, kind }),
            None => host.cancel(token),
        }
    }

    pub(super) fn emit<H: Host + ?Sized>(&self, host: &mut H, macro_key: Key, action: MacroAction) {
        let Some(state) = self.pool.find(macro_key) else {
            return;
        };
        log::debug!(
            "{} by {} in {}, seq {}",
            action,
            macro_key,
            state.stage,
            state.sequence_len
        );
        host.on_action(macro_key, action, state.sequence_len);
    }

    /// Emit TAP, restoring the modifiers that were active before the touch
    /// when mods recall is on.
    pub(super) fn do_tap<H: Host + ?Sized>(&mut self, host: &mut H, macro_key: Key) {
        let Some(state) = self.pool.find(macro_key) else {
            return;
        };
        let before = state.mods_before_touch;
        let with_touch = state.mods_with_touch;
        let current = host.mods();

        if !self.feature(macro_key, Feature::ModsRecall) || before == current {
            self.emit(host, macro_key, MacroAction::Tap);
            return;
        }

        log::debug!("mods recall for {}: {} -> {}", macro_key, current, before);
        host.set_mods(before);
        host.send_report();
        self.settle(host);

        self.emit(host, macro_key, MacroAction::Tap);

        // Whatever TAP changed is carried over onto the restored state.
        let diff = host.mods() ^ before;
        self.settle(host);
        host.set_mods(current ^ diff);
        host.del_mods(with_touch);
        host.send_report();

        if let Some(state) = self.pool.find_mut(macro_key) {
            state.mods_before_touch = Mods::empty();
            state.mods_with_touch = Mods::empty();
        }
    }

    /// Replay the following key's press (and release when `release` is set)
    /// while the record is frozen.
    pub(super) fn press_following<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        macro_key: Key,
        release: bool,
    ) {
        let Some(following) = self.pool.find(macro_key).and_then(|s| s.following) else {
            log::warn!("{} has no following key to replay", macro_key);
            return;
        };
        log::debug!(
            "FOLLOWING_{} {} by {}",
            if release { "TAP" } else { "PRESS" },
            following.key,
            macro_key
        );
        self.frozen(host, macro_key, |engine, host| {
            engine.replay(host, following.pos, Action::Press);
            if release {
                engine.settle(host);
                engine.replay(host, following.pos, Action::Release);
            }
        });
    }

    /// Run `f` with the record frozen, then restore its previous guard if it
    /// still exists.
    fn frozen<H, F>(&mut self, host: &mut H, macro_key: Key, f: F)
    where
        H: Host + ?Sized,
        F: FnOnce(&mut Self, &mut H),
    {
        let previous = self.set_guard(macro_key, Guard::Frozen);
        f(&mut *self, host);
        if let Some(previous) = previous {
            self.set_guard(macro_key, previous);
        }
    }

    fn set_guard(&mut self, macro_key: Key, guard: Guard) -> Option<Guard> {
        let state = self.pool.find_mut(macro_key)?;
        Some(std::mem::replace(&mut state.guard, guard))
    }

    /// Feed a synthesized event back through the dispatcher. A press is
    /// resolved now, so a layer switched by an earlier action is honored.
    pub(super) fn replay<H: Host + ?Sized>(&mut self, host: &mut H, pos: KeyPos, action: Action) {
        let event = KeyEvent::new(host.resolve(pos, action), pos, action);
        log::trace!("replay {}", event);
        if !self.process_event(host, event) {
            host.forward(event);
        }
    }

    pub(super) fn settle<H: Host + ?Sized>(&self, host: &mut H) {
        let delay = self.config.simultaneous_presses_delay_ms;
        if delay > 0 {
            host.settle(delay);
        }
    }

    pub(super) fn feature(&self, macro_key: Key, feature: Feature) -> bool {
        self.config.features.enabled(macro_key, feature)
    }
}

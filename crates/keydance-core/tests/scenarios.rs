// Keydance Scenario Tests
//
// Full key traces driven through the simulator on virtual time. Each test
// checks the exact sequence of actions and forwarded events a host sees.

use keydance_core::sim::{Keymap, OutputEvent, Script, Simulator, VirtualHost};
use keydance_core::{
    Action, Behavior, Behaviors, Engine, EngineConfig, Feature, Key, KeyPos, Keystroke,
    MacroAction, ModifierService, Mods, Stage, TimeoutKind,
};

// =========================================================================
// Test Helpers
// =========================================================================

const M: Key = Key(300);
const N: Key = Key(301);
const A: Key = Key(30);
const B: Key = Key(48);
const X: Key = Key(45);
const LSHIFT: Key = Key(42);

const POS_M: KeyPos = KeyPos::new(0, 0);
const POS_A: KeyPos = KeyPos::new(0, 1);
const POS_B: KeyPos = KeyPos::new(0, 2);
const POS_N: KeyPos = KeyPos::new(0, 3);
const POS_SHIFT: KeyPos = KeyPos::new(1, 0);

fn base_layer() -> Keymap {
    [
        (POS_M, M),
        (POS_A, A),
        (POS_B, B),
        (POS_N, N),
        (POS_SHIFT, LSHIFT),
    ]
    .into_iter()
    .collect()
}

/// Layer 1 turns A into X
fn upper_layer() -> Keymap {
    [(POS_A, X)].into_iter().collect()
}

fn simulator(config: EngineConfig) -> Simulator {
    Simulator::new(Engine::new(config), VirtualHost::new(vec![base_layer()]))
}

fn default_sim() -> Simulator {
    simulator(EngineConfig::with_macro_keys([M, N]))
}

fn act(key: Key, action: MacroAction, seq: u8) -> OutputEvent {
    OutputEvent::action(key, action, seq)
}

fn down(key: Key, pos: KeyPos) -> OutputEvent {
    OutputEvent::forwarded(key, pos, Action::Press)
}

fn up(key: Key, pos: KeyPos) -> OutputEvent {
    OutputEvent::forwarded(key, pos, Action::Release)
}

/// Timer bookkeeping must match the stages of the live records
fn assert_consistent(sim: &Simulator) {
    let pool = sim.engine().active();
    let timers = sim.host().timers();

    let mut keys: Vec<Key> = pool.keys().collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), pool.len(), "duplicate records");

    let mut timed = 0;
    for state in pool.iter() {
        match state.stage {
            Stage::None => panic!("idle record left in pool: {}", state),
            Stage::Hold => assert!(state.timeout.is_none(), "{}", state),
            _ => {
                let timeout = state.timeout.unwrap_or_else(|| panic!("no timer: {}", state));
                assert!(timers.is_pending(timeout.token), "{}", state);
                timed += 1;
            }
        }
        assert!(!state.is_frozen(), "{}", state);
    }
    assert_eq!(timers.pending(), timed, "orphaned timers");
}

// =========================================================================
// Basic resolution
// =========================================================================

#[test]
fn test_single_tap() {
    let mut sim = default_sim();
    assert!(sim.press(POS_M));
    sim.advance(50);
    assert!(sim.release(POS_M));
    assert_consistent(&sim);

    sim.advance(500);
    assert_eq!(
        sim.output(),
        &[act(M, MacroAction::Touch, 0), act(M, MacroAction::Tap, 0)]
    );
    assert!(sim.engine().active().is_empty());
    assert_consistent(&sim);
}

#[test]
fn test_single_hold() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.advance(199);
    assert_eq!(sim.output(), &[act(M, MacroAction::Touch, 0)]);

    sim.advance(1);
    assert_eq!(sim.engine().active().find(M).unwrap().stage, Stage::Hold);
    assert_consistent(&sim);

    sim.advance(300);
    sim.release(POS_M);
    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Hold, 0),
            act(M, MacroAction::Release, 0),
        ]
    );
    assert!(sim.engine().active().is_empty());
}

#[test]
fn test_hold_with_following_key_tap() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.advance(30);
    assert!(sim.press(POS_A));
    sim.advance(30);
    assert!(sim.release(POS_A));
    sim.advance(30);
    sim.release(POS_M);

    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Hold, 0),
            down(A, POS_A),
            up(A, POS_A),
            act(M, MacroAction::Release, 0),
        ]
    );
    assert_consistent(&sim);
}

#[test]
fn test_double_tap_counts_sequence() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.advance(40);
    sim.release(POS_M);
    sim.advance(60);
    sim.press(POS_M);
    sim.advance(40);
    sim.release(POS_M);
    sim.advance(500);

    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Tap, 0),
            act(M, MacroAction::Tap, 1),
        ]
    );
    assert!(sim.engine().active().is_empty());
}

#[test]
fn test_tap_then_hold_in_sequence() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.advance(40);
    sim.release(POS_M);
    sim.advance(60);
    sim.press(POS_M);
    sim.advance(250);
    sim.release(POS_M);

    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Tap, 0),
            act(M, MacroAction::Hold, 1),
            act(M, MacroAction::Release, 1),
        ]
    );
}

#[test]
fn test_sequence_window_expires() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.advance(40);
    sim.release(POS_M);
    // Sequence window is 100ms by default
    sim.advance(150);
    assert!(sim.engine().active().is_empty());

    sim.press(POS_M);
    sim.release(POS_M);
    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Tap, 0),
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Tap, 0),
        ]
    );
}

#[test]
fn test_other_key_breaks_sequence() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.release(POS_M);
    sim.advance(20);
    assert!(!sim.press(POS_A));

    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Tap, 0),
            down(A, POS_A),
        ]
    );
    assert!(sim.engine().active().is_empty());
    assert_consistent(&sim);
}

// =========================================================================
// Following key and third key
// =========================================================================

#[test]
fn test_following_key_timeout_resolves_hold() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.advance(10);
    sim.press(POS_A);
    // FOLLOWING_TAP window is 200ms from the following press
    sim.advance(199);
    assert_eq!(sim.output().len(), 1);
    sim.advance(1);

    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Hold, 0),
            down(A, POS_A),
        ]
    );
    assert_consistent(&sim);

    // The following key's release is no longer the engine's business
    assert!(!sim.release(POS_A));
    assert_eq!(sim.output().last(), Some(&up(A, POS_A)));
}

#[test]
fn test_third_key_during_following_touch() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.advance(10);
    sim.press(POS_A);
    sim.advance(10);
    assert!(sim.press(POS_B));
    assert_consistent(&sim);

    sim.advance(10);
    sim.release(POS_B);
    sim.release(POS_A);
    sim.release(POS_M);

    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Hold, 0),
            down(A, POS_A),
            down(B, POS_B),
            up(B, POS_B),
            up(A, POS_A),
            act(M, MacroAction::Release, 0),
        ]
    );
}

#[test]
fn test_roll_released_before_release_window_is_hold() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.advance(30);
    sim.press(POS_A);
    sim.advance(30);
    assert!(sim.release(POS_M));
    assert_eq!(sim.engine().active().find(M).unwrap().stage, Stage::Release);
    sim.advance(20);
    assert!(sim.release(POS_A));

    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Hold, 0),
            down(A, POS_A),
            up(A, POS_A),
            act(M, MacroAction::Release, 0),
        ]
    );
    assert!(sim.engine().active().is_empty());
}

#[test]
fn test_release_window_expiry_is_tap_then_key() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.advance(30);
    sim.press(POS_A);
    sim.advance(30);
    sim.release(POS_M);
    // RELEASE window is 50ms by default
    sim.advance(60);
    assert!(sim.engine().active().is_empty());
    assert!(!sim.release(POS_A));

    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Tap, 0),
            down(A, POS_A),
            up(A, POS_A),
        ]
    );
    assert_consistent(&sim);
}

#[test]
fn test_third_key_during_release_is_tap_roll() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.advance(30);
    sim.press(POS_A);
    sim.advance(30);
    sim.release(POS_M);
    sim.advance(10);
    assert!(sim.press(POS_B));
    assert!(sim.engine().active().is_empty());

    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Tap, 0),
            down(A, POS_A),
            down(B, POS_B),
        ]
    );
    assert_consistent(&sim);
}

#[test]
fn test_repress_during_release_starts_new_touch() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.advance(30);
    sim.press(POS_A);
    sim.advance(30);
    sim.release(POS_M);
    sim.advance(10);
    assert!(sim.press(POS_M));

    let state = sim.engine().active().find(M).unwrap();
    assert_eq!(state.stage, Stage::Touch);
    assert_eq!(state.sequence_len, 0);
    assert_eq!(state.timeout.map(|t| t.kind), Some(TimeoutKind::Tap));
    assert_consistent(&sim);

    // No second TOUCH for the new press
    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Tap, 0),
            down(A, POS_A),
        ]
    );
}

// =========================================================================
// Several macro keys
// =========================================================================

#[test]
fn test_macro_key_as_following_key() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.advance(20);
    sim.press(POS_N);
    sim.advance(20);
    sim.release(POS_N);
    sim.advance(20);
    sim.release(POS_M);
    sim.advance(500);

    // M holds; N's replayed press and release make a tap of N
    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Hold, 0),
            act(N, MacroAction::Touch, 0),
            act(N, MacroAction::Tap, 0),
            act(M, MacroAction::Release, 0),
        ]
    );
    assert!(sim.engine().active().is_empty());
    assert_consistent(&sim);
}

#[test]
fn test_two_holds_at_once() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.advance(250);
    sim.press(POS_N);
    sim.advance(250);
    assert_eq!(sim.engine().active().keys().collect::<Vec<_>>(), vec![M, N]);
    assert_consistent(&sim);

    sim.release(POS_M);
    sim.release(POS_N);
    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Hold, 0),
            act(N, MacroAction::Touch, 0),
            act(N, MacroAction::Hold, 0),
            act(M, MacroAction::Release, 0),
            act(N, MacroAction::Release, 0),
        ]
    );
}

#[test]
fn test_pool_exhaustion_forwards_press() {
    let mut config = EngineConfig::with_macro_keys([M, N]);
    config.capacity = 1;
    let mut sim = simulator(config);

    sim.press(POS_M);
    sim.advance(250);
    assert!(!sim.press(POS_N));
    assert!(!sim.release(POS_N));
    assert_eq!(sim.engine().active().keys().collect::<Vec<_>>(), vec![M]);

    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Hold, 0),
            down(N, POS_N),
            up(N, POS_N),
        ]
    );
}

// =========================================================================
// Features and behaviors
// =========================================================================

#[test]
fn test_aggregate_taps_reports_count_once() {
    let mut config = EngineConfig::with_macro_keys([M]);
    config.features.set_override(M, Feature::AggregateTaps, true);
    let mut sim = simulator(config);

    for _ in 0..3 {
        sim.press(POS_M);
        sim.advance(30);
        sim.release(POS_M);
        sim.advance(30);
    }
    sim.advance(500);

    assert_eq!(
        sim.output(),
        &[act(M, MacroAction::Touch, 0), act(M, MacroAction::Tap, 2)]
    );
}

#[test]
fn test_aggregate_taps_flushed_by_other_key() {
    let mut config = EngineConfig::with_macro_keys([M]);
    config.features.set_override(M, Feature::AggregateTaps, true);
    let mut sim = simulator(config);

    sim.press(POS_M);
    sim.release(POS_M);
    sim.advance(10);
    sim.press(POS_A);

    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Tap, 0),
            down(A, POS_A),
        ]
    );
}

fn eager_shift_sim(mods_recall: bool) -> Simulator {
    let mut config = EngineConfig::with_macro_keys([M]);
    config
        .features
        .set_override(M, Feature::ModsRecall, mods_recall);
    let behaviors = Behaviors::new().with(M, Behavior::mod_tap_eager(A, Mods::LSHIFT));
    let host = VirtualHost::new(vec![base_layer()]).with_behaviors(behaviors);
    Simulator::new(Engine::new(config), host)
}

#[test]
fn test_mods_recall_restores_pre_touch_mods_for_tap() {
    let mut sim = eager_shift_sim(true);
    sim.press(POS_M);
    assert_eq!(sim.host().mods(), Mods::LSHIFT);
    sim.advance(40);
    sim.release(POS_M);

    let stroke = Keystroke::new(A);
    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            OutputEvent::Report(Mods::LSHIFT),
            // recall: back to the pre-touch state for the tap
            OutputEvent::Report(Mods::empty()),
            act(M, MacroAction::Tap, 0),
            OutputEvent::Report(Mods::empty()),
            OutputEvent::Register(stroke),
            OutputEvent::Unregister(stroke),
            OutputEvent::Report(Mods::empty()),
        ]
    );
    assert_eq!(sim.host().mods(), Mods::empty());
}

#[test]
fn test_without_mods_recall_tap_runs_directly() {
    let mut sim = eager_shift_sim(false);
    sim.press(POS_M);
    sim.advance(40);
    sim.release(POS_M);

    let stroke = Keystroke::new(A);
    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            OutputEvent::Report(Mods::LSHIFT),
            act(M, MacroAction::Tap, 0),
            OutputEvent::Report(Mods::empty()),
            OutputEvent::Register(stroke),
            OutputEvent::Unregister(stroke),
        ]
    );
    assert_eq!(sim.host().mods(), Mods::empty());
}

#[test]
fn test_eager_mod_applies_to_following_key() {
    let mut sim = eager_shift_sim(true);
    sim.press(POS_M);
    sim.advance(20);
    sim.press(POS_B);
    sim.advance(20);
    sim.release(POS_B);
    assert_eq!(sim.host().mods(), Mods::LSHIFT);
    sim.release(POS_M);
    assert_eq!(sim.host().mods(), Mods::empty());

    let out = sim.drain_output();
    let b_down = out.iter().position(|e| *e == down(B, POS_B)).unwrap();
    let hold = out
        .iter()
        .position(|e| *e == act(M, MacroAction::Hold, 0))
        .unwrap();
    assert!(hold < b_down);
    assert!(sim.output().is_empty());
}

#[test]
fn test_eager_mod_held_after_tap_in_sequence() {
    let mut sim = eager_shift_sim(true);
    sim.press(POS_M);
    sim.advance(30);
    sim.release(POS_M);
    assert_eq!(sim.host().mods(), Mods::empty());
    sim.advance(30);
    sim.press(POS_M);
    sim.advance(300);

    assert_eq!(sim.engine().active().find(M).map(|s| s.stage), Some(Stage::Hold));
    assert_eq!(sim.host().mods(), Mods::LSHIFT);
    assert_eq!(
        sim.output()
            .iter()
            .filter(|e| matches!(e, OutputEvent::Action { action: MacroAction::Touch, .. }))
            .count(),
        1
    );
    assert!(sim.output().contains(&act(M, MacroAction::Hold, 1)));
    assert_eq!(
        sim.output().last(),
        Some(&OutputEvent::Report(Mods::LSHIFT))
    );
    assert_consistent(&sim);

    sim.release(POS_M);
    assert_eq!(sim.host().mods(), Mods::empty());
    assert!(sim.engine().active().is_empty());
}

#[test]
fn test_held_shift_is_not_recalled_away() {
    let mut sim = eager_shift_sim(true);
    assert!(!sim.press(POS_SHIFT));
    assert_eq!(sim.host().mods(), Mods::LSHIFT);
    sim.press(POS_M);
    sim.release(POS_M);
    sim.release(POS_SHIFT);

    // Shift was already on before the touch, so there is nothing to recall
    // and the tap drops it along with the eager mod.
    assert!(sim.output().contains(&act(M, MacroAction::Tap, 0)));
    assert_eq!(sim.host().mods(), Mods::empty());
}

#[test]
fn test_layer_tap_resolves_following_key_on_new_layer() {
    let config = EngineConfig::with_macro_keys([M]);
    let behaviors = Behaviors::new().with(M, Behavior::layer_tap(B, 1));
    let host =
        VirtualHost::new(vec![base_layer(), upper_layer()]).with_behaviors(behaviors);
    let mut sim = Simulator::new(Engine::new(config), host);

    sim.press(POS_M);
    sim.advance(20);
    sim.press(POS_A);
    sim.advance(20);
    sim.release(POS_A);
    assert_eq!(sim.host().layer(), 1);
    sim.release(POS_M);
    assert_eq!(sim.host().layer(), 0);

    let out = sim.output();
    assert!(out.contains(&down(X, POS_A)));
    assert!(out.contains(&up(X, POS_A)));
    assert!(!out.contains(&down(A, POS_A)));
}

#[test]
fn test_layer_tap_release_on_remapped_position() {
    let config = EngineConfig::with_macro_keys([M]);
    let behaviors = Behaviors::new().with(M, Behavior::layer_tap(A, 1));
    let upper: Keymap = [(POS_M, B)].into_iter().collect();
    let host = VirtualHost::new(vec![base_layer(), upper]).with_behaviors(behaviors);
    let mut sim = Simulator::new(Engine::new(config), host);

    sim.press(POS_M);
    sim.advance(300);
    assert_eq!(sim.host().layer(), 1);
    assert!(sim.release(POS_M));

    assert_eq!(sim.host().layer(), 0);
    assert!(sim.engine().active().is_empty());
    assert!(sim.output().contains(&act(M, MacroAction::Release, 0)));
    assert!(!sim.output().contains(&up(B, POS_M)));
    assert_consistent(&sim);
}

#[test]
fn test_following_key_released_after_layer_restored() {
    let config = EngineConfig::with_macro_keys([M]);
    let behaviors = Behaviors::new().with(M, Behavior::layer_tap(B, 1));
    let host =
        VirtualHost::new(vec![base_layer(), upper_layer()]).with_behaviors(behaviors);
    let mut sim = Simulator::new(Engine::new(config), host);

    sim.press(POS_M);
    sim.advance(20);
    sim.press(POS_A);
    sim.advance(250);
    assert_eq!(sim.host().layer(), 1);
    sim.release(POS_M);
    assert_eq!(sim.host().layer(), 0);
    assert!(!sim.release(POS_A));

    let out = sim.output();
    assert!(out.contains(&down(X, POS_A)));
    assert_eq!(out.last(), Some(&up(X, POS_A)));
    assert!(!out.contains(&up(A, POS_A)));
}

#[test]
fn test_layer_tap_tap_sends_tap_key() {
    let config = EngineConfig::with_macro_keys([M]);
    let behaviors = Behaviors::new().with(M, Behavior::layer_tap(B, 1));
    let host =
        VirtualHost::new(vec![base_layer(), upper_layer()]).with_behaviors(behaviors);
    let mut sim = Simulator::new(Engine::new(config), host);

    sim.press(POS_M);
    sim.release(POS_M);
    let stroke = Keystroke::new(B);
    assert!(sim.output().contains(&OutputEvent::Register(stroke)));
    assert_eq!(sim.host().layer(), 0);
}

// =========================================================================
// Scripts and invariants
// =========================================================================

#[test]
fn test_script_replay() {
    let script = Script::parse(
        "# hold M, tap A\n\
         0   press   0,0\n\
         40  tap     0,1\n\
         80  release 0,0\n\
         400 wait\n",
    )
    .unwrap();
    let mut sim = default_sim();
    sim.run(&script);

    assert_eq!(sim.now(), 400);
    assert_eq!(
        sim.output(),
        &[
            act(M, MacroAction::Touch, 0),
            act(M, MacroAction::Hold, 0),
            down(A, POS_A),
            up(A, POS_A),
            act(M, MacroAction::Release, 0),
        ]
    );
}

#[test]
fn test_reset_drops_everything() {
    let mut sim = default_sim();
    sim.press(POS_M);
    sim.press(POS_A);
    sim.reset();
    assert!(sim.engine().active().is_empty());
    assert_eq!(sim.host().timers().pending(), 0);
    sim.advance(1000);
    assert_eq!(sim.output(), &[act(M, MacroAction::Touch, 0)]);
}

/// Small deterministic generator so the random walk is reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

#[test]
fn test_random_walk_keeps_timers_consistent() {
    let positions = [POS_M, POS_A, POS_B, POS_N];

    for seed in 1..=40u64 {
        let mut rng = Lcg(seed);
        let mut sim = default_sim();
        let mut held = [false; 4];

        for _ in 0..200 {
            let which = (rng.next() % 4) as usize;
            if held[which] {
                sim.release(positions[which]);
            } else {
                sim.press(positions[which]);
            }
            held[which] = !held[which];
            assert_consistent(&sim);

            sim.advance(rng.next() % 120);
            assert_consistent(&sim);
        }

        for (i, pos) in positions.iter().enumerate() {
            if held[i] {
                sim.release(*pos);
            }
        }
        sim.advance(1000);
        assert!(sim.engine().active().is_empty(), "seed {}", seed);
        assert_eq!(sim.host().timers().pending(), 0, "seed {}", seed);
    }
}

//! Chord matching and gesture state tracking.
//!
//! [`GlobalTriggerDetector`] consumes the raw system key-event stream and
//! decides, per event, whether to swallow it and whether it marks the edge
//! of a dictation gesture.  It runs inside the event-interception path, so
//! every branch here is pure in-memory work: the only external touches are
//! one atomic read of the engine-readiness flag and one non-blocking
//! `try_send` on the signal channel.
//!
//! # Matching rules
//!
//! * **Key chord** (`ctrl+shift+space`): Start on key-down when the live
//!   modifier set equals the binding's set *exactly*; Stop on key-up of the
//!   bound key while the gesture is held, regardless of which modifiers are
//!   still down at that instant — users routinely release modifiers a
//!   fraction before the main key.
//! * **Modifier-only chord** (`ctrl+shift`): the intent is ambiguous while
//!   modifiers are still accumulating, so the detector tracks the *peak*
//!   modifier count of the press sequence and commits a gesture on the
//!   first release — but only if the peak exactly matched the target set
//!   and no ordinary key was typed meanwhile.  Committed gestures toggle
//!   between Start and Stop.
//!
//! A binding change mid-gesture does not disturb the gesture in progress;
//! the bound key is captured at press time and the release is matched
//! against that capture.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::{Action, Modifier, ModifierSet, ShortcutBinding, TriggerSignal};

// ---------------------------------------------------------------------------
// GlobalTriggerDetector
// ---------------------------------------------------------------------------

/// Tracks one chord binding against the live key-event stream.
///
/// Wrap in `Arc<Mutex<…>>` to share between the interception thread (which
/// calls [`handle`](Self::handle)) and the configuration path (which calls
/// [`configure`](Self::configure)).
pub struct GlobalTriggerDetector {
    binding: ShortcutBinding,
    /// Physical modifier keys currently held (left/right tracked
    /// separately so releasing one of a pair keeps the class alive).
    held: Vec<rdev::Key>,
    /// Key-chord gesture in progress, captured at press time.
    pressed: Option<PressedGesture>,
    /// Peak modifier-class count of the current press sequence.
    peak: usize,
    /// The live set exactly equalled the target at some point this sequence.
    target_hit: bool,
    /// An ordinary key was typed during this sequence — it is a combination,
    /// not a chord tap.
    poisoned: bool,
    /// Modifier-only gestures toggle: `true` between Start and Stop.
    engaged: bool,
    /// Lowered while the OS-level interception permission is missing.
    active: bool,
    /// Engine readiness, shared with the router; read, never written.
    engine_ready: Arc<AtomicBool>,
    signals: mpsc::Sender<TriggerSignal>,
}

struct PressedGesture {
    key: rdev::Key,
    /// `false` when the press was consumed but rejected (engine not ready);
    /// the matching release is still swallowed, but no Stop is emitted.
    started: bool,
}

impl GlobalTriggerDetector {
    /// Create a detector for `binding`.
    ///
    /// * `engine_ready` — readiness flag owned by the engine router; a Start
    ///   is only emitted while it reads `true`.
    /// * `signals` — channel to the orchestrator.  Sends use `try_send`;
    ///   a full channel drops the signal rather than blocking this path.
    pub fn new(
        binding: ShortcutBinding,
        engine_ready: Arc<AtomicBool>,
        signals: mpsc::Sender<TriggerSignal>,
    ) -> Self {
        Self {
            binding,
            held: Vec::new(),
            pressed: None,
            peak: 0,
            target_hit: false,
            poisoned: false,
            engaged: false,
            active: true,
            engine_ready,
            signals,
        }
    }

    /// Replace the active binding.
    ///
    /// Safe to call at any time; a gesture already in progress completes
    /// against the binding captured at its press, and the new binding
    /// applies from the next gesture on.
    pub fn configure(&mut self, binding: ShortcutBinding) {
        self.binding = binding;
        self.peak = 0;
        self.target_hit = false;
        self.poisoned = false;
        log::info!("trigger: binding replaced");
    }

    /// The currently configured binding.
    pub fn binding(&self) -> ShortcutBinding {
        self.binding
    }

    /// Whether the detector is intercepting events.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Raise or lower the interception-permission status.
    ///
    /// While inactive every event passes through untouched.  Deactivating
    /// mid-gesture emits a final Stop so the state machine is not left in
    /// `Recording` with no release ever arriving; transient tracking state
    /// is discarded because key-up events may have been missed.
    pub fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        if !active {
            let started = self.pressed.take().is_some_and(|g| g.started);
            if started || self.engaged {
                self.send(TriggerSignal::Stop);
            }
            self.engaged = false;
        }
        self.held.clear();
        self.peak = 0;
        self.target_hit = false;
        self.poisoned = false;
        log::info!(
            "trigger: detector {}",
            if active { "active" } else { "inactive" }
        );
    }

    // -----------------------------------------------------------------------
    // Event handling
    // -----------------------------------------------------------------------

    /// Decide whether `event` is consumed, updating gesture state and
    /// emitting signals as a side effect.
    pub fn handle(&mut self, event: &rdev::EventType) -> Action {
        if !self.active {
            return Action::PassThrough;
        }

        match *event {
            rdev::EventType::KeyPress(key) => match Modifier::from_key(key) {
                Some(_) => self.on_modifier_down(key),
                None => self.on_key_down(key),
            },
            rdev::EventType::KeyRelease(key) => match Modifier::from_key(key) {
                Some(_) => self.on_modifier_up(key),
                None => self.on_key_up(key),
            },
            // Mouse and wheel events are none of our business.
            _ => Action::PassThrough,
        }
    }

    fn on_modifier_down(&mut self, key: rdev::Key) -> Action {
        if !self.held.contains(&key) {
            self.held.push(key);
        }

        if self.binding.key.is_none() && self.pressed.is_none() {
            let live = self.live_modifiers();
            let count = live.count();
            if count > self.peak {
                self.peak = count;
            }
            if live == self.binding.modifiers {
                self.target_hit = true;
            }
        }

        // Modifier keys always propagate — swallowing ctrl or shift would
        // break every other shortcut in the system.
        Action::PassThrough
    }

    fn on_modifier_up(&mut self, key: rdev::Key) -> Action {
        // Modifier-only chords commit when the peak begins to recede.
        if self.binding.key.is_none() && self.pressed.is_none() && self.commit_armed() {
            self.target_hit = false;
            self.commit_modifier_gesture();
        }

        self.held.retain(|&k| k != key);
        if self.live_modifiers().is_empty() {
            self.peak = 0;
            self.target_hit = false;
            self.poisoned = false;
        }
        Action::PassThrough
    }

    fn on_key_down(&mut self, key: rdev::Key) -> Action {
        if let Some(gesture) = &self.pressed {
            if gesture.key == key {
                // OS auto-repeat while the chord is held — swallow silently,
                // one physical press is one Start.
                return Action::Consume;
            }
        }

        // Typing an ordinary key mid-sequence turns a modifier tap into a
        // combination; the sequence can no longer commit.
        if !self.live_modifiers().is_empty() {
            self.poisoned = true;
        }

        if self.pressed.is_none()
            && self.binding.key == Some(key)
            && self.live_modifiers() == self.binding.modifiers
        {
            if self.engine_ready.load(Ordering::Relaxed) {
                self.pressed = Some(PressedGesture { key, started: true });
                log::debug!("trigger: chord down → Start");
                self.send(TriggerSignal::Start);
            } else {
                self.pressed = Some(PressedGesture {
                    key,
                    started: false,
                });
                log::debug!("trigger: chord down but engine not ready → Rejected");
                self.send(TriggerSignal::Rejected);
            }
            return Action::Consume;
        }

        Action::PassThrough
    }

    fn on_key_up(&mut self, key: rdev::Key) -> Action {
        // Release of the bound key always ends the gesture, even if the
        // modifiers were let go first.
        if self.pressed.as_ref().is_some_and(|g| g.key == key) {
            if self.pressed.take().is_some_and(|g| g.started) {
                log::debug!("trigger: chord up → Stop");
                self.send(TriggerSignal::Stop);
            }
            return Action::Consume;
        }
        Action::PassThrough
    }

    // -----------------------------------------------------------------------
    // Modifier-only gestures
    // -----------------------------------------------------------------------

    /// A modifier release right now would commit the gesture: the target
    /// set was hit, the peak never went past it, and no ordinary key was
    /// typed along the way.
    fn commit_armed(&self) -> bool {
        self.target_hit && self.peak == self.binding.modifiers.count() && !self.poisoned
    }

    fn commit_modifier_gesture(&mut self) {
        if self.engaged {
            self.engaged = false;
            log::debug!("trigger: modifier chord tap → Stop");
            self.send(TriggerSignal::Stop);
        } else if self.engine_ready.load(Ordering::Relaxed) {
            self.engaged = true;
            log::debug!("trigger: modifier chord tap → Start");
            self.send(TriggerSignal::Start);
        } else {
            log::debug!("trigger: modifier chord tap but engine not ready → Rejected");
            self.send(TriggerSignal::Rejected);
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Current modifier-class set derived from the held physical keys.
    fn live_modifiers(&self) -> ModifierSet {
        let mut set = ModifierSet::empty();
        for &key in &self.held {
            if let Some(m) = Modifier::from_key(key) {
                set.insert(m);
            }
        }
        set
    }

    fn send(&self, signal: TriggerSignal) {
        if let Err(e) = self.signals.try_send(signal) {
            // Never block the interception path; a dropped signal under a
            // flooded channel is preferable to a stalled keyboard.
            log::warn!("trigger: signal channel full, dropping {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rdev::EventType::{KeyPress, KeyRelease};
    use rdev::Key;

    fn make_detector(
        combo: &str,
        ready: bool,
    ) -> (
        GlobalTriggerDetector,
        mpsc::Receiver<TriggerSignal>,
        Arc<AtomicBool>,
    ) {
        let (tx, rx) = mpsc::channel(16);
        let flag = Arc::new(AtomicBool::new(ready));
        let binding: ShortcutBinding = combo.parse().expect("combo");
        (
            GlobalTriggerDetector::new(binding, Arc::clone(&flag), tx),
            rx,
            flag,
        )
    }

    fn drain(rx: &mut mpsc::Receiver<TriggerSignal>) -> Vec<TriggerSignal> {
        let mut out = Vec::new();
        while let Ok(s) = rx.try_recv() {
            out.push(s);
        }
        out
    }

    // ---- Exact-set law -----------------------------------------------------

    #[test]
    fn exact_modifier_match_starts() {
        let (mut det, mut rx, _) = make_detector("ctrl+shift+c", true);

        assert_eq!(det.handle(&KeyPress(Key::ControlLeft)), Action::PassThrough);
        assert_eq!(det.handle(&KeyPress(Key::ShiftLeft)), Action::PassThrough);
        assert_eq!(det.handle(&KeyPress(Key::KeyC)), Action::Consume);

        assert_eq!(drain(&mut rx), vec![TriggerSignal::Start]);
    }

    #[test]
    fn superset_of_modifiers_does_not_match() {
        let (mut det, mut rx, _) = make_detector("ctrl+shift+c", true);

        det.handle(&KeyPress(Key::ControlLeft));
        det.handle(&KeyPress(Key::ShiftLeft));
        det.handle(&KeyPress(Key::MetaLeft)); // extra modifier
        assert_eq!(det.handle(&KeyPress(Key::KeyC)), Action::PassThrough);

        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn subset_of_modifiers_does_not_match() {
        let (mut det, mut rx, _) = make_detector("ctrl+shift+cmd+c", true);

        det.handle(&KeyPress(Key::ControlLeft));
        det.handle(&KeyPress(Key::ShiftLeft));
        assert_eq!(det.handle(&KeyPress(Key::KeyC)), Action::PassThrough);

        assert!(drain(&mut rx).is_empty());
    }

    // ---- Debounce law ------------------------------------------------------

    #[test]
    fn one_press_one_start_despite_auto_repeat() {
        let (mut det, mut rx, _) = make_detector("ctrl+space", true);

        det.handle(&KeyPress(Key::ControlLeft));
        assert_eq!(det.handle(&KeyPress(Key::Space)), Action::Consume);
        // OS auto-repeat
        assert_eq!(det.handle(&KeyPress(Key::Space)), Action::Consume);
        assert_eq!(det.handle(&KeyPress(Key::Space)), Action::Consume);
        assert_eq!(det.handle(&KeyRelease(Key::Space)), Action::Consume);

        assert_eq!(drain(&mut rx), vec![TriggerSignal::Start, TriggerSignal::Stop]);
    }

    // ---- Stop asymmetry ----------------------------------------------------

    #[test]
    fn stop_fires_despite_modifier_released_first() {
        let (mut det, mut rx, _) = make_detector("ctrl+shift+c", true);

        det.handle(&KeyPress(Key::ControlLeft));
        det.handle(&KeyPress(Key::ShiftLeft));
        det.handle(&KeyPress(Key::KeyC));
        // User lets go of shift before the main key.
        det.handle(&KeyRelease(Key::ShiftLeft));
        assert_eq!(det.handle(&KeyRelease(Key::KeyC)), Action::Consume);

        assert_eq!(drain(&mut rx), vec![TriggerSignal::Start, TriggerSignal::Stop]);
    }

    #[test]
    fn release_of_unbound_key_passes_through() {
        let (mut det, mut rx, _) = make_detector("ctrl+c", true);
        assert_eq!(det.handle(&KeyRelease(Key::KeyC)), Action::PassThrough);
        assert!(drain(&mut rx).is_empty());
    }

    // ---- Engine readiness --------------------------------------------------

    #[test]
    fn not_ready_consumes_but_emits_rejection() {
        let (mut det, mut rx, _) = make_detector("ctrl+space", false);

        det.handle(&KeyPress(Key::ControlLeft));
        assert_eq!(det.handle(&KeyPress(Key::Space)), Action::Consume);
        // The matching release is swallowed too, with no Stop.
        assert_eq!(det.handle(&KeyRelease(Key::Space)), Action::Consume);

        assert_eq!(drain(&mut rx), vec![TriggerSignal::Rejected]);
    }

    #[test]
    fn readiness_flip_allows_next_gesture() {
        let (mut det, mut rx, flag) = make_detector("ctrl+space", false);

        det.handle(&KeyPress(Key::ControlLeft));
        det.handle(&KeyPress(Key::Space));
        det.handle(&KeyRelease(Key::Space));
        assert_eq!(drain(&mut rx), vec![TriggerSignal::Rejected]);

        flag.store(true, Ordering::Relaxed);
        det.handle(&KeyPress(Key::Space));
        det.handle(&KeyRelease(Key::Space));
        assert_eq!(drain(&mut rx), vec![TriggerSignal::Start, TriggerSignal::Stop]);
    }

    // ---- Inactive (permission missing) -------------------------------------

    #[test]
    fn inactive_detector_passes_everything_through() {
        let (mut det, mut rx, _) = make_detector("ctrl+space", true);
        det.set_active(false);

        det.handle(&KeyPress(Key::ControlLeft));
        assert_eq!(det.handle(&KeyPress(Key::Space)), Action::PassThrough);
        assert_eq!(det.handle(&KeyRelease(Key::Space)), Action::PassThrough);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn deactivation_mid_gesture_emits_stop() {
        let (mut det, mut rx, _) = make_detector("ctrl+space", true);

        det.handle(&KeyPress(Key::ControlLeft));
        det.handle(&KeyPress(Key::Space));
        assert_eq!(drain(&mut rx), vec![TriggerSignal::Start]);

        det.set_active(false);
        assert_eq!(drain(&mut rx), vec![TriggerSignal::Stop]);
    }

    #[test]
    fn reactivated_detector_matches_again() {
        let (mut det, mut rx, _) = make_detector("ctrl+space", true);
        det.set_active(false);
        det.set_active(true);

        det.handle(&KeyPress(Key::ControlLeft));
        assert_eq!(det.handle(&KeyPress(Key::Space)), Action::Consume);
        assert_eq!(drain(&mut rx), vec![TriggerSignal::Start]);
    }

    // ---- Reconfiguration ---------------------------------------------------

    #[test]
    fn configure_mid_gesture_still_stops_old_chord() {
        let (mut det, mut rx, _) = make_detector("ctrl+space", true);

        det.handle(&KeyPress(Key::ControlLeft));
        det.handle(&KeyPress(Key::Space));
        assert_eq!(drain(&mut rx), vec![TriggerSignal::Start]);

        det.configure("ctrl+f9".parse().unwrap());

        // The in-flight gesture completes against the old bound key.
        assert_eq!(det.handle(&KeyRelease(Key::Space)), Action::Consume);
        assert_eq!(drain(&mut rx), vec![TriggerSignal::Stop]);

        // The new binding applies from the next gesture.
        assert_eq!(det.handle(&KeyPress(Key::F9)), Action::Consume);
        assert_eq!(drain(&mut rx), vec![TriggerSignal::Start]);
    }

    // ---- Modifier-only chords ----------------------------------------------

    #[test]
    fn modifier_only_tap_toggles_start_then_stop() {
        let (mut det, mut rx, _) = make_detector("ctrl+shift", true);

        // Tap 1: Start commits when the peak recedes.
        det.handle(&KeyPress(Key::ControlLeft));
        det.handle(&KeyPress(Key::ShiftLeft));
        assert!(drain(&mut rx).is_empty()); // nothing until a release
        det.handle(&KeyRelease(Key::ShiftLeft));
        det.handle(&KeyRelease(Key::ControlLeft));
        assert_eq!(drain(&mut rx), vec![TriggerSignal::Start]);

        // Tap 2: Stop.
        det.handle(&KeyPress(Key::ControlLeft));
        det.handle(&KeyPress(Key::ShiftLeft));
        det.handle(&KeyRelease(Key::ControlLeft));
        det.handle(&KeyRelease(Key::ShiftLeft));
        assert_eq!(drain(&mut rx), vec![TriggerSignal::Stop]);
    }

    #[test]
    fn modifier_only_peak_exceeded_does_not_commit() {
        let (mut det, mut rx, _) = make_detector("ctrl+shift", true);

        det.handle(&KeyPress(Key::ControlLeft));
        det.handle(&KeyPress(Key::ShiftLeft));
        det.handle(&KeyPress(Key::MetaLeft)); // peak now 3 > target 2
        det.handle(&KeyRelease(Key::MetaLeft));
        det.handle(&KeyRelease(Key::ShiftLeft));
        det.handle(&KeyRelease(Key::ControlLeft));

        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn modifier_only_poisoned_by_ordinary_key() {
        let (mut det, mut rx, _) = make_detector("ctrl+shift", true);

        // ctrl+shift+t in some other application — not a chord tap.
        det.handle(&KeyPress(Key::ControlLeft));
        det.handle(&KeyPress(Key::ShiftLeft));
        assert_eq!(det.handle(&KeyPress(Key::KeyT)), Action::PassThrough);
        det.handle(&KeyRelease(Key::KeyT));
        det.handle(&KeyRelease(Key::ShiftLeft));
        det.handle(&KeyRelease(Key::ControlLeft));

        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn modifier_only_commit_is_single_per_sequence() {
        let (mut det, mut rx, _) = make_detector("ctrl+shift", true);

        det.handle(&KeyPress(Key::ControlLeft));
        det.handle(&KeyPress(Key::ShiftLeft));
        det.handle(&KeyRelease(Key::ShiftLeft));
        // The second release of the same sequence must not commit again.
        det.handle(&KeyRelease(Key::ControlLeft));

        assert_eq!(drain(&mut rx), vec![TriggerSignal::Start]);
    }

    #[test]
    fn modifier_only_not_ready_rejects() {
        let (mut det, mut rx, _) = make_detector("ctrl+shift", false);

        det.handle(&KeyPress(Key::ControlLeft));
        det.handle(&KeyPress(Key::ShiftLeft));
        det.handle(&KeyRelease(Key::ShiftLeft));
        det.handle(&KeyRelease(Key::ControlLeft));

        assert_eq!(drain(&mut rx), vec![TriggerSignal::Rejected]);
    }

    // ---- Left/right modifier pairs -----------------------------------------

    #[test]
    fn releasing_one_of_a_modifier_pair_keeps_class_alive() {
        let (mut det, mut rx, _) = make_detector("ctrl+c", true);

        det.handle(&KeyPress(Key::ControlLeft));
        det.handle(&KeyPress(Key::ControlRight));
        det.handle(&KeyRelease(Key::ControlLeft));
        // Control is still held via the right key.
        assert_eq!(det.handle(&KeyPress(Key::KeyC)), Action::Consume);
        assert_eq!(drain(&mut rx), vec![TriggerSignal::Start]);
    }

    // ---- Unrelated events --------------------------------------------------

    #[test]
    fn mouse_events_pass_through() {
        let (mut det, mut rx, _) = make_detector("ctrl+space", true);
        let ev = rdev::EventType::MouseMove { x: 1.0, y: 2.0 };
        assert_eq!(det.handle(&ev), Action::PassThrough);
        assert!(drain(&mut rx).is_empty());
    }
}

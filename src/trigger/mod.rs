//! Global trigger subsystem — chord matching over system-wide key events.
//!
//! # Design
//!
//! The OS delivers every key-down/key-up in the system to the interception
//! callback, which must decide in microseconds whether the event is consumed
//! (swallowed before other applications see it) or passed through.  That
//! decision lives in [`GlobalTriggerDetector`]; the blocking OS hook itself
//! is isolated in [`TriggerListener`], which runs on a dedicated thread.
//!
//! Start/Stop signals leave the event-interception domain through a
//! `tokio::sync::mpsc` channel using `try_send` — the hot path never waits
//! on the pipeline.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//! use tokio::sync::mpsc;
//! use push_to_text::trigger::{GlobalTriggerDetector, ShortcutBinding, TriggerListener};
//!
//! let (tx, mut rx) = mpsc::channel(16);
//! let binding: ShortcutBinding = "ctrl+shift+space".parse().expect("bad combo");
//! let ready = Arc::new(std::sync::atomic::AtomicBool::new(true));
//! let detector = Arc::new(Mutex::new(GlobalTriggerDetector::new(binding, ready, tx)));
//! let _listener = TriggerListener::start(detector);
//!
//! // In the orchestrator loop:
//! // while let Some(signal) = rx.recv().await { ... }
//! ```

pub mod detector;
pub mod listener;

pub use detector::GlobalTriggerDetector;
pub use listener::TriggerListener;

use std::str::FromStr;

use thiserror::Error;

// ---------------------------------------------------------------------------
// TriggerSignal / Action
// ---------------------------------------------------------------------------

/// Signals emitted by the detector, one per committed gesture edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSignal {
    /// The configured chord was pressed — begin recording.
    Start,
    /// The configured chord was released — seal the buffer and process.
    Stop,
    /// The chord was pressed but the active engine is not ready; the event
    /// was consumed and no recording starts.  The consumer is expected to
    /// route user feedback to the output boundary.
    Rejected,
}

/// Per-event decision returned to the OS hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Swallow the event; no other application sees it.
    Consume,
    /// Let the event propagate normally.
    PassThrough,
}

// ---------------------------------------------------------------------------
// Modifier / ModifierSet
// ---------------------------------------------------------------------------

/// The five tracked modifier classes.  Left/right variants of a physical
/// modifier collapse into one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Control,
    Alt,
    Shift,
    Meta,
    CapsLock,
}

impl Modifier {
    /// Classify an `rdev` key as a modifier, or `None` for ordinary keys.
    pub fn from_key(key: rdev::Key) -> Option<Self> {
        use rdev::Key::*;
        match key {
            ControlLeft | ControlRight => Some(Modifier::Control),
            Alt | AltGr => Some(Modifier::Alt),
            ShiftLeft | ShiftRight => Some(Modifier::Shift),
            MetaLeft | MetaRight => Some(Modifier::Meta),
            CapsLock => Some(Modifier::CapsLock),
            _ => None,
        }
    }
}

/// A set of modifier classes.
///
/// Binding satisfaction uses **exact equality** — a binding requiring
/// `ctrl+shift` rejects an event carrying `ctrl+shift+cmd`.  Supersets and
/// subsets never match; this is what keeps unrelated application shortcuts
/// from triggering a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModifierSet {
    pub control: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
    pub caps_lock: bool,
}

impl ModifierSet {
    /// The empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a modifier class to the set.
    pub fn insert(&mut self, m: Modifier) {
        match m {
            Modifier::Control => self.control = true,
            Modifier::Alt => self.alt = true,
            Modifier::Shift => self.shift = true,
            Modifier::Meta => self.meta = true,
            Modifier::CapsLock => self.caps_lock = true,
        }
    }

    /// Number of modifier classes present.
    pub fn count(&self) -> usize {
        [self.control, self.alt, self.shift, self.meta, self.caps_lock]
            .iter()
            .filter(|&&b| b)
            .count()
    }

    /// Returns `true` when no modifier class is present.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

// ---------------------------------------------------------------------------
// ShortcutBinding
// ---------------------------------------------------------------------------

/// A chord: an optional physical key plus a required modifier set.
///
/// `key == None` describes a modifier-only chord (e.g. `"ctrl+shift"`),
/// which the detector matches via peak tracking rather than a key edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShortcutBinding {
    pub key: Option<rdev::Key>,
    pub modifiers: ModifierSet,
}

/// Errors produced when parsing a combo string into a [`ShortcutBinding`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingParseError {
    #[error("empty key combination")]
    Empty,

    #[error("unknown key or modifier {0:?}")]
    UnknownToken(String),

    #[error("combination names more than one non-modifier key ({0:?} and {1:?})")]
    MultipleKeys(String, String),
}

impl FromStr for ShortcutBinding {
    type Err = BindingParseError;

    /// Parse a combo string like `"ctrl+shift+space"`, `"option+f"` or the
    /// modifier-only `"ctrl+shift"`.
    ///
    /// Tokens are case-insensitive and separated by `+`; duplicate modifiers
    /// are collapsed.  At most one non-modifier key may appear.
    fn from_str(combo: &str) -> Result<Self, Self::Err> {
        let combo = combo.trim().to_lowercase();
        if combo.is_empty() {
            return Err(BindingParseError::Empty);
        }

        let mut modifiers = ModifierSet::empty();
        let mut key: Option<(String, rdev::Key)> = None;

        for token in combo.split('+') {
            let token = token.trim();
            if token.is_empty() {
                return Err(BindingParseError::Empty);
            }
            if let Some(m) = parse_modifier(token) {
                modifiers.insert(m);
            } else if let Some(k) = parse_key(token) {
                if let Some((first, _)) = &key {
                    return Err(BindingParseError::MultipleKeys(
                        first.clone(),
                        token.to_string(),
                    ));
                }
                key = Some((token.to_string(), k));
            } else {
                return Err(BindingParseError::UnknownToken(token.to_string()));
            }
        }

        Ok(ShortcutBinding {
            key: key.map(|(_, k)| k),
            modifiers,
        })
    }
}

impl std::fmt::Display for ShortcutBinding {
    /// Render the binding back into normalised combo form, e.g.
    /// `"ctrl+shift+space"`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key_name = self.key.map(|key| format!("{key:?}").to_lowercase());
        let mut parts: Vec<&str> = Vec::new();
        if self.modifiers.control {
            parts.push("ctrl");
        }
        if self.modifiers.alt {
            parts.push("alt");
        }
        if self.modifiers.shift {
            parts.push("shift");
        }
        if self.modifiers.meta {
            parts.push("cmd");
        }
        if self.modifiers.caps_lock {
            parts.push("capslock");
        }
        if let Some(name) = &key_name {
            // rdev debug names carry `Key`/`Num` prefixes ("KeyC", "Num1").
            let mut stripped = name.trim_start_matches("key");
            if stripped.len() == 4 && stripped.starts_with("num") {
                stripped = &stripped[3..];
            }
            parts.push(stripped);
        }
        write!(f, "{}", parts.join("+"))
    }
}

// ---------------------------------------------------------------------------
// Token tables
// ---------------------------------------------------------------------------

fn parse_modifier(token: &str) -> Option<Modifier> {
    match token {
        "ctrl" | "control" => Some(Modifier::Control),
        "alt" | "option" => Some(Modifier::Alt),
        "shift" => Some(Modifier::Shift),
        "cmd" | "command" | "meta" | "super" | "win" => Some(Modifier::Meta),
        "capslock" => Some(Modifier::CapsLock),
        _ => None,
    }
}

/// Parse a key name (lowercase) into an [`rdev::Key`].
///
/// Supports letters, digits, F1–F12 and the common named keys.  Returns
/// `None` for unrecognised names so callers can surface a typed error.
pub fn parse_key(token: &str) -> Option<rdev::Key> {
    use rdev::Key::*;
    match token {
        "space" => Some(Space),
        "tab" => Some(Tab),
        "return" | "enter" => Some(Return),
        "escape" | "esc" => Some(Escape),
        "backspace" => Some(Backspace),
        "delete" | "del" => Some(Delete),
        "home" => Some(Home),
        "end" => Some(End),
        "pageup" => Some(PageUp),
        "pagedown" => Some(PageDown),
        "up" => Some(UpArrow),
        "down" => Some(DownArrow),
        "left" => Some(LeftArrow),
        "right" => Some(RightArrow),

        "a" => Some(KeyA),
        "b" => Some(KeyB),
        "c" => Some(KeyC),
        "d" => Some(KeyD),
        "e" => Some(KeyE),
        "f" => Some(KeyF),
        "g" => Some(KeyG),
        "h" => Some(KeyH),
        "i" => Some(KeyI),
        "j" => Some(KeyJ),
        "k" => Some(KeyK),
        "l" => Some(KeyL),
        "m" => Some(KeyM),
        "n" => Some(KeyN),
        "o" => Some(KeyO),
        "p" => Some(KeyP),
        "q" => Some(KeyQ),
        "r" => Some(KeyR),
        "s" => Some(KeyS),
        "t" => Some(KeyT),
        "u" => Some(KeyU),
        "v" => Some(KeyV),
        "w" => Some(KeyW),
        "x" => Some(KeyX),
        "y" => Some(KeyY),
        "z" => Some(KeyZ),

        "0" => Some(Num0),
        "1" => Some(Num1),
        "2" => Some(Num2),
        "3" => Some(Num3),
        "4" => Some(Num4),
        "5" => Some(Num5),
        "6" => Some(Num6),
        "7" => Some(Num7),
        "8" => Some(Num8),
        "9" => Some(Num9),

        "f1" => Some(F1),
        "f2" => Some(F2),
        "f3" => Some(F3),
        "f4" => Some(F4),
        "f5" => Some(F5),
        "f6" => Some(F6),
        "f7" => Some(F7),
        "f8" => Some(F8),
        "f9" => Some(F9),
        "f10" => Some(F10),
        "f11" => Some(F11),
        "f12" => Some(F12),

        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- ModifierSet -------------------------------------------------------

    #[test]
    fn modifier_set_exact_equality() {
        let mut a = ModifierSet::empty();
        a.insert(Modifier::Control);
        a.insert(Modifier::Shift);

        let mut b = ModifierSet::empty();
        b.insert(Modifier::Shift);
        b.insert(Modifier::Control);
        assert_eq!(a, b);

        // Superset must not compare equal.
        let mut c = b;
        c.insert(Modifier::Meta);
        assert_ne!(a, c);
    }

    #[test]
    fn modifier_set_count() {
        let mut m = ModifierSet::empty();
        assert_eq!(m.count(), 0);
        m.insert(Modifier::Control);
        m.insert(Modifier::Control); // duplicate — still one class
        m.insert(Modifier::Alt);
        assert_eq!(m.count(), 2);
    }

    #[test]
    fn left_and_right_collapse_to_one_class() {
        assert_eq!(
            Modifier::from_key(rdev::Key::ControlLeft),
            Modifier::from_key(rdev::Key::ControlRight)
        );
        assert_eq!(
            Modifier::from_key(rdev::Key::MetaLeft),
            Some(Modifier::Meta)
        );
        assert_eq!(Modifier::from_key(rdev::Key::KeyA), None);
    }

    // ---- Binding parsing ---------------------------------------------------

    #[test]
    fn parse_key_plus_modifiers() {
        let b: ShortcutBinding = "ctrl+shift+space".parse().unwrap();
        assert_eq!(b.key, Some(rdev::Key::Space));
        assert!(b.modifiers.control);
        assert!(b.modifiers.shift);
        assert!(!b.modifiers.meta);
    }

    #[test]
    fn parse_is_case_insensitive() {
        let b: ShortcutBinding = "Ctrl+Shift+C".parse().unwrap();
        assert_eq!(b.key, Some(rdev::Key::KeyC));
        assert_eq!(b.modifiers.count(), 2);
    }

    #[test]
    fn parse_modifier_only_combo() {
        let b: ShortcutBinding = "ctrl+shift".parse().unwrap();
        assert_eq!(b.key, None);
        assert_eq!(b.modifiers.count(), 2);
    }

    #[test]
    fn parse_bare_function_key() {
        let b: ShortcutBinding = "f9".parse().unwrap();
        assert_eq!(b.key, Some(rdev::Key::F9));
        assert!(b.modifiers.is_empty());
    }

    #[test]
    fn parse_option_alias() {
        let b: ShortcutBinding = "option+f".parse().unwrap();
        assert!(b.modifiers.alt);
        assert_eq!(b.key, Some(rdev::Key::KeyF));
    }

    #[test]
    fn parse_duplicate_modifiers_collapse() {
        let b: ShortcutBinding = "ctrl+control+space".parse().unwrap();
        assert_eq!(b.modifiers.count(), 1);
    }

    #[test]
    fn parse_empty_is_error() {
        assert_eq!(
            "".parse::<ShortcutBinding>().unwrap_err(),
            BindingParseError::Empty
        );
        assert_eq!(
            "  ".parse::<ShortcutBinding>().unwrap_err(),
            BindingParseError::Empty
        );
    }

    #[test]
    fn parse_unknown_token_is_error() {
        assert!(matches!(
            "ctrl+bogus".parse::<ShortcutBinding>().unwrap_err(),
            BindingParseError::UnknownToken(t) if t == "bogus"
        ));
    }

    #[test]
    fn parse_two_keys_is_error() {
        assert!(matches!(
            "a+b".parse::<ShortcutBinding>().unwrap_err(),
            BindingParseError::MultipleKeys(_, _)
        ));
    }

    // ---- Display -----------------------------------------------------------

    #[test]
    fn display_round_trips_normalised_form() {
        for combo in ["ctrl+shift+space", "ctrl+c", "alt+f9", "ctrl+shift"] {
            let b: ShortcutBinding = combo.parse().unwrap();
            assert_eq!(b.to_string(), combo);
            let reparsed: ShortcutBinding = b.to_string().parse().unwrap();
            assert_eq!(reparsed, b);
        }
    }

    #[test]
    fn display_normalises_aliases() {
        let b: ShortcutBinding = "Control+Option+F".parse().unwrap();
        assert_eq!(b.to_string(), "ctrl+alt+f");
    }
}

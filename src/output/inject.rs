//! Clipboard-paste text delivery.
//!
//! Synthesising one key event per character breaks on anything outside
//! ASCII (dead keys, IMEs, combining marks), so delivery goes through the
//! clipboard instead:
//!
//! 1. Save the current clipboard text.
//! 2. Write the transcript into the clipboard.
//! 3. Simulate the platform paste shortcut (⌘V / Ctrl+V).
//! 4. Restore the original clipboard content (best-effort).
//!
//! If the paste simulation fails the transcript is left on the clipboard so
//! the user can paste it manually — delivery degrades, it never loses text.

use arboard::Clipboard;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use thiserror::Error;

use super::{Notification, OutputSink, Transcript};

// ---------------------------------------------------------------------------
// InjectError
// ---------------------------------------------------------------------------

/// Errors surfacing during text delivery.
#[derive(Debug, Error)]
pub enum InjectError {
    /// Could not open or read the system clipboard.
    #[error("cannot access clipboard: {0}")]
    ClipboardAccess(String),

    /// Could not write text to the system clipboard.
    #[error("cannot set clipboard text: {0}")]
    ClipboardSet(String),

    /// Could not simulate a key press/release event.
    #[error("cannot simulate key press: {0}")]
    KeySimulation(String),
}

// ---------------------------------------------------------------------------
// Clipboard helpers
// ---------------------------------------------------------------------------

/// Capture the current clipboard plain-text content.
///
/// `Ok(None)` when the clipboard is empty or holds non-text data; that is
/// not an error.
fn save_clipboard() -> Result<Option<String>, InjectError> {
    let mut clipboard = open_clipboard()?;
    Ok(clipboard.get_text().ok())
}

fn set_clipboard(text: &str) -> Result<(), InjectError> {
    let mut clipboard = open_clipboard()?;
    clipboard
        .set_text(text)
        .map_err(|e| InjectError::ClipboardSet(e.to_string()))
}

fn restore_clipboard(saved: Option<String>) -> Result<(), InjectError> {
    match saved {
        Some(text) => set_clipboard(&text),
        None => Ok(()),
    }
}

/// A fresh handle per call — `arboard::Clipboard` is not `Send` on every
/// platform and is cheap to open.
fn open_clipboard() -> Result<Clipboard, InjectError> {
    Clipboard::new().map_err(|e| InjectError::ClipboardAccess(e.to_string()))
}

// ---------------------------------------------------------------------------
// Paste simulation
// ---------------------------------------------------------------------------

/// Simulate the system paste shortcut in the focused window.
///
/// macOS uses ⌘V, everything else Ctrl+V.  A new [`Enigo`] handle is
/// created per call because `Enigo` is not `Send`.
fn simulate_paste() -> Result<(), InjectError> {
    let mut enigo =
        Enigo::new(&Settings::default()).map_err(|e| InjectError::KeySimulation(e.to_string()))?;

    #[cfg(target_os = "macos")]
    let modifier = Key::Meta;
    #[cfg(not(target_os = "macos"))]
    let modifier = Key::Control;

    enigo
        .key(modifier, Direction::Press)
        .map_err(|e| InjectError::KeySimulation(e.to_string()))?;
    enigo
        .key(Key::Unicode('v'), Direction::Click)
        .map_err(|e| InjectError::KeySimulation(e.to_string()))?;
    enigo
        .key(modifier, Direction::Release)
        .map_err(|e| InjectError::KeySimulation(e.to_string()))?;

    Ok(())
}

// ---------------------------------------------------------------------------
// TextInjector
// ---------------------------------------------------------------------------

/// Clipboard-paste injector with configurable settle delays.
#[derive(Debug, Clone)]
pub struct TextInjector {
    /// Milliseconds to wait after setting the clipboard before pasting —
    /// clipboard managers need a moment to observe the change.
    pub paste_delay_ms: u64,
    /// Milliseconds to wait after pasting before restoring the original
    /// clipboard, so the target app reads our text and not the restore.
    pub restore_delay_ms: u64,
}

impl Default for TextInjector {
    fn default() -> Self {
        Self {
            paste_delay_ms: 50,
            restore_delay_ms: 100,
        }
    }
}

impl TextInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the save → set → paste → restore sequence for `text`.
    ///
    /// On paste failure the transcript stays on the clipboard (the restore
    /// is skipped) and the error is returned so the caller can tell the
    /// user to paste manually.
    pub fn inject(&self, text: &str) -> Result<(), InjectError> {
        let saved = save_clipboard()?;
        set_clipboard(text)?;
        std::thread::sleep(std::time::Duration::from_millis(self.paste_delay_ms));

        if let Err(e) = simulate_paste() {
            log::warn!("inject: paste failed ({e}); transcript left on clipboard");
            return Err(e);
        }

        std::thread::sleep(std::time::Duration::from_millis(self.restore_delay_ms));
        let _ = restore_clipboard(saved);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InjectorSink
// ---------------------------------------------------------------------------

/// Production [`OutputSink`]: delivers transcripts by injection and reports
/// notifications to the log.
///
/// A desktop shell would replace this with a sink that also drives a tray
/// icon or plays an audible cue; the core neither knows nor cares.
pub struct InjectorSink {
    injector: TextInjector,
}

impl InjectorSink {
    pub fn new(injector: TextInjector) -> Self {
        Self { injector }
    }
}

impl OutputSink for InjectorSink {
    fn deliver(&self, transcript: Transcript) {
        if transcript.text.is_empty() {
            log::info!("output: empty transcript — nothing to inject");
            return;
        }
        log::info!(
            "output: delivering {} chars (engine={}, refined={}, fell_back={})",
            transcript.text.len(),
            transcript.engine,
            transcript.refinement_applied,
            transcript.fell_back
        );
        if self.injector.inject(&transcript.text).is_err() {
            log::warn!("output: injection failed — text remains on clipboard");
        }
    }

    fn notify(&self, event: Notification) {
        match event {
            Notification::EngineNotReady => {
                log::warn!("output: trigger rejected — engine not ready")
            }
            Notification::TriggerRejected => {
                log::warn!("output: trigger rejected — pipeline busy")
            }
            Notification::PipelineTimedOut => log::warn!("output: pipeline timed out"),
            Notification::PipelineFailed(reason) => {
                log::warn!("output: pipeline failed: {reason}")
            }
            Notification::PipelineSucceeded => log::info!("output: pipeline succeeded"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

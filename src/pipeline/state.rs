//! Pipeline state machine and the sealed recording session.
//!
//! [`AppState`] has exactly three states and three legal transitions:
//!
//! ```text
//! Idle ──Start (engine ready)──▶ Recording
//! Recording ──Stop──▶ Processing
//! Processing ──pipeline done / terminal failure──▶ Idle
//! ```
//!
//! Everything else is a no-op or a rejection; nothing is ever queued.  The
//! orchestrator is the only writer, so observers can never see transitions
//! out of order.

use std::sync::{Arc, Mutex};

use crate::audio::CANONICAL_SAMPLE_RATE;

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// The user-visible dictation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    /// Waiting for the chord.
    #[default]
    Idle,

    /// The chord is held; samples are flowing into the ring buffer.
    Recording,

    /// The buffer has been sealed; the two-stage pipeline is running.
    Processing,
}

impl AppState {
    /// `true` while a gesture is being captured or processed.
    pub fn is_busy(&self) -> bool {
        matches!(self, AppState::Recording | AppState::Processing)
    }

    /// Short label for status surfaces.
    pub fn label(&self) -> &'static str {
        match self {
            AppState::Idle => "Idle",
            AppState::Recording => "Recording",
            AppState::Processing => "Processing",
        }
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to the current [`AppState`].
///
/// Only the orchestrator writes; anything else (status surface, tests)
/// reads.  Lock for a field access, never across an `.await`.
pub type SharedState = Arc<Mutex<AppState>>;

/// Construct a [`SharedState`] starting in `Idle`.
pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(AppState::Idle))
}

// ---------------------------------------------------------------------------
// RecordingSession
// ---------------------------------------------------------------------------

/// The sealed audio of one Start/Stop cycle.
///
/// Created by draining the ring buffer at Stop, consumed by the pipeline,
/// then dropped — never persisted anywhere.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    samples: Vec<f32>,
}

impl RecordingSession {
    /// Seal `samples` (canonical 16 kHz mono) into a session.
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// The sealed samples in chronological order.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of samples captured.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` when nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Capture duration in seconds at the canonical rate.
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / CANONICAL_SAMPLE_RATE as f32
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_idle() {
        assert_eq!(AppState::default(), AppState::Idle);
    }

    #[test]
    fn busy_states() {
        assert!(!AppState::Idle.is_busy());
        assert!(AppState::Recording.is_busy());
        assert!(AppState::Processing.is_busy());
    }

    #[test]
    fn labels() {
        assert_eq!(AppState::Idle.label(), "Idle");
        assert_eq!(AppState::Recording.label(), "Recording");
        assert_eq!(AppState::Processing.label(), "Processing");
    }

    #[test]
    fn shared_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedState>();
    }

    #[test]
    fn session_duration() {
        let session = RecordingSession::new(vec![0.0; 8_000]);
        assert_eq!(session.len(), 8_000);
        assert!((session.duration_secs() - 0.5).abs() < 1e-6);
        assert!(!session.is_empty());
    }

    #[test]
    fn empty_session() {
        let session = RecordingSession::new(Vec::new());
        assert!(session.is_empty());
        assert_eq!(session.duration_secs(), 0.0);
    }
}

//! Output boundary — where finished text and user-facing events leave the core.
//!
//! The orchestrator never talks to the clipboard, a tray icon, or a UI; it
//! talks to one [`OutputSink`] passed in at construction.  The sink receives
//! either a [`Transcript`] (the gesture produced text) or a [`Notification`]
//! (something short and specific the user should know).  No ambient
//! listeners, no singletons — swap in a fake for tests, the production
//! injector for the binary.

pub mod inject;

pub use inject::{InjectError, InjectorSink, TextInjector};

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// The final product of one gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// The text to deliver to the user.
    pub text: String,
    /// Provenance tag of the engine that produced the base transcript.
    pub engine: String,
    /// `true` when Stage 2 ran and its output replaced the raw text.
    pub refinement_applied: bool,
    /// `true` when Stage 2 was attempted but failed or timed out, so `text`
    /// is the raw Stage-1 transcript.
    pub fell_back: bool,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// Discrete user-facing events.
///
/// Everything the user ever sees is either a [`Transcript`] or one of
/// these — raw internal failures never cross the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A chord was pressed but no transcription engine is ready.
    EngineNotReady,
    /// A Start arrived while a previous gesture was still processing; it was
    /// rejected, not queued.
    TriggerRejected,
    /// Stage 1 exceeded its ceiling; no text was produced for this gesture.
    PipelineTimedOut,
    /// Stage 1 failed with an engine-reported error; no text was produced.
    PipelineFailed(String),
    /// The gesture completed and text was delivered.
    PipelineSucceeded,
}

// ---------------------------------------------------------------------------
// OutputSink
// ---------------------------------------------------------------------------

/// Receiver for everything that leaves the pipeline.
///
/// Implementations must be cheap to call or defer their own heavy work —
/// `deliver` is invoked from the pipeline domain via `spawn_blocking`, but
/// `notify` may be called inline.
pub trait OutputSink: Send + Sync {
    /// Deliver the final text of a successful gesture.
    fn deliver(&self, transcript: Transcript);

    /// Report a discrete event.
    fn notify(&self, event: Notification);
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

/// Records everything it receives, for pipeline assertions.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSink {
    pub deliveries: std::sync::Mutex<Vec<Transcript>>,
    pub notifications: std::sync::Mutex<Vec<Notification>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Transcript> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn notified(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl OutputSink for RecordingSink {
    fn deliver(&self, transcript: Transcript) {
        self.deliveries.lock().unwrap().push(transcript);
    }

    fn notify(&self, event: Notification) {
        self.notifications.lock().unwrap().push(event);
    }
}

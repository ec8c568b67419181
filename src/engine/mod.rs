//! Engine capability traits and the hot-swap router.
//!
//! The pipeline never names a concrete backend — it sees exactly two
//! capabilities:
//!
//! * [`TranscriptionEngine`] — audio in, text out.  Mandatory; the pipeline
//!   aborts a gesture when it fails.
//! * [`RefinementEngine`] — text in, improved text out.  Optional; any
//!   failure falls back to the raw transcript.
//!
//! Both are object-safe and `Send + Sync` so they can live behind
//! `Arc<dyn …>` inside an [`EngineRouter`], which provides the atomic
//! hot-swap described in [`router`].
//!
//! Production implementations live in [`whisper`] and [`refine`]; tests use
//! [`MockTranscriber`] / [`MockRefiner`].

pub mod refine;
pub mod router;
pub mod whisper;

pub use refine::ApiRefiner;
pub use router::{EngineRouter, RefinementRouter, TranscriptionRouter};
pub use whisper::{SamplingStrategy, WhisperParams, WhisperTranscriber};

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the transcription capability.
///
/// `EngineNotReady` (no engine installed, or a model still loading) is kept
/// distinct from an engine-internal failure so the output boundary can show
/// the right message.
#[derive(Debug, Clone, Error)]
pub enum TranscribeError {
    /// No transcription engine is currently installed in the router.
    #[error("no transcription engine configured")]
    EngineNotReady,

    /// The model file was not found at the given path.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The backend failed to initialise its inference context.
    #[error("engine initialisation failed: {0}")]
    ContextInit(String),

    /// The inference pass itself reported an error.
    #[error("transcription failed: {0}")]
    Failed(String),
}

/// Errors from the refinement capability.
///
/// Every variant is recoverable — the orchestrator always falls back to the
/// raw transcript, so these only ever reach a log line.
#[derive(Debug, Clone, Error)]
pub enum RefineError {
    /// HTTP transport or connection error.
    #[error("refinement request failed: {0}")]
    Request(String),

    /// The request did not complete within the client's own timeout.
    #[error("refinement request timed out")]
    Timeout,

    /// The response could not be parsed as the expected JSON shape.
    #[error("failed to parse refinement response: {0}")]
    Parse(String),

    /// The backend returned no usable text.
    #[error("refinement returned an empty response")]
    EmptyResponse,
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Speech-to-text capability.
///
/// # Contract
///
/// * `audio` is 16 kHz mono `f32` PCM in chronological order.
/// * The call is cancellable only in the best-effort sense: dropping the
///   future stops the *wait*, not necessarily the underlying inference.
///   Implementations bridge blocking work through `spawn_blocking` so a
///   timed-out call finishes in the background and its result is discarded.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    /// Transcribe `audio` and return the transcript text.
    async fn transcribe(&self, audio: &[f32]) -> Result<String, TranscribeError>;

    /// Short provenance tag (e.g. `"whisper:base.en"`) recorded on every
    /// [`Transcript`](crate::output::Transcript) this engine produces.
    fn name(&self) -> &str;
}

/// Text refinement capability.
#[async_trait]
pub trait RefinementEngine: Send + Sync {
    /// Rewrite `text` according to `instruction` and return the result.
    async fn refine(&self, text: &str, instruction: &str) -> Result<String, RefineError>;

    /// Short provenance tag (e.g. the model identifier).
    fn name(&self) -> &str;
}

// Compile-time assertion: both traits must stay object-safe.
const _: fn() = || {
    fn _assert(_: Box<dyn TranscriptionEngine>, _: Box<dyn RefinementEngine>) {}
};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Transcription test double with a fixed response and optional delay.
///
/// The delay runs on the tokio timer, so `tokio::time::pause`-style tests
/// and real-timeout tests both work against it.
#[cfg(test)]
pub struct MockTranscriber {
    response: Result<String, TranscribeError>,
    delay: Option<std::time::Duration>,
}

#[cfg(test)]
impl MockTranscriber {
    /// Always returns `Ok(text)` immediately.
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
            delay: None,
        }
    }

    /// Always returns `Err(error)` immediately.
    pub fn err(error: TranscribeError) -> Self {
        Self {
            response: Err(error),
            delay: None,
        }
    }

    /// Returns `Ok(text)` after sleeping for `delay`.
    pub fn slow(text: impl Into<String>, delay: std::time::Duration) -> Self {
        Self {
            response: Ok(text.into()),
            delay: Some(delay),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl TranscriptionEngine for MockTranscriber {
    async fn transcribe(&self, _audio: &[f32]) -> Result<String, TranscribeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone()
    }

    fn name(&self) -> &str {
        "mock-transcriber"
    }
}

/// Refinement test double with a fixed response and optional delay.
#[cfg(test)]
pub struct MockRefiner {
    response: Result<String, RefineError>,
    delay: Option<std::time::Duration>,
}

#[cfg(test)]
impl MockRefiner {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
            delay: None,
        }
    }

    pub fn err(error: RefineError) -> Self {
        Self {
            response: Err(error),
            delay: None,
        }
    }

    pub fn slow(text: impl Into<String>, delay: std::time::Duration) -> Self {
        Self {
            response: Ok(text.into()),
            delay: Some(delay),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl RefinementEngine for MockRefiner {
    async fn refine(&self, _text: &str, _instruction: &str) -> Result<String, RefineError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone()
    }

    fn name(&self) -> &str {
        "mock-refiner"
    }
}

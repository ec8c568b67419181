//! Production transcription engine backed by `whisper-rs` (whisper.cpp).
//!
//! [`WhisperTranscriber`] loads a GGML model once and creates a fresh
//! `WhisperState` per call, so the engine can be shared across threads
//! without locking.  The blocking inference runs on the tokio blocking pool;
//! the async [`TranscriptionEngine`] surface is what the router races
//! against its timeout, and a timed-out inference simply finishes in the
//! background with its result discarded.
//!
//! Whisper emits non-speech tags during silence or noise
//! (`[BLANK_AUDIO]`, `(music)` and friends); those are filtered here so the
//! pipeline never delivers them as dictated text.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use whisper_rs::{FullParams, WhisperContext, WhisperContextParameters};

use super::{TranscribeError, TranscriptionEngine};

// ---------------------------------------------------------------------------
// Audio length guards (16 kHz mono f32)
// ---------------------------------------------------------------------------

/// Minimum audio length: 0.5 s × 16 000 Hz.
const MIN_AUDIO_SAMPLES: usize = 8_000;
/// Maximum audio length: 60 s × 16 000 Hz.
const MAX_AUDIO_SAMPLES: usize = 960_000;

// ---------------------------------------------------------------------------
// WhisperParams
// ---------------------------------------------------------------------------

/// Decoding strategy, mirroring `whisper_rs::SamplingStrategy` but owned
/// and `Clone`.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingStrategy {
    /// Greedy single-pass decoding — lowest latency, the right default for
    /// short dictation bursts.
    Greedy { best_of: i32 },
    /// Beam search — slightly better accuracy at 2–4× the latency.
    BeamSearch { beam_size: i32, patience: f32 },
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::Greedy { best_of: 1 }
    }
}

/// Parameters for a single inference run.
#[derive(Debug, Clone)]
pub struct WhisperParams {
    /// ISO-639-1 language code, or `"auto"` for built-in detection.
    pub language: String,
    /// Decoding strategy.
    pub strategy: SamplingStrategy,
    /// CPU threads handed to whisper.cpp.  Defaults to
    /// [`optimal_threads()`], capped at 8.
    pub n_threads: i32,
    /// Suppress whisper.cpp's progress chatter on stderr.
    pub suppress_progress: bool,
}

impl Default for WhisperParams {
    fn default() -> Self {
        Self {
            language: "en".into(),
            strategy: SamplingStrategy::default(),
            n_threads: optimal_threads(),
            suppress_progress: true,
        }
    }
}

/// Physical threads to use for inference, capped at 8 — beyond that Whisper
/// sees diminishing returns and starves the rest of the process.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// WhisperTranscriber
// ---------------------------------------------------------------------------

/// Transcription engine wrapping a `whisper_rs::WhisperContext`.
pub struct WhisperTranscriber {
    inner: Arc<Inner>,
    name: String,
}

struct Inner {
    ctx: WhisperContext,
    params: WhisperParams,
}

impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("name", &self.name)
            .field("params", &self.inner.params)
            .finish_non_exhaustive()
    }
}

// `WhisperContext` holds a raw pointer internally but declares
// `unsafe impl Send`/`Sync` in whisper-rs — the model weights are read-only
// after loading, and each call creates its own `WhisperState`.
// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs.
unsafe impl Send for Inner {}
unsafe impl Sync for Inner {}

impl WhisperTranscriber {
    /// Load a GGML model from `model_path`.
    ///
    /// # Errors
    ///
    /// * [`TranscribeError::ModelNotFound`] — no file at `model_path`.
    /// * [`TranscribeError::ContextInit`] — whisper-rs rejected the file.
    pub fn load(
        model_path: impl AsRef<Path>,
        params: WhisperParams,
    ) -> Result<Self, TranscribeError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(TranscribeError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            TranscribeError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx_params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| TranscribeError::ContextInit(e.to_string()))?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| format!("whisper:{s}"))
            .unwrap_or_else(|| "whisper".into());

        log::info!("whisper: model loaded from {}", path.display());
        Ok(Self {
            inner: Arc::new(Inner { ctx, params }),
            name,
        })
    }
}

impl Inner {
    /// Run one blocking inference pass.
    fn transcribe_blocking(&self, audio: &[f32]) -> Result<String, TranscribeError> {
        if audio.len() < MIN_AUDIO_SAMPLES {
            return Err(TranscribeError::Failed(format!(
                "audio too short — {} samples, minimum {}",
                audio.len(),
                MIN_AUDIO_SAMPLES
            )));
        }
        if audio.len() > MAX_AUDIO_SAMPLES {
            return Err(TranscribeError::Failed(format!(
                "audio too long — {} samples, maximum {}",
                audio.len(),
                MAX_AUDIO_SAMPLES
            )));
        }

        use whisper_rs::SamplingStrategy as WS;
        let ws = match self.params.strategy {
            SamplingStrategy::Greedy { best_of } => WS::Greedy { best_of },
            SamplingStrategy::BeamSearch {
                beam_size,
                patience,
            } => WS::BeamSearch {
                beam_size,
                patience,
            },
        };

        let mut fp = FullParams::new(ws);

        let lang: Option<&str> = if self.params.language == "auto" {
            None
        } else {
            Some(self.params.language.as_str())
        };
        fp.set_language(lang);
        fp.set_n_threads(self.params.n_threads);

        if self.params.suppress_progress {
            fp.set_print_progress(false);
            fp.set_print_realtime(false);
        }

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| TranscribeError::ContextInit(e.to_string()))?;

        let wall_start = std::time::Instant::now();

        state
            .full(fp, audio)
            .map_err(|e| TranscribeError::Failed(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| TranscribeError::Failed(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let seg = state
                .full_get_segment_text(i)
                .map_err(|e| TranscribeError::Failed(format!("segment {i}: {e}")))?;
            text.push_str(&seg);
        }

        let text = text.trim().to_string();
        let latency_ms = wall_start.elapsed().as_millis();

        if is_artifact(&text) {
            log::debug!("whisper: dropped non-speech artifact {text:?}");
            return Ok(String::new());
        }

        log::debug!(
            "whisper: {} samples → {} chars in {latency_ms} ms",
            audio.len(),
            text.len()
        );
        Ok(text)
    }
}

#[async_trait]
impl TranscriptionEngine for WhisperTranscriber {
    async fn transcribe(&self, audio: &[f32]) -> Result<String, TranscribeError> {
        let inner = Arc::clone(&self.inner);
        let audio = audio.to_vec();
        tokio::task::spawn_blocking(move || inner.transcribe_blocking(&audio))
            .await
            .map_err(|e| TranscribeError::Failed(format!("inference task failed: {e}")))?
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Artifact filtering
// ---------------------------------------------------------------------------

/// Whisper hallucination tags emitted for silence or noise.
///
/// Any transcript that consists solely of a bracketed or parenthesised tag
/// is treated as non-speech and replaced with an empty result.
fn is_artifact(text: &str) -> bool {
    const TAGS: &[&str] = &[
        "[BLANK_AUDIO]",
        "[blank_audio]",
        "(Music)",
        "(music)",
        "(noise)",
        "(Noise)",
        "[MUSIC]",
        "[Music]",
        "(clapping)",
        "(Applause)",
        "[silence]",
    ];
    if TAGS.contains(&text) {
        return true;
    }
    let bytes = text.as_bytes();
    bytes.len() > 2
        && ((bytes[0] == b'[' && bytes[bytes.len() - 1] == b']')
            || (bytes[0] == b'(' && bytes[bytes.len() - 1] == b')'))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

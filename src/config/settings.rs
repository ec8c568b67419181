//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across
//! threads.  The core consumes a snapshot of these values through
//! [`AppConfig::pipeline_config`] and the orchestrator's setters; edits
//! apply from the next gesture.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineConfig;

use super::AppPaths;

// ---------------------------------------------------------------------------
// TriggerConfig
// ---------------------------------------------------------------------------

/// Global chord binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Chord combo string, e.g. `"ctrl+shift+space"`, `"option+f"` or the
    /// modifier-only `"ctrl+shift"`.
    pub binding: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            binding: "ctrl+shift+space".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptionConfig
// ---------------------------------------------------------------------------

/// Settings for the transcription engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// GGML model name / file stem (e.g. `"ggml-base.en"`).
    pub model: String,
    /// Primary speech language as an ISO-639-1 code, or `"auto"` for the
    /// engine's built-in language detection.
    pub language: String,
    /// Stage-1 ceiling: seconds the pipeline waits before giving up on a
    /// transcription and aborting the gesture.
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: "ggml-base.en".into(),
            language: "en".into(),
            timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// RefinementConfig
// ---------------------------------------------------------------------------

/// Settings for the optional text-refinement stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Whether Stage 2 runs at all.
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible endpoint.
    ///
    /// - Ollama default: `http://localhost:11434`
    /// - OpenAI: `https://api.openai.com`
    pub base_url: String,
    /// API key — `None` or empty for local providers.
    pub api_key: Option<String>,
    /// Model identifier sent to the API (e.g. `"qwen2.5:3b"`).
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).  Lower = more deterministic.
    pub temperature: f32,
    /// Stage-2 ceiling in seconds; a refinement slower than this falls back
    /// to the raw transcript.
    pub timeout_secs: u64,
    /// System instruction handed to the refinement model.
    pub instruction: String,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".into(),
            api_key: None,
            model: "qwen2.5:3b".into(),
            temperature: 0.3,
            timeout_secs: 30,
            instruction: "Rewrite this dictated transcript as clean, grammatically correct \
                          text without filler words or stutters. Reply with the corrected \
                          text only."
                .into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for audio capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Maximum utterance length in seconds; the ring buffer is sized for
    /// this and keeps only the most recent audio beyond it.
    pub max_utterance_secs: f32,
    /// Minimum utterance length in seconds; shorter sessions are rejected
    /// before transcription.
    pub min_utterance_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            max_utterance_secs: 60.0,
            min_utterance_secs: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use push_to_text::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chord binding.
    pub trigger: TriggerConfig,
    /// Transcription engine settings.
    pub transcription: TranscriptionConfig,
    /// Refinement stage settings.
    pub refinement: RefinementConfig,
    /// Audio capture settings.
    pub audio: AudioConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns `true` when no `settings.toml` exists yet — first-run
    /// detection.
    pub fn is_first_run() -> bool {
        !AppPaths::new().settings_file.exists()
    }

    /// Ring buffer capacity in samples implied by the audio settings.
    pub fn buffer_capacity(&self) -> usize {
        (self.audio.max_utterance_secs * crate::audio::CANONICAL_SAMPLE_RATE as f32) as usize
    }

    /// Snapshot of the runtime pipeline settings.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            refinement_enabled: self.refinement.enabled,
            transcribe_timeout: Duration::from_secs(self.transcription.timeout_secs),
            refine_timeout: Duration::from_secs(self.refinement.timeout_secs),
            refine_instruction: self.refinement.instruction.clone(),
            min_session_samples: (self.audio.min_utterance_secs
                * crate::audio::CANONICAL_SAMPLE_RATE as f32) as usize,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

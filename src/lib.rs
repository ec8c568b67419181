//! push-to-text — press a chord, speak, release, get text.
//!
//! The crate is the orchestration core of a push-to-talk dictation tool.
//! Four timing domains coexist and must never block one another:
//!
//! 1. **Capture** — the hardware audio callback copies samples into a
//!    bounded channel; a normalizer thread feeds the shared
//!    [`RingBuffer`](audio::RingBuffer).
//! 2. **Event interception** — [`trigger::GlobalTriggerDetector`] decides
//!    consume/pass-through for every system key event in pure in-memory
//!    work.
//! 3. **Pipeline** — [`pipeline::Orchestrator`] races transcription and
//!    refinement against independent timeouts on the tokio runtime.
//! 4. **State** — one `Idle / Recording / Processing` machine written only
//!    from the orchestrator, so transitions are totally ordered.
//!
//! Engines are capabilities behind [`engine::TranscriptionEngine`] and
//! [`engine::RefinementEngine`], hot-swappable through
//! [`engine::EngineRouter`]; results leave through an
//! [`output::OutputSink`] passed in at construction.  See `src/main.rs` for
//! the composition root that wires the production pieces together.

pub mod audio;
pub mod config;
pub mod engine;
pub mod output;
pub mod pipeline;
pub mod trigger;

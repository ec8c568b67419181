//! Audio subsystem — capture, normalization, and the shared ring buffer.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (bounded channel)
//!           → normalizer thread → downmix → resample → RingBuffer
//! ```
//!
//! The ring buffer is the only structure shared between the capture domain
//! and the pipeline domain; it is drained by the orchestrator when a gesture
//! ends.

pub mod buffer;
pub mod capture;
pub mod resample;

pub use buffer::{new_shared_buffer, RingBuffer, SharedRingBuffer};
pub use capture::{new_recording_gate, CaptureAdapter, CaptureError, CaptureHandle, RecordingGate};
pub use resample::{downmix_to_mono, resample_to_canonical, CANONICAL_SAMPLE_RATE};

//! Microphone capture adapter built on `cpal`.
//!
//! [`CaptureAdapter`] owns the cpal host/device/stream lifecycle and feeds
//! the shared [`RingBuffer`](crate::audio::RingBuffer) with canonical-format
//! samples (16 kHz mono `f32`).  The hardware callback itself does only
//! bounded work — gate check, copy, non-blocking channel send — while a
//! separate normalizer thread performs the downmix/resample and takes the
//! short ring-buffer lock.
//!
//! ```text
//! cpal callback ──AudioChunk (bounded sync_channel, drop-on-full)──▶
//!     normalizer thread ──downmix → resample → RingBuffer::write
//! ```
//!
//! Capture runs for the lifetime of the returned [`CaptureHandle`]; whether
//! samples reach the buffer is controlled by the recording gate, so starting
//! and stopping a dictation session never touches the hardware stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, TrySendError};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::buffer::SharedRingBuffer;
use super::resample::{downmix_to_mono, resample_to_canonical, CANONICAL_SAMPLE_RATE};

/// Bounded queue between the hardware callback and the normalizer thread.
/// At ~10 ms per callback buffer this holds over half a second of audio;
/// chunks are dropped (oldest-consumer-wins) rather than ever blocking.
const CHUNK_QUEUE_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// RecordingGate
// ---------------------------------------------------------------------------

/// Shared flag read by the normalizer thread on every chunk.
///
/// The orchestrator raises it on `start_recording()` and lowers it on
/// `stop_recording()`; the capture path only ever reads it.
pub type RecordingGate = Arc<AtomicBool>;

/// Construct a lowered [`RecordingGate`].
pub fn new_recording_gate() -> RecordingGate {
    Arc::new(AtomicBool::new(false))
}

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// One buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in `[-1.0, 1.0]` at the device's native
/// rate and channel count; normalization happens off the callback thread.
#[derive(Debug, Clone)]
struct AudioChunk {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors raised while opening or starting audio capture.
///
/// None of these are retried internally — the composition root decides
/// whether to surface a permission prompt or run without a microphone.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("microphone access denied or device unavailable: {0}")]
    PermissionDenied(String),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(String),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(e: cpal::BuildStreamError) -> Self {
        match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                CaptureError::PermissionDenied(e.to_string())
            }
            other => CaptureError::BuildStream(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureHandle
// ---------------------------------------------------------------------------

/// RAII guard for a running capture pipeline.
///
/// Dropping it stops the cpal stream; the normalizer thread drains the
/// remaining chunks and exits when the channel disconnects.
pub struct CaptureHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CaptureAdapter
// ---------------------------------------------------------------------------

/// Wraps the system default input device and normalizes its output.
///
/// # Example
///
/// ```rust,no_run
/// use push_to_text::audio::{new_recording_gate, new_shared_buffer, CaptureAdapter};
///
/// let buffer = new_shared_buffer(16_000 * 60);
/// let gate = new_recording_gate();
/// let adapter = CaptureAdapter::open().unwrap();
/// let _handle = adapter.start(buffer, gate).unwrap();
/// // `_handle` keeps the stream alive; drop it to stop capture entirely.
/// ```
pub struct CaptureAdapter {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_rate: u32,
    channels: u16,
}

impl CaptureAdapter {
    /// Open the system default input device with its preferred stream
    /// configuration.
    ///
    /// # Errors
    ///
    /// [`CaptureError::NoDevice`] when no input device exists,
    /// [`CaptureError::DefaultConfig`] when the device cannot report a
    /// default configuration.
    pub fn open() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
        })
    }

    /// Start the hardware stream and the normalizer thread.
    ///
    /// The cpal callback copies each hardware buffer into an [`AudioChunk`]
    /// and forwards it over a bounded channel with `try_send` — a full queue
    /// drops the chunk rather than stalling the audio thread.  The
    /// normalizer thread downmixes, resamples to 16 kHz mono, and appends to
    /// `buffer` whenever `gate` is raised.
    pub fn start(
        &self,
        buffer: SharedRingBuffer,
        gate: RecordingGate,
    ) -> Result<CaptureHandle, CaptureError> {
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        let (tx, rx) = sync_channel::<AudioChunk>(CHUNK_QUEUE_DEPTH);

        std::thread::Builder::new()
            .name("capture-normalizer".into())
            .spawn(move || {
                while let Ok(chunk) = rx.recv() {
                    if !gate.load(Ordering::Relaxed) {
                        continue;
                    }

                    let mono = downmix_to_mono(&chunk.samples, chunk.channels);
                    let canonical = if chunk.sample_rate != CANONICAL_SAMPLE_RATE {
                        resample_to_canonical(&mono, chunk.sample_rate)
                    } else {
                        mono
                    };

                    if let Ok(mut buf) = buffer.lock() {
                        buf.write(&canonical);
                    }
                }
                log::debug!("capture: normalizer thread exiting");
            })
            .map_err(|e| CaptureError::BuildStream(e.to_string()))?;

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                };
                match tx.try_send(chunk) {
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => {}
                }
            },
            |err: cpal::StreamError| {
                log::error!("capture: stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        log::info!(
            "capture: stream started ({} Hz, {} ch → {} Hz mono)",
            self.sample_rate,
            self.channels,
            CANONICAL_SAMPLE_RATE
        );
        Ok(CaptureHandle { _stream: stream })
    }

    /// Native sample rate reported by the device in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels in each hardware buffer.
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_starts_lowered() {
        let gate = new_recording_gate();
        assert!(!gate.load(Ordering::Relaxed));
    }

    #[test]
    fn audio_chunk_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
    }

    #[test]
    fn permission_error_from_device_not_available() {
        let err: CaptureError = cpal::BuildStreamError::DeviceNotAvailable.into();
        assert!(matches!(err, CaptureError::PermissionDenied(_)));
    }

    #[test]
    fn other_build_errors_stay_build_errors() {
        let err: CaptureError = cpal::BuildStreamError::InvalidArgument.into();
        assert!(matches!(err, CaptureError::BuildStream(_)));
    }
}

//! Conversion to the canonical capture format: 16 kHz mono `f32`.
//!
//! Hardware devices deliver whatever rate and channel count they prefer
//! (commonly 44.1/48 kHz stereo); everything downstream of the capture
//! adapter speaks exactly one format.  Two steps:
//!
//! 1. [`downmix_to_mono`] — average interleaved channels into one.
//! 2. [`resample_to_canonical`] — linear-interpolation resample to 16 kHz.
//!
//! The linear resampler is plenty for speech input.  `rubato`
//! (`SincFixedIn` + `BlackmanHarris2`) is in `Cargo.toml` as the upgrade
//! path if a higher-quality window ever proves necessary.

/// The canonical sample rate consumed by the ring buffer and the engines.
pub const CANONICAL_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging channels.
///
/// The output length is `samples.len() / channels`.  Already-mono input is
/// returned as an owned copy; `channels == 0` yields an empty vector.
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample_to_canonical
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `source_rate` Hz to 16 000 Hz using linear
/// interpolation.
///
/// Input already at the canonical rate is copied through unchanged.  The
/// output length is approximately `samples.len() * 16_000 / source_rate`.
pub fn resample_to_canonical(samples: &[f32], source_rate: u32) -> Vec<f32> {
    if source_rate == CANONICAL_SAMPLE_RATE {
        return samples.to_vec();
    }

    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = CANONICAL_SAMPLE_RATE as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac as f32) + samples[idx + 1] * frac as f32
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

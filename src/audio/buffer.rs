//! Fixed-capacity circular buffer for `f32` audio samples.
//!
//! When the buffer is full, new samples **overwrite** the oldest data so the
//! most-recent `capacity` samples are always available.  This matches the
//! push-to-talk scenario: the tail of an over-long recording is what the user
//! said last, and the capture callback must never be asked to wait.
//!
//! # Example
//!
//! ```rust
//! use push_to_text::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(5);
//! buf.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]); // 7 items → capacity 5
//! assert_eq!(buf.drain(), vec![3.0, 4.0, 5.0, 6.0, 7.0]);
//! ```

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular store of mono `f32` samples.
///
/// ## Overflow behaviour
///
/// When [`write`](Self::write) would exceed `capacity`, the oldest samples
/// are silently overwritten one-for-one as new ones arrive — drop-oldest,
/// never drop-newest, never block.  The backing storage is allocated once in
/// [`new`](Self::new) and never grows.
pub struct RingBuffer {
    buf: Vec<f32>,
    capacity: usize,
    /// Index of the next write position (wraps around `capacity`).
    head: usize,
    /// Number of valid samples currently stored (≤ `capacity`).
    len: usize,
}

impl RingBuffer {
    /// Create a new ring buffer holding at most `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![0.0; capacity],
            capacity,
            head: 0,
            len: 0,
        }
    }

    /// Append `samples` to the buffer.
    ///
    /// If the total would exceed `capacity`, the oldest samples are
    /// overwritten.  Does not allocate.
    pub fn write(&mut self, samples: &[f32]) {
        for &s in samples {
            self.buf[self.head] = s;
            self.head = (self.head + 1) % self.capacity;
            if self.len < self.capacity {
                self.len += 1;
            }
        }
    }

    /// Return all stored samples in chronological order and reset the buffer.
    ///
    /// The oldest sample sits at `(head + capacity - len) % capacity`; the
    /// offset is recomputed here rather than tracked as a separate field.
    /// After this call `len() == 0` and `head` is back at slot 0.  Returns an
    /// empty vector when nothing was recorded.
    pub fn drain(&mut self) -> Vec<f32> {
        if self.len == 0 {
            return Vec::new();
        }

        let start = (self.head + self.capacity - self.len) % self.capacity;
        let mut out = Vec::with_capacity(self.len);
        for i in 0..self.len {
            out.push(self.buf[(start + i) % self.capacity]);
        }

        self.head = 0;
        self.len = 0;
        out
    }

    /// Discard all samples without returning them.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Number of valid samples currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the buffer contains no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of samples the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current recording duration in seconds, assuming `sample_rate` Hz mono.
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.len as f32 / sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// SharedRingBuffer
// ---------------------------------------------------------------------------

/// Thread-safe handle to a [`RingBuffer`].
///
/// The capture normalizer thread writes; the orchestrator drains.  Both hold
/// the lock only for the duration of one copy — never across an `.await`.
pub type SharedRingBuffer = Arc<Mutex<RingBuffer>>;

/// Construct a [`SharedRingBuffer`] with the given capacity in samples.
pub fn new_shared_buffer(capacity: usize) -> SharedRingBuffer {
    Arc::new(Mutex::new(RingBuffer::new(capacity)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

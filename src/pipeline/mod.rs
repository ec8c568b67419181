//! Pipeline orchestration — state machine, sealed sessions, and the
//! two-stage transcribe → refine driver.
//!
//! # Architecture
//!
//! ```text
//! TriggerSignal (mpsc)
//!        │
//!        ▼
//! Orchestrator::run()  ← async tokio task, one signal at a time
//!        │
//!        ├─ Start    → clear RingBuffer, raise gate, Idle → Recording
//!        ├─ Stop     → seal RingBuffer → spawn two-stage pipeline
//!        └─ Rejected → EngineNotReady notification
//!
//! Stage 1  transcribe ⟂ timeout(15 s)   — lose the race ⇒ abort gesture
//! Stage 2  refine     ⟂ timeout(30 s)   — lose the race ⇒ raw-text fallback
//!        │
//!        ▼
//! OutputSink::deliver(Transcript) → Idle
//! ```

pub mod orchestrator;
pub mod state;

pub use orchestrator::{Orchestrator, PipelineConfig};
pub use state::{new_shared_state, AppState, RecordingSession, SharedState};

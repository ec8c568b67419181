//! Gesture orchestration — the single logical thread of control.
//!
//! [`Orchestrator`] owns the state machine and drives the two-stage
//! pipeline:
//!
//! ```text
//! TriggerSignal::Start
//!   └─▶ clear ring buffer, raise capture gate, Idle → Recording
//!
//! TriggerSignal::Stop
//!   └─▶ lower gate, drain buffer → RecordingSession, Recording → Processing
//!         └─▶ Stage 1: transcribe, raced against its ceiling
//!               ├─ timeout/failure → notify, → Idle (no text)
//!               └─ Ok(text)
//!                     └─▶ Stage 2 (optional): refine, raced independently
//!                           ├─ Ok  → refined text
//!                           └─ Err/timeout → raw text (fallback)
//!                                 └─▶ deliver Transcript, notify, → Idle
//! ```
//!
//! Stage racing is `tokio::spawn` + `tokio::time::timeout`: whichever of
//! {engine result, timer} completes first wins.  Losing the race aborts the
//! task best-effort — a blocking inference keeps running on the blocking
//! pool until it finishes on its own, and its late result is dropped with
//! the `JoinHandle`, never touching state.
//!
//! [`run`](Orchestrator::run) consumes trigger signals one at a time and
//! spawns the processing stage so the loop stays responsive: a Start that
//! lands while `Processing` is in flight is *rejected* with a notification,
//! never queued.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::audio::{RecordingGate, SharedRingBuffer};
use crate::engine::{RefinementRouter, TranscribeError, TranscriptionRouter};
use crate::output::{Notification, OutputSink, Transcript};
use crate::trigger::TriggerSignal;

use super::state::{AppState, RecordingSession, SharedState};

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Runtime pipeline settings.
///
/// Mutated through the orchestrator's setters; a snapshot is taken when a
/// gesture is sealed, so changes apply to the next gesture and never to one
/// already in flight.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Whether Stage 2 runs at all.
    pub refinement_enabled: bool,
    /// Stage 1 ceiling.
    pub transcribe_timeout: Duration,
    /// Stage 2 ceiling, independent of Stage 1.
    pub refine_timeout: Duration,
    /// Instruction prompt handed to the refinement engine.
    pub refine_instruction: String,
    /// Sessions shorter than this many samples are rejected before Stage 1.
    pub min_session_samples: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            refinement_enabled: true,
            transcribe_timeout: Duration::from_secs(15),
            refine_timeout: Duration::from_secs(30),
            refine_instruction: "Rewrite this dictated transcript as clean, grammatically \
                                 correct text without filler words or stutters. Reply with \
                                 the corrected text only."
                .into(),
            min_session_samples: 8_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives `Idle → Recording → Processing → Idle` and the two-stage pipeline.
///
/// All collaborators are passed in at construction; the orchestrator holds
/// no ambient state and is fully exercised in tests with mock engines and a
/// recording sink.
pub struct Orchestrator {
    state: SharedState,
    buffer: SharedRingBuffer,
    gate: RecordingGate,
    transcriber: Arc<TranscriptionRouter>,
    refiner: Arc<RefinementRouter>,
    sink: Arc<dyn OutputSink>,
    config: Mutex<PipelineConfig>,
}

impl Orchestrator {
    pub fn new(
        state: SharedState,
        buffer: SharedRingBuffer,
        gate: RecordingGate,
        transcriber: Arc<TranscriptionRouter>,
        refiner: Arc<RefinementRouter>,
        sink: Arc<dyn OutputSink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            state,
            buffer,
            gate,
            transcriber,
            refiner,
            sink,
            config: Mutex::new(config),
        }
    }

    // -----------------------------------------------------------------------
    // Configuration setters — effective from the next gesture
    // -----------------------------------------------------------------------

    pub fn set_refinement_enabled(&self, enabled: bool) {
        self.config.lock().unwrap().refinement_enabled = enabled;
    }

    pub fn set_timeouts(&self, transcribe: Duration, refine: Duration) {
        let mut cfg = self.config.lock().unwrap();
        cfg.transcribe_timeout = transcribe;
        cfg.refine_timeout = refine;
    }

    pub fn set_refine_instruction(&self, instruction: impl Into<String>) {
        self.config.lock().unwrap().refine_instruction = instruction.into();
    }

    /// Current state snapshot.
    pub fn state(&self) -> AppState {
        *self.state.lock().unwrap()
    }

    // -----------------------------------------------------------------------
    // Signal loop
    // -----------------------------------------------------------------------

    /// Consume trigger signals until the channel closes.
    ///
    /// Spawn this on the runtime from the composition root.  Processing is
    /// spawned as its own task so the loop keeps rejecting Starts while a
    /// pipeline is in flight; the last outstanding pipeline is awaited
    /// before this returns so nothing is left dangling on shutdown.
    pub async fn run(self: Arc<Self>, mut signals: mpsc::Receiver<TriggerSignal>) {
        let mut in_flight: Option<tokio::task::JoinHandle<()>> = None;

        while let Some(signal) = signals.recv().await {
            match signal {
                TriggerSignal::Start => self.start_recording(),
                TriggerSignal::Stop => {
                    if let Some(session) = self.seal_recording() {
                        let this = Arc::clone(&self);
                        in_flight = Some(tokio::spawn(async move {
                            this.process_sealed_audio(session).await;
                        }));
                    }
                }
                TriggerSignal::Rejected => {
                    // The detector consumed the chord but the engine was not
                    // ready; route the feedback the detector cannot produce.
                    self.sink.notify(Notification::EngineNotReady);
                }
            }
        }

        if let Some(handle) = in_flight.take() {
            let _ = handle.await;
        }
        log::info!("pipeline: signal channel closed, orchestrator shutting down");
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    /// Begin a recording session.
    ///
    /// * `Idle` and the engine is ready → clear the buffer, raise the gate,
    ///   enter `Recording`.
    /// * `Idle` without a ready engine → `EngineNotReady` notification.
    /// * `Recording` → idempotent no-op.
    /// * `Processing` → rejected, `TriggerRejected` notification.
    pub fn start_recording(&self) {
        let mut state = self.state.lock().unwrap();
        match *state {
            AppState::Recording => {
                log::debug!("pipeline: Start while Recording — no-op");
            }
            AppState::Processing => {
                log::debug!("pipeline: Start while Processing — rejected");
                self.sink.notify(Notification::TriggerRejected);
            }
            AppState::Idle => {
                if !self.transcriber.is_ready() {
                    log::debug!("pipeline: Start while engine not ready — rejected");
                    self.sink.notify(Notification::EngineNotReady);
                    return;
                }
                if let Ok(mut buf) = self.buffer.lock() {
                    buf.clear();
                }
                self.gate.store(true, Ordering::Relaxed);
                *state = AppState::Recording;
                log::debug!("pipeline: Idle → Recording");
            }
        }
    }

    /// End the recording session and run the pipeline to completion.
    ///
    /// A no-op unless currently `Recording`.  Embedders that drive the
    /// orchestrator directly get the inline form; [`run`](Self::run) uses
    /// [`seal_recording`](Self::seal_recording) and spawns instead so the
    /// signal loop stays responsive.
    pub async fn stop_recording(&self) {
        if let Some(session) = self.seal_recording() {
            self.process_sealed_audio(session).await;
        }
    }

    /// Seal the ring buffer into a [`RecordingSession`] and enter
    /// `Processing`.  Returns `None` (no-op) unless currently `Recording`.
    pub fn seal_recording(&self) -> Option<RecordingSession> {
        {
            let mut state = self.state.lock().unwrap();
            if *state != AppState::Recording {
                log::debug!("pipeline: Stop while {:?} — no-op", *state);
                return None;
            }
            *state = AppState::Processing;
        }
        self.gate.store(false, Ordering::Relaxed);

        let samples = match self.buffer.lock() {
            Ok(mut buf) => buf.drain(),
            Err(poisoned) => poisoned.into_inner().drain(),
        };
        let session = RecordingSession::new(samples);
        log::debug!(
            "pipeline: Recording → Processing ({} samples, {:.2}s)",
            session.len(),
            session.duration_secs()
        );
        Some(session)
    }

    /// Recovery hook: force the state machine back to `Idle` and lower the
    /// capture gate.  Discards any un-drained audio.
    pub fn set_idle(&self) {
        self.gate.store(false, Ordering::Relaxed);
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
        *self.state.lock().unwrap() = AppState::Idle;
        log::debug!("pipeline: forced to Idle");
    }

    /// Run the two-stage pipeline over a sealed session, deliver the result,
    /// and return to `Idle` unconditionally.
    pub async fn process_sealed_audio(&self, session: RecordingSession) {
        let cfg = self.config.lock().unwrap().clone();

        if session.len() < cfg.min_session_samples {
            log::warn!(
                "pipeline: session too short ({} samples < {})",
                session.len(),
                cfg.min_session_samples
            );
            self.sink.notify(Notification::PipelineFailed(
                "recording too short — hold the chord a little longer".into(),
            ));
            self.finish();
            return;
        }

        // ── Stage 1: transcription ───────────────────────────────────────
        let (raw_text, engine_name) = {
            let router = Arc::clone(&self.transcriber);
            let samples = session.samples().to_vec();
            let task = tokio::spawn(async move { router.transcribe(&samples).await });
            let abort = task.abort_handle();

            match timeout(cfg.transcribe_timeout, task).await {
                Err(_elapsed) => {
                    // Best-effort cancellation; a blocking inference will
                    // finish in the background and its result is discarded.
                    abort.abort();
                    log::warn!(
                        "pipeline: transcription exceeded {:?} — aborting gesture",
                        cfg.transcribe_timeout
                    );
                    self.sink.notify(Notification::PipelineTimedOut);
                    self.finish();
                    return;
                }
                Ok(Err(join_err)) => {
                    self.sink.notify(Notification::PipelineFailed(format!(
                        "transcription task failed: {join_err}"
                    )));
                    self.finish();
                    return;
                }
                Ok(Ok(Err(TranscribeError::EngineNotReady))) => {
                    self.sink.notify(Notification::EngineNotReady);
                    self.finish();
                    return;
                }
                Ok(Ok(Err(e))) => {
                    log::warn!("pipeline: transcription failed: {e}");
                    self.sink
                        .notify(Notification::PipelineFailed(e.to_string()));
                    self.finish();
                    return;
                }
                Ok(Ok(Ok(result))) => result,
            }
        };
        log::debug!("pipeline: transcript from {engine_name}: {raw_text:?}");

        // ── Stage 2: refinement (enhancement, never a hard dependency) ───
        let (final_text, refinement_applied, fell_back) =
            if cfg.refinement_enabled && !raw_text.is_empty() {
                match self.refiner.current() {
                    Some(engine) => {
                        let text = raw_text.clone();
                        let instruction = cfg.refine_instruction.clone();
                        let task =
                            tokio::spawn(
                                async move { engine.refine(&text, &instruction).await },
                            );
                        let abort = task.abort_handle();

                        match timeout(cfg.refine_timeout, task).await {
                            Ok(Ok(Ok(refined))) => (refined, true, false),
                            Ok(Ok(Err(e))) => {
                                log::warn!("pipeline: refinement failed ({e}) — using raw text");
                                (raw_text, false, true)
                            }
                            Ok(Err(join_err)) => {
                                log::warn!(
                                    "pipeline: refinement task failed ({join_err}) — using raw text"
                                );
                                (raw_text, false, true)
                            }
                            Err(_elapsed) => {
                                abort.abort();
                                log::warn!(
                                    "pipeline: refinement exceeded {:?} — using raw text",
                                    cfg.refine_timeout
                                );
                                (raw_text, false, true)
                            }
                        }
                    }
                    None => {
                        log::debug!("pipeline: no refinement engine installed — skipping");
                        (raw_text, false, false)
                    }
                }
            } else {
                (raw_text, false, false)
            };

        // ── Deliver and return to Idle ───────────────────────────────────
        let transcript = Transcript {
            text: final_text,
            engine: engine_name,
            refinement_applied,
            fell_back,
        };

        let sink = Arc::clone(&self.sink);
        let delivered = transcript.clone();
        // Delivery may block (clipboard, key synthesis) — keep it off the
        // async workers.
        let _ = tokio::task::spawn_blocking(move || sink.deliver(delivered)).await;

        self.sink.notify(Notification::PipelineSucceeded);
        self.finish();
        log::debug!("pipeline: gesture complete");
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Unconditional `→ Idle` at the end of every pipeline outcome.
    fn finish(&self) {
        *self.state.lock().unwrap() = AppState::Idle;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{new_recording_gate, new_shared_buffer};
    use crate::engine::{MockRefiner, MockTranscriber, RefineError};
    use crate::output::RecordingSink;
    use crate::pipeline::state::new_shared_state;

    /// One second of silence — clears the minimum-session guard.
    fn one_second() -> Vec<f32> {
        vec![0.0; 16_000]
    }

    struct Fixture {
        orchestrator: Arc<Orchestrator>,
        state: SharedState,
        buffer: SharedRingBuffer,
        gate: RecordingGate,
        sink: Arc<RecordingSink>,
        signals: mpsc::Sender<TriggerSignal>,
        receiver: Option<mpsc::Receiver<TriggerSignal>>,
    }

    fn fixture(
        transcriber: Arc<TranscriptionRouter>,
        refiner: Arc<RefinementRouter>,
        config: PipelineConfig,
    ) -> Fixture {
        let state = new_shared_state();
        let buffer = new_shared_buffer(16_000 * 60);
        let gate = new_recording_gate();
        let sink = Arc::new(RecordingSink::new());
        let (tx, rx) = mpsc::channel(16);

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&state),
            Arc::clone(&buffer),
            Arc::clone(&gate),
            transcriber,
            refiner,
            Arc::clone(&sink) as Arc<dyn OutputSink>,
            config,
        ));

        Fixture {
            orchestrator,
            state,
            buffer,
            gate,
            sink,
            signals: tx,
            receiver: Some(rx),
        }
    }

    fn default_fixture(transcriber: MockTranscriber, refiner: MockRefiner) -> Fixture {
        fixture(
            Arc::new(TranscriptionRouter::with_engine(Arc::new(transcriber))),
            Arc::new(RefinementRouter::with_engine(Arc::new(refiner))),
            PipelineConfig::default(),
        )
    }

    // ---- State machine -----------------------------------------------------

    #[tokio::test]
    async fn start_moves_idle_to_recording_and_raises_gate() {
        let f = default_fixture(MockTranscriber::ok("hi"), MockRefiner::ok("hi"));

        f.orchestrator.start_recording();
        assert_eq!(*f.state.lock().unwrap(), AppState::Recording);
        assert!(f.gate.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn start_twice_is_idempotent() {
        let f = default_fixture(MockTranscriber::ok("hi"), MockRefiner::ok("hi"));

        f.orchestrator.start_recording();
        f.orchestrator.start_recording();

        assert_eq!(*f.state.lock().unwrap(), AppState::Recording);
        // No rejection notifications — the second Start is simply absorbed.
        assert!(f.sink.notified().is_empty());

        // One Stop suffices to exit Recording.
        f.buffer.lock().unwrap().write(&one_second());
        f.orchestrator.stop_recording().await;
        assert_eq!(*f.state.lock().unwrap(), AppState::Idle);
        assert_eq!(f.sink.delivered().len(), 1);
    }

    #[tokio::test]
    async fn stop_while_idle_is_noop() {
        let f = default_fixture(MockTranscriber::ok("hi"), MockRefiner::ok("hi"));

        f.orchestrator.stop_recording().await;
        assert_eq!(*f.state.lock().unwrap(), AppState::Idle);
        assert!(f.sink.delivered().is_empty());
        assert!(f.sink.notified().is_empty());
    }

    #[tokio::test]
    async fn start_without_engine_notifies_not_ready() {
        let f = fixture(
            Arc::new(TranscriptionRouter::empty()),
            Arc::new(RefinementRouter::empty()),
            PipelineConfig::default(),
        );

        f.orchestrator.start_recording();
        assert_eq!(*f.state.lock().unwrap(), AppState::Idle);
        assert_eq!(f.sink.notified(), vec![Notification::EngineNotReady]);
    }

    #[tokio::test]
    async fn set_idle_recovers_from_recording() {
        let f = default_fixture(MockTranscriber::ok("hi"), MockRefiner::ok("hi"));

        f.orchestrator.start_recording();
        f.buffer.lock().unwrap().write(&one_second());
        f.orchestrator.set_idle();

        assert_eq!(*f.state.lock().unwrap(), AppState::Idle);
        assert!(!f.gate.load(Ordering::Relaxed));
        assert!(f.buffer.lock().unwrap().is_empty());
    }

    // ---- Happy path --------------------------------------------------------

    #[tokio::test]
    async fn full_gesture_delivers_refined_text() {
        let f = default_fixture(
            MockTranscriber::ok("hello world"),
            MockRefiner::ok("Hello, world."),
        );

        f.orchestrator.start_recording();
        f.buffer.lock().unwrap().write(&one_second());
        f.orchestrator.stop_recording().await;

        let delivered = f.sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].text, "Hello, world.");
        assert_eq!(delivered[0].engine, "mock-transcriber");
        assert!(delivered[0].refinement_applied);
        assert!(!delivered[0].fell_back);

        assert_eq!(f.sink.notified(), vec![Notification::PipelineSucceeded]);
        assert_eq!(*f.state.lock().unwrap(), AppState::Idle);
        assert!(!f.gate.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn refinement_disabled_delivers_raw_text() {
        let mut config = PipelineConfig::default();
        config.refinement_enabled = false;
        let f = fixture(
            Arc::new(TranscriptionRouter::with_engine(Arc::new(
                MockTranscriber::ok("raw transcript"),
            ))),
            Arc::new(RefinementRouter::with_engine(Arc::new(MockRefiner::ok(
                "should never run",
            )))),
            config,
        );

        f.orchestrator.start_recording();
        f.buffer.lock().unwrap().write(&one_second());
        f.orchestrator.stop_recording().await;

        let delivered = f.sink.delivered();
        assert_eq!(delivered[0].text, "raw transcript");
        assert!(!delivered[0].refinement_applied);
        assert!(!delivered[0].fell_back);
    }

    #[tokio::test]
    async fn empty_transcript_skips_refinement() {
        // Whisper's artifact filter yields an empty string for silence.
        let f = default_fixture(MockTranscriber::ok(""), MockRefiner::ok("never"));

        f.orchestrator.start_recording();
        f.buffer.lock().unwrap().write(&one_second());
        f.orchestrator.stop_recording().await;

        let delivered = f.sink.delivered();
        assert_eq!(delivered[0].text, "");
        assert!(!delivered[0].refinement_applied);
    }

    // ---- Stage 1 failure / timeout -----------------------------------------

    #[tokio::test]
    async fn transcription_failure_aborts_without_text() {
        let f = default_fixture(
            MockTranscriber::err(TranscribeError::Failed("decoder exploded".into())),
            MockRefiner::ok("never"),
        );

        f.orchestrator.start_recording();
        f.buffer.lock().unwrap().write(&one_second());
        f.orchestrator.stop_recording().await;

        assert!(f.sink.delivered().is_empty());
        assert!(matches!(
            f.sink.notified()[0],
            Notification::PipelineFailed(ref reason) if reason.contains("decoder exploded")
        ));
        assert_eq!(*f.state.lock().unwrap(), AppState::Idle);
    }

    #[tokio::test]
    async fn transcription_timeout_aborts_without_text() {
        let mut config = PipelineConfig::default();
        config.transcribe_timeout = Duration::from_millis(20);
        let f = fixture(
            Arc::new(TranscriptionRouter::with_engine(Arc::new(
                MockTranscriber::slow("too late", Duration::from_secs(5)),
            ))),
            Arc::new(RefinementRouter::empty()),
            config,
        );

        f.orchestrator.start_recording();
        f.buffer.lock().unwrap().write(&one_second());
        f.orchestrator.stop_recording().await;

        assert!(f.sink.delivered().is_empty());
        assert_eq!(f.sink.notified(), vec![Notification::PipelineTimedOut]);
        assert_eq!(*f.state.lock().unwrap(), AppState::Idle);
    }

    // ---- Stage 2 fallback --------------------------------------------------

    #[tokio::test]
    async fn refinement_failure_falls_back_to_raw_text() {
        let f = default_fixture(
            MockTranscriber::ok("raw but fine"),
            MockRefiner::err(RefineError::EmptyResponse),
        );

        f.orchestrator.start_recording();
        f.buffer.lock().unwrap().write(&one_second());
        f.orchestrator.stop_recording().await;

        let delivered = f.sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].text, "raw but fine");
        assert!(!delivered[0].refinement_applied);
        assert!(delivered[0].fell_back);
        // Fallback still counts as success.
        assert_eq!(f.sink.notified(), vec![Notification::PipelineSucceeded]);
    }

    #[tokio::test]
    async fn refinement_timeout_falls_back_to_raw_text() {
        let mut config = PipelineConfig::default();
        config.refine_timeout = Duration::from_millis(20);
        let f = fixture(
            Arc::new(TranscriptionRouter::with_engine(Arc::new(
                MockTranscriber::ok("hello world"),
            ))),
            Arc::new(RefinementRouter::with_engine(Arc::new(MockRefiner::slow(
                "too slow to matter",
                Duration::from_secs(5),
            )))),
            config,
        );

        f.orchestrator.start_recording();
        f.buffer.lock().unwrap().write(&one_second());
        f.orchestrator.stop_recording().await;

        let delivered = f.sink.delivered();
        assert_eq!(delivered[0].text, "hello world");
        assert!(!delivered[0].refinement_applied);
        assert!(delivered[0].fell_back);
    }

    #[tokio::test]
    async fn missing_refiner_skips_stage_two_quietly() {
        let f = fixture(
            Arc::new(TranscriptionRouter::with_engine(Arc::new(
                MockTranscriber::ok("plain"),
            ))),
            Arc::new(RefinementRouter::empty()),
            PipelineConfig::default(),
        );

        f.orchestrator.start_recording();
        f.buffer.lock().unwrap().write(&one_second());
        f.orchestrator.stop_recording().await;

        let delivered = f.sink.delivered();
        assert_eq!(delivered[0].text, "plain");
        assert!(!delivered[0].refinement_applied);
        assert!(!delivered[0].fell_back);
    }

    // ---- Session guards ----------------------------------------------------

    #[tokio::test]
    async fn too_short_session_is_rejected_before_stage_one() {
        let f = default_fixture(MockTranscriber::ok("never"), MockRefiner::ok("never"));

        f.orchestrator.start_recording();
        f.buffer.lock().unwrap().write(&[0.0; 100]); // well under 0.5 s
        f.orchestrator.stop_recording().await;

        assert!(f.sink.delivered().is_empty());
        assert!(matches!(
            f.sink.notified()[0],
            Notification::PipelineFailed(_)
        ));
        assert_eq!(*f.state.lock().unwrap(), AppState::Idle);
    }

    // ---- Signal loop -------------------------------------------------------

    #[tokio::test]
    async fn run_processes_a_full_gesture() {
        let mut f = default_fixture(MockTranscriber::ok("from the loop"), MockRefiner::ok("polished"));
        let rx = f.receiver.take().unwrap();

        let loop_handle = tokio::spawn(Arc::clone(&f.orchestrator).run(rx));

        f.signals.send(TriggerSignal::Start).await.unwrap();
        // Let the Start land before feeding audio.
        tokio::time::sleep(Duration::from_millis(10)).await;
        f.buffer.lock().unwrap().write(&one_second());
        f.signals.send(TriggerSignal::Stop).await.unwrap();
        drop(f.signals);

        loop_handle.await.unwrap();

        let delivered = f.sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].text, "polished");
        assert_eq!(*f.state.lock().unwrap(), AppState::Idle);
    }

    #[tokio::test]
    async fn start_during_processing_is_rejected_not_queued() {
        // Slow Stage 1 keeps the pipeline in Processing while the second
        // Start arrives.
        let mut config = PipelineConfig::default();
        config.transcribe_timeout = Duration::from_secs(10);
        let mut f = fixture(
            Arc::new(TranscriptionRouter::with_engine(Arc::new(
                MockTranscriber::slow("slow result", Duration::from_millis(100)),
            ))),
            Arc::new(RefinementRouter::empty()),
            config,
        );
        let rx = f.receiver.take().unwrap();

        let loop_handle = tokio::spawn(Arc::clone(&f.orchestrator).run(rx));

        f.signals.send(TriggerSignal::Start).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        f.buffer.lock().unwrap().write(&one_second());
        f.signals.send(TriggerSignal::Stop).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Pipeline is mid-Stage-1 — this Start must be rejected.
        f.signals.send(TriggerSignal::Start).await.unwrap();
        drop(f.signals);

        loop_handle.await.unwrap();

        assert_eq!(f.sink.delivered().len(), 1);
        assert!(f
            .sink
            .notified()
            .contains(&Notification::TriggerRejected));
        assert_eq!(*f.state.lock().unwrap(), AppState::Idle);
    }

    #[tokio::test]
    async fn rejected_signal_surfaces_engine_not_ready() {
        let mut f = default_fixture(MockTranscriber::ok("x"), MockRefiner::ok("x"));
        let rx = f.receiver.take().unwrap();

        let loop_handle = tokio::spawn(Arc::clone(&f.orchestrator).run(rx));
        f.signals.send(TriggerSignal::Rejected).await.unwrap();
        drop(f.signals);
        loop_handle.await.unwrap();

        assert_eq!(f.sink.notified(), vec![Notification::EngineNotReady]);
    }

    // ---- Configuration setters ---------------------------------------------

    #[tokio::test]
    async fn setters_apply_to_the_next_gesture() {
        let f = default_fixture(MockTranscriber::ok("raw"), MockRefiner::ok("refined"));

        f.orchestrator.set_refinement_enabled(false);
        f.orchestrator.start_recording();
        f.buffer.lock().unwrap().write(&one_second());
        f.orchestrator.stop_recording().await;

        let delivered = f.sink.delivered();
        assert_eq!(delivered[0].text, "raw");
        assert!(!delivered[0].refinement_applied);
    }
}

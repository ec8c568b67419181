//! Atomic hot-swap of the active engine.
//!
//! [`EngineRouter`] holds at most one engine behind a single point of mutual
//! exclusion.  A call takes a local `Arc` clone of the current engine under
//! the lock and then releases it — the call completes against the instance
//! it started with even if a swap lands mid-flight, and only subsequent
//! calls observe the replacement.
//!
//! The router also owns the readiness flag that the trigger detector reads
//! on every chord press.  That read must cost no more than a relaxed atomic
//! load, so the flag lives outside the mutex.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{RefinementEngine, TranscribeError, TranscriptionEngine};

// ---------------------------------------------------------------------------
// EngineRouter
// ---------------------------------------------------------------------------

/// Holds the single active engine of capability `E` and swaps it atomically.
///
/// Generic over the unsized trait object so the same mechanism serves both
/// capabilities; see [`TranscriptionRouter`] and [`RefinementRouter`].
pub struct EngineRouter<E: ?Sized> {
    current: Mutex<Option<Arc<E>>>,
    ready: Arc<AtomicBool>,
}

impl<E: ?Sized> EngineRouter<E> {
    /// Create a router with no engine installed.
    pub fn empty() -> Self {
        Self {
            current: Mutex::new(None),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a router with `engine` already installed.
    pub fn with_engine(engine: Arc<E>) -> Self {
        let router = Self::empty();
        router.install(engine);
        router
    }

    /// Install `engine`, replacing whatever was active.
    ///
    /// In-flight calls keep running against the engine they captured; the
    /// replaced instance is dropped once the last of them finishes.
    pub fn install(&self, engine: Arc<E>) {
        let mut current = self.current.lock().unwrap();
        *current = Some(engine);
        self.ready.store(true, Ordering::Relaxed);
    }

    /// Remove the active engine, leaving the router empty.
    pub fn uninstall(&self) {
        let mut current = self.current.lock().unwrap();
        *current = None;
        self.ready.store(false, Ordering::Relaxed);
    }

    /// Clone out the current engine reference, if any.
    ///
    /// Callers hold the returned `Arc` for the duration of their call
    /// instead of re-reading shared state mid-call.
    pub fn current(&self) -> Option<Arc<E>> {
        self.current.lock().unwrap().clone()
    }

    /// Whether an engine is installed.  Equivalent to the readiness flag.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Shared readiness flag, handed to the trigger detector so its per-event
    /// check stays a single atomic load.
    pub fn ready_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.ready)
    }
}

impl<E: ?Sized> Default for EngineRouter<E> {
    fn default() -> Self {
        Self::empty()
    }
}

// ---------------------------------------------------------------------------
// Capability aliases
// ---------------------------------------------------------------------------

/// Router over the transcription capability.
pub type TranscriptionRouter = EngineRouter<dyn TranscriptionEngine>;

/// Router over the refinement capability.
pub type RefinementRouter = EngineRouter<dyn RefinementEngine>;

impl TranscriptionRouter {
    /// Transcribe `audio` with the active engine.
    ///
    /// Returns the transcript together with the engine's provenance tag.
    ///
    /// # Errors
    ///
    /// [`TranscribeError::EngineNotReady`] when no engine is installed —
    /// distinct from any engine-internal failure, which is propagated as-is.
    pub async fn transcribe(&self, audio: &[f32]) -> Result<(String, String), TranscribeError> {
        let engine = self.current().ok_or(TranscribeError::EngineNotReady)?;
        let text = engine.transcribe(audio).await?;
        Ok((text, engine.name().to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockTranscriber;
    use std::time::Duration;

    #[tokio::test]
    async fn empty_router_is_not_ready() {
        let router = TranscriptionRouter::empty();
        assert!(!router.is_ready());
        assert!(router.current().is_none());

        let err = router.transcribe(&[0.0; 16]).await.unwrap_err();
        assert!(matches!(err, TranscribeError::EngineNotReady));
    }

    #[tokio::test]
    async fn install_makes_router_ready() {
        let router = TranscriptionRouter::empty();
        router.install(Arc::new(MockTranscriber::ok("hello")));

        assert!(router.is_ready());
        let (text, engine) = router.transcribe(&[0.0; 16]).await.unwrap();
        assert_eq!(text, "hello");
        assert_eq!(engine, "mock-transcriber");
    }

    #[tokio::test]
    async fn uninstall_clears_readiness() {
        let router = TranscriptionRouter::with_engine(Arc::new(MockTranscriber::ok("x")));
        assert!(router.is_ready());

        router.uninstall();
        assert!(!router.is_ready());
        assert!(matches!(
            router.transcribe(&[]).await.unwrap_err(),
            TranscribeError::EngineNotReady
        ));
    }

    #[tokio::test]
    async fn ready_flag_tracks_install_state() {
        let router = TranscriptionRouter::empty();
        let flag = router.ready_flag();
        assert!(!flag.load(Ordering::Relaxed));

        router.install(Arc::new(MockTranscriber::ok("x")));
        assert!(flag.load(Ordering::Relaxed));

        router.uninstall();
        assert!(!flag.load(Ordering::Relaxed));
    }

    /// A swap while a call is in flight must not disturb that call; the next
    /// call sees the replacement.
    #[tokio::test]
    async fn swap_during_inflight_call_completes_on_old_engine() {
        let router = Arc::new(TranscriptionRouter::with_engine(Arc::new(
            MockTranscriber::slow("old engine", Duration::from_millis(50)),
        )));

        let r = Arc::clone(&router);
        let inflight = tokio::spawn(async move { r.transcribe(&[]).await });

        // Give the in-flight call a moment to capture its engine reference.
        tokio::time::sleep(Duration::from_millis(10)).await;
        router.install(Arc::new(MockTranscriber::ok("new engine")));

        let (old_text, _) = inflight.await.unwrap().unwrap();
        assert_eq!(old_text, "old engine");

        let (new_text, _) = router.transcribe(&[]).await.unwrap();
        assert_eq!(new_text, "new engine");
    }
}

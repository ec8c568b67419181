//! Dedicated OS-thread event interceptor built on `rdev::grab`.
//!
//! `rdev::grab` installs a system-wide hook and blocks forever on success —
//! it must live on its own OS thread, never inside a tokio task.  The hook
//! callback hands every event to the [`GlobalTriggerDetector`] and maps its
//! decision onto the grab contract: return `None` to consume the event,
//! `Some(event)` to let it propagate.
//!
//! # Permissions
//!
//! On macOS the hook needs Accessibility/Input-Monitoring consent; without
//! it `rdev::grab` returns an error immediately.  The listener then marks
//! the detector inactive and the thread exits — every event keeps flowing
//! to other applications untouched.  An external collaborator that polls
//! the permission state re-enables interception by calling
//! [`TriggerListener::start`] again once consent appears.
//!
//! # Shutdown caveat
//!
//! The hook has no graceful removal API.  Dropping the handle raises a stop
//! flag so the callback passes everything through from then on; the OS
//! thread itself stays parked in the event loop until the process exits,
//! consuming nothing.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use super::{Action, GlobalTriggerDetector};

// ---------------------------------------------------------------------------
// TriggerListener
// ---------------------------------------------------------------------------

/// Handle to a running interception thread.
pub struct TriggerListener {
    /// Set on [`Drop`] — the callback becomes a transparent pass-through.
    stop: Arc<AtomicBool>,
    /// Lowered when the OS refuses the hook (permission missing).
    active: Arc<AtomicBool>,
    /// Kept so the thread is not detached prematurely; never joined because
    /// a successful `rdev::grab` never returns.
    _thread: std::thread::JoinHandle<()>,
}

impl TriggerListener {
    /// Spawn the interception thread.
    ///
    /// Each event is dispatched to `detector` under its mutex — the
    /// detector does pure in-memory matching, so the hold time stays within
    /// the event hook's latency budget.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the thread.
    pub fn start(detector: Arc<Mutex<GlobalTriggerDetector>>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let active = Arc::new(AtomicBool::new(true));

        let stop_cb = Arc::clone(&stop);
        let active_cb = Arc::clone(&active);
        let detector_cb = Arc::clone(&detector);

        let thread = std::thread::Builder::new()
            .name("trigger-listener".into())
            .spawn(move || {
                let result = rdev::grab(move |event| {
                    if stop_cb.load(Ordering::Relaxed) {
                        return Some(event);
                    }
                    let action = match detector_cb.lock() {
                        Ok(mut det) => det.handle(&event.event_type),
                        Err(_) => Action::PassThrough,
                    };
                    match action {
                        Action::Consume => None,
                        Action::PassThrough => Some(event),
                    }
                });

                if let Err(e) = result {
                    // Most commonly a missing input-monitoring permission.
                    // Non-fatal: the detector goes inactive and the rest of
                    // the application keeps running.
                    log::error!("trigger-listener: event hook unavailable: {e:?}");
                    active_cb.store(false, Ordering::Relaxed);
                    if let Ok(mut det) = detector.lock() {
                        det.set_active(false);
                    }
                }
            })
            .expect("failed to spawn trigger-listener thread");

        Self {
            stop,
            active,
            _thread: thread,
        }
    }

    /// `false` when the OS-level hook could not be installed (permission
    /// missing); call [`start`](Self::start) again after consent is granted.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}

impl Drop for TriggerListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // The hook thread stays parked in the OS event loop; with the stop
        // flag set it forwards every event unmodified.
    }
}

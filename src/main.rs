//! Application entry point — push-to-text dictation service.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (defaults on first run).
//! 3. Build the engine routers: whisper transcription (if a model file is
//!    present) and the API refiner (if enabled).
//! 4. Create the shared ring buffer, recording gate and state.
//! 5. Spawn the orchestrator on the tokio runtime.
//! 6. Spawn the trigger-listener thread with the configured chord.
//! 7. Start the cpal capture stream.
//! 8. Run until Ctrl-C.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use tokio::sync::mpsc;

use push_to_text::{
    audio::{new_recording_gate, new_shared_buffer, CaptureAdapter},
    config::{AppConfig, AppPaths},
    engine::{
        ApiRefiner, RefinementRouter, TranscriptionRouter, WhisperParams, WhisperTranscriber,
    },
    output::{InjectorSink, TextInjector},
    pipeline::{new_shared_state, Orchestrator},
    trigger::{GlobalTriggerDetector, ShortcutBinding, TriggerListener, TriggerSignal},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("push-to-text starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Engines
    let transcriber = Arc::new(TranscriptionRouter::empty());
    let model_path = AppPaths::new()
        .models_dir
        .join(format!("{}.bin", config.transcription.model));
    let whisper_params = WhisperParams {
        language: config.transcription.language.clone(),
        ..WhisperParams::default()
    };
    match WhisperTranscriber::load(&model_path, whisper_params) {
        Ok(engine) => transcriber.install(Arc::new(engine)),
        Err(e) => {
            // The router stays empty: chord presses are consumed but
            // rejected until a model is installed and the service restarts.
            log::warn!(
                "could not load whisper model ({}): {e} — triggers will be rejected",
                model_path.display()
            );
        }
    }

    let refiner = Arc::new(RefinementRouter::empty());
    if config.refinement.enabled {
        refiner.install(Arc::new(ApiRefiner::from_config(&config.refinement)));
        log::info!(
            "refinement enabled via {} ({})",
            config.refinement.base_url,
            config.refinement.model
        );
    }

    // 4. Shared structures
    let buffer = new_shared_buffer(config.buffer_capacity());
    let gate = new_recording_gate();
    let state = new_shared_state();
    let sink = Arc::new(InjectorSink::new(TextInjector::new()));

    // 5. Orchestrator
    let (signal_tx, signal_rx) = mpsc::channel::<TriggerSignal>(16);
    let orchestrator = Arc::new(Orchestrator::new(
        state,
        Arc::clone(&buffer),
        Arc::clone(&gate),
        Arc::clone(&transcriber),
        refiner,
        sink,
        config.pipeline_config(),
    ));
    let orchestrator_task = tokio::spawn(Arc::clone(&orchestrator).run(signal_rx));

    // 6. Trigger listener
    let binding: ShortcutBinding = config
        .trigger
        .binding
        .parse()
        .with_context(|| format!("invalid trigger binding {:?}", config.trigger.binding))?;
    let detector = Arc::new(Mutex::new(GlobalTriggerDetector::new(
        binding,
        transcriber.ready_flag(),
        signal_tx,
    )));
    let listener = TriggerListener::start(Arc::clone(&detector));
    log::info!("listening for chord {:?}", config.trigger.binding);

    // 7. Audio capture — keep the handle alive for the lifetime of main.
    let _capture_handle = match CaptureAdapter::open() {
        Ok(adapter) => match adapter.start(Arc::clone(&buffer), Arc::clone(&gate)) {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("failed to start audio stream: {e}");
                None
            }
        },
        Err(e) => {
            log::warn!("audio capture unavailable: {e}");
            None
        }
    };

    // 8. Run until interrupted.
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    log::info!("shutting down");

    drop(listener); // stop forwarding events
    orchestrator.set_idle();
    orchestrator_task.abort();

    Ok(())
}

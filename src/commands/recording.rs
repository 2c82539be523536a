//! `record` command

use super::Context;
use crate::capture::{FfmpegScreenProvider, ScreenProvider, WebcamSource};
use crate::export::{Compositor, FfmpegBackend, MultiExport};
use crate::recorder::{Recorder, RecorderConfig};
use crate::session::{FinalizeReport, SessionController, SessionEvent, SessionState};
use crate::settings::{CredentialStore, RecordingSettings};
use crate::utils::error::AppError;
use crate::utils::paths::PathNamer;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Record one session, then composite and export it
pub async fn record(ctx: &Context, settings: RecordingSettings, record_screen: bool) -> Result<()> {
    let backend = Arc::new(FfmpegBackend::default());
    backend.check_available()?;

    let camera = WebcamSource::open(settings.camera_index).map_err(AppError::from)?;
    let screen: Arc<dyn ScreenProvider> =
        Arc::new(FfmpegScreenProvider::new(ctx.settings.screen.clone()));

    let config = RecorderConfig::from(&settings);
    let recorder = Recorder::new(
        Box::new(camera),
        Some(screen),
        backend.clone(),
        PathNamer::new(&settings.output_root, &settings.extension),
        config,
    );
    let compositor = Compositor::new(backend.clone(), backend, config.fps, config.codec);
    let credentials = CredentialStore::load(ctx.credentials_path())?.snapshot();

    let controller = Arc::new(SessionController::new(
        recorder,
        compositor,
        Arc::new(MultiExport::new()),
        credentials,
    ));

    let printer = tokio::spawn(print_events(controller.subscribe()));
    let mut lifecycle = controller.subscribe();

    let session = controller.start(record_screen).await?;
    println!(
        "Recording to {} (up to {}s). Press Ctrl-C to stop.",
        session.camera_file.display(),
        settings.max_duration_secs
    );

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            }
            controller.request_stop();
        }
        _ = back_to_idle(&mut lifecycle) => {}
    }

    // No-op when the session already finalized itself
    let stopped = controller.stop().await;
    controller.wait_for_exports().await;

    // Closing the event channel lets the printer drain and exit
    drop(controller);
    let _ = printer.await;

    stopped?;
    Ok(())
}

async fn back_to_idle(events: &mut broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::StateChanged(SessionState::Idle)) => return,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Missed {} session events", n);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn print_report(report: &FinalizeReport) {
    println!(
        "Session {}: {} camera frames{}",
        report.session.id,
        report.camera_frames,
        report
            .screen_frames
            .map(|n| format!(", {n} screen frames"))
            .unwrap_or_default()
    );
    println!("Final file: {}", report.export_file.display());
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Info(message)) => println!("{message}"),
            Ok(SessionEvent::Error(error)) => eprintln!("Error [{}]: {}", error.code, error.message),
            Ok(SessionEvent::Finalized(report)) => print_report(&report),
            Ok(SessionEvent::ExportFinished { file, outcomes }) => {
                if outcomes.is_empty() {
                    println!("No storage provider configured; {} stays local", file.display());
                }
                for outcome in outcomes {
                    println!("{}: {:?}", outcome.provider, outcome.status);
                }
            }
            Ok(SessionEvent::StateChanged(state)) => tracing::debug!("Session state: {:?}", state),
            Ok(SessionEvent::Warning(message)) => println!("Warning: {message}"),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Missed {} session events", n);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

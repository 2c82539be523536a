//! Session controller
//!
//! Ties the recorder lifecycle to post-processing. Finalizing a session joins
//! the capture worker on a blocking task, composites the screen file into
//! the camera file when both are usable, and hands the final file to the
//! export dispatcher on a background task. A session whose capture loop ends
//! on its own (timeout, camera or encoder failure) is finalized without
//! waiting for `stop`.

use crate::export::compositor::Compositor;
use crate::export::dispatch::{ExportDispatcher, UploadOutcome};
use crate::recorder::{Recorder, RecordingEvent, RecordingOutcome, Session};
use crate::settings::CredentialSet;
use crate::utils::error::{AppError, AppResult, ErrorResponse};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    /// Joining the worker and compositing
    Finalizing,
}

/// User-visible notifications
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Info(String),
    /// The session degraded but keeps recording
    Warning(String),
    Error(ErrorResponse),
    StateChanged(SessionState),
    /// A session was finalized and its export queued
    Finalized(FinalizeReport),
    ExportFinished {
        file: PathBuf,
        outcomes: Vec<UploadOutcome>,
    },
}

/// What a stopped session produced
#[derive(Debug, Clone)]
pub struct FinalizeReport {
    pub session: Session,
    pub camera_frames: u64,
    pub screen_frames: Option<u64>,
    /// Set when the picture-in-picture file was written
    pub composite: Option<PathBuf>,
    /// The file handed to the export dispatcher
    pub export_file: PathBuf,
    /// Why capture ended early, if it did
    pub capture_error: Option<ErrorResponse>,
}

/// Owns the session lifecycle; shared behind an `Arc` so a finished capture
/// loop can finalize its own session.
pub struct SessionController {
    recorder: Arc<Mutex<Recorder>>,
    recorder_events: broadcast::Sender<RecordingEvent>,
    compositor: Arc<Compositor>,
    dispatcher: Arc<dyn ExportDispatcher>,
    credentials: RwLock<CredentialSet>,
    state: RwLock<SessionState>,
    session: RwLock<Option<Session>>,
    /// Bumped on every successful start
    generation: AtomicU64,
    /// Serializes start with finalization
    lifecycle: tokio::sync::Mutex<()>,
    /// Serializes exports with each other
    export_gate: Arc<tokio::sync::Mutex<()>>,
    exports: Mutex<Vec<JoinHandle<()>>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(
        recorder: Recorder,
        compositor: Compositor,
        dispatcher: Arc<dyn ExportDispatcher>,
        credentials: CredentialSet,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            recorder_events: recorder.event_sender(),
            recorder: Arc::new(Mutex::new(recorder)),
            compositor: Arc::new(compositor),
            dispatcher,
            credentials: RwLock::new(credentials),
            state: RwLock::new(SessionState::Idle),
            session: RwLock::new(None),
            generation: AtomicU64::new(0),
            lifecycle: tokio::sync::Mutex::new(()),
            export_gate: Arc::new(tokio::sync::Mutex::new(())),
            exports: Mutex::new(Vec::new()),
            event_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Subscribe to user-visible notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Replace the credentials used by later exports
    pub fn set_credentials(&self, credentials: CredentialSet) {
        *self.credentials.write() = credentials;
    }

    /// The running session, if any
    pub fn current_session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    /// Start recording; rejected unless idle.
    ///
    /// Opening the camera sink and the screen grabber can block, so the
    /// recorder is started on the blocking pool.
    pub async fn start(self: &Arc<Self>, record_screen: bool) -> AppResult<Session> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.state() != SessionState::Idle {
            return Err(AppError::AlreadyRecording);
        }

        // Subscribed before the worker exists so its end cannot be missed
        let ended = self.recorder_events.subscribe();
        let recorder = self.recorder.clone();
        let started = tokio::task::spawn_blocking(move || recorder.lock().start(record_screen))
            .await
            .map_err(|e| AppError::Recording(format!("Start task failed: {e}")))
            .and_then(|result| result.map_err(AppError::from));

        match started {
            Ok(session) => {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                *self.session.write() = Some(session.clone());
                *self.state.write() = SessionState::Recording;
                self.emit_state(SessionState::Recording);
                tokio::spawn(watch_capture(Arc::downgrade(self), generation, ended));
                Ok(session)
            }
            Err(error) => {
                self.emit_error(&error);
                Err(error)
            }
        }
    }

    /// Ask the capture loop to wind down; the session finalizes once it exits
    pub fn request_stop(&self) {
        if self.state() == SessionState::Recording {
            self.recorder.lock().request_stop();
        }
    }

    /// Stop the session, composite and start the export.
    ///
    /// Returns `Ok(None)` when nothing was recording, including when the
    /// session already finalized itself after its capture loop ended. The
    /// report is also published as [`SessionEvent::Finalized`]. The
    /// controller is back to idle when this returns, whatever the outcome.
    pub async fn stop(&self) -> AppResult<Option<FinalizeReport>> {
        let _lifecycle = self.lifecycle.lock().await;
        self.finish().await
    }

    /// Finalize the session started as `generation`, unless it is gone
    async fn finish_generation(&self, generation: u64) -> AppResult<Option<FinalizeReport>> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return Ok(None);
        }
        self.finish().await
    }

    /// Caller holds the lifecycle lock
    async fn finish(&self) -> AppResult<Option<FinalizeReport>> {
        {
            let mut state = self.state.write();
            if *state != SessionState::Recording {
                return Ok(None);
            }
            *state = SessionState::Finalizing;
        }
        self.emit_state(SessionState::Finalizing);

        let recorder = self.recorder.clone();
        let joined = tokio::task::spawn_blocking(move || recorder.lock().stop()).await;

        let result = match joined {
            Ok(Some(outcome)) => self.finalize(outcome).await.map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(AppError::Recording(format!("Stop task failed: {e}"))),
        };

        match &result {
            Ok(Some(report)) => {
                let _ = self.event_tx.send(SessionEvent::Finalized(report.clone()));
            }
            Ok(None) => {}
            Err(e) => self.emit_error(e),
        }

        *self.session.write() = None;
        *self.state.write() = SessionState::Idle;
        self.emit_state(SessionState::Idle);
        result
    }

    async fn finalize(&self, outcome: RecordingOutcome) -> AppResult<FinalizeReport> {
        let capture_error = outcome.error().map(|e| {
            let error = AppError::from(e);
            tracing::error!("Recording ended early: {}", error);
            self.emit_error(&error);
            ErrorResponse::from(&error)
        });

        let camera_file = outcome.camera_file().to_path_buf();
        if !camera_file.exists() {
            tracing::error!("Camera file missing at stop: {:?}", camera_file);
            return Err(AppError::ExportAborted(camera_file));
        }

        self.emit_info(format!("Recording finished: {}", camera_file.display()));

        let composite = match outcome.screen_file() {
            Some(screen_file) if !outcome.ended_cleanly() => {
                tracing::info!("Skipping composite of {:?}: capture ended early", screen_file);
                None
            }
            Some(screen_file) if !(non_empty(&camera_file) && non_empty(screen_file)) => {
                tracing::warn!("Skipping composite: a recording file is missing or empty");
                None
            }
            Some(screen_file) => self.composite(&camera_file, screen_file).await,
            None => None,
        };

        let export_file = composite.clone().unwrap_or_else(|| camera_file.clone());
        self.spawn_export(export_file.clone());

        Ok(FinalizeReport {
            session: outcome.session.clone(),
            camera_frames: outcome.camera_frames,
            screen_frames: outcome.screen_frames,
            composite,
            export_file,
            capture_error,
        })
    }

    /// Run the compositor off the async runtime; failures are reported only
    async fn composite(&self, camera_file: &Path, screen_file: &Path) -> Option<PathBuf> {
        let compositor = self.compositor.clone();
        let primary = camera_file.to_path_buf();
        let secondary = screen_file.to_path_buf();

        let result = tokio::task::spawn_blocking(move || compositor.combine(&primary, &secondary))
            .await
            .map_err(|e| AppError::Export(format!("Composite task failed: {e}")))
            .and_then(|r| r.map_err(AppError::from));

        match result {
            Ok(output) => {
                self.emit_info(format!("Combined video created: {}", output.path.display()));
                Some(output.path)
            }
            Err(e) => {
                tracing::warn!("Composite failed, exporting camera file instead: {}", e);
                self.emit_error(&e);
                None
            }
        }
    }

    fn spawn_export(&self, file: PathBuf) {
        let dispatcher = self.dispatcher.clone();
        let credentials = self.credentials.read().clone();
        let gate = self.export_gate.clone();
        let events = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            let _guard = gate.lock().await;
            tracing::info!("Exporting {:?}", file);
            let outcomes = dispatcher.dispatch(&file, &credentials).await;
            let _ = events.send(SessionEvent::ExportFinished { file, outcomes });
        });

        let mut exports = self.exports.lock();
        exports.retain(|h| !h.is_finished());
        exports.push(handle);
    }

    /// Wait for every export started so far
    pub async fn wait_for_exports(&self) {
        let handles: Vec<_> = std::mem::take(&mut *self.exports.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Export task failed: {}", e);
            }
        }
    }

    fn emit_state(&self, state: SessionState) {
        let _ = self.event_tx.send(SessionEvent::StateChanged(state));
    }

    fn emit_info(&self, message: String) {
        tracing::info!("{}", message);
        let _ = self.event_tx.send(SessionEvent::Info(message));
    }

    fn emit_error(&self, error: &AppError) {
        let _ = self.event_tx.send(SessionEvent::Error(ErrorResponse::from(error)));
    }
}

/// Forward recorder warnings, then finalize the session once its capture
/// loop reports that it exited
async fn watch_capture(
    controller: Weak<SessionController>,
    generation: u64,
    mut events: broadcast::Receiver<RecordingEvent>,
) {
    loop {
        match events.recv().await {
            Ok(RecordingEvent::Ended(reason)) => {
                tracing::debug!("Capture loop exited ({:?}), finalizing", reason);
                break;
            }
            Ok(RecordingEvent::Warning(message)) => {
                if let Some(controller) = controller.upgrade() {
                    let _ = controller.event_tx.send(SessionEvent::Warning(message));
                }
            }
            Ok(RecordingEvent::Started(_)) => continue,
            // `Ended` is always the newest event, so lagging never drops it
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }

    let Some(controller) = controller.upgrade() else {
        return;
    };
    if let Err(e) = controller.finish_generation(generation).await {
        tracing::error!("Session finalization failed: {}", e);
    }
}

fn non_empty(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::{FrameBuffer, PixelOrder, Resolution};
    use crate::capture::traits::ScreenProvider;
    use crate::export::types::FourCc;
    use crate::recorder::RecorderConfig;
    use crate::testing::{
        CameraGate, CameraStep, CountingDispatcher, RawMedia, ScriptedCamera,
        ScriptedScreenProvider,
    };
    use crate::utils::paths::PathNamer;
    use std::time::Duration;

    const CAMERA: Resolution = Resolution { width: 8, height: 8 };
    const SCREEN: Resolution = Resolution { width: 16, height: 16 };

    struct Harness {
        _dir: tempfile::TempDir,
        media: Arc<RawMedia>,
        dispatcher: Arc<CountingDispatcher>,
        controller: Arc<SessionController>,
    }

    fn harness(camera: ScriptedCamera, with_screen: bool) -> Harness {
        harness_with(camera, with_screen, Duration::from_secs(600))
    }

    fn harness_with(camera: ScriptedCamera, with_screen: bool, max_duration: Duration) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let media = Arc::new(RawMedia::default());
        let dispatcher = Arc::new(CountingDispatcher::default());
        let config = RecorderConfig {
            fps: 20,
            max_duration,
            codec: FourCc::XVID,
        };
        let screen: Option<Arc<dyn ScreenProvider>> = if with_screen {
            Some(Arc::new(ScriptedScreenProvider::new(SCREEN)))
        } else {
            None
        };
        let recorder = Recorder::new(
            Box::new(camera),
            screen,
            media.clone(),
            PathNamer::new(dir.path(), "avi"),
            config,
        );
        let compositor = Compositor::new(media.clone(), media.clone(), config.fps, config.codec);
        let credentials: CredentialSet = [("dropbox_token", "tok")].into_iter().collect();
        let controller = Arc::new(SessionController::new(
            recorder,
            compositor,
            dispatcher.clone(),
            credentials,
        ));
        Harness {
            _dir: dir,
            media,
            dispatcher,
            controller,
        }
    }

    fn drain_until_exhausted(controller: &SessionController, gate: &CameraGate) {
        gate.wait_exhausted();
        controller.request_stop();
        gate.release();
    }

    /// Wait for the controller to return to idle; yields the report, or the
    /// last error when finalization failed
    async fn finished(
        events: &mut broadcast::Receiver<SessionEvent>,
    ) -> Result<FinalizeReport, ErrorResponse> {
        let mut report = None;
        let mut error = None;
        loop {
            match events.recv().await {
                Ok(SessionEvent::Finalized(r)) => report = Some(r),
                Ok(SessionEvent::Error(e)) => error = Some(e),
                Ok(SessionEvent::StateChanged(SessionState::Idle)) => {
                    return report.ok_or_else(|| error.expect("finalized without a report"));
                }
                Ok(_) => continue,
                Err(e) => panic!("event stream closed: {e}"),
            }
        }
    }

    fn infos(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<String> {
        let mut infos = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Info(message) = event {
                infos.push(message);
            }
        }
        infos
    }

    #[tokio::test]
    async fn test_stop_when_idle_returns_nothing() {
        let (camera, _gate) = ScriptedCamera::frames(CAMERA, 0);
        let h = harness(camera, false);

        assert!(h.controller.stop().await.unwrap().is_none());
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert!(h.dispatcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (camera, gate) = ScriptedCamera::frames(CAMERA, 1);
        let h = harness(camera, false);

        let session = h.controller.start(false).await.unwrap();
        let err = h.controller.start(true).await.unwrap_err();
        assert_eq!(err.code(), "ALREADY_RECORDING");
        assert_eq!(h.controller.state(), SessionState::Recording);
        assert_eq!(h.controller.current_session(), Some(session));

        drain_until_exhausted(&h.controller, &gate);
        h.controller.stop().await.unwrap();
        assert_eq!(h.controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_camera_only_exports_camera_file() {
        let (camera, gate) = ScriptedCamera::frames(CAMERA, 5);
        let h = harness(camera, false);
        let mut events = h.controller.subscribe();
        let mut notices = h.controller.subscribe();

        let session = h.controller.start(false).await.unwrap();
        drain_until_exhausted(&h.controller, &gate);
        let report = finished(&mut events).await.unwrap();
        h.controller.wait_for_exports().await;

        assert_eq!(report.camera_frames, 5);
        assert!(report.composite.is_none());
        assert_eq!(report.export_file, session.camera_file);
        assert_eq!(h.dispatcher.files(), vec![session.camera_file.clone()]);
        assert_eq!(h.dispatcher.calls()[0].1.get("dropbox_token"), Some("tok"));
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert!(h.controller.current_session().is_none());

        let infos = infos(&mut notices);
        assert_eq!(infos.len(), 1);
        assert!(infos[0].starts_with("Recording finished: "));
    }

    #[tokio::test]
    async fn test_explicit_stop_returns_report() {
        let (camera, gate) = ScriptedCamera::frames(CAMERA, 2);
        let h = harness(camera, false);
        let mut events = h.controller.subscribe();

        h.controller.start(false).await.unwrap();
        drain_until_exhausted(&h.controller, &gate);

        // Either this call or the capture watcher finalizes, exactly once
        let stopped = h.controller.stop().await.unwrap();
        let report = finished(&mut events).await.unwrap();
        h.controller.wait_for_exports().await;

        if let Some(stopped) = stopped {
            assert_eq!(stopped.session, report.session);
        }
        assert!(h.controller.stop().await.unwrap().is_none());
        assert_eq!(h.dispatcher.files().len(), 1);
    }

    #[tokio::test]
    async fn test_screen_session_is_composited_then_exported() {
        let (camera, gate) = ScriptedCamera::frames(CAMERA, 4);
        let h = harness(camera, true);
        let mut events = h.controller.subscribe();
        let mut notices = h.controller.subscribe();

        let session = h.controller.start(true).await.unwrap();
        drain_until_exhausted(&h.controller, &gate);
        let report = finished(&mut events).await.unwrap();
        h.controller.wait_for_exports().await;

        let composite = report.composite.clone().unwrap();
        assert!(composite.to_string_lossy().ends_with("_combined.avi"));
        assert_eq!(report.export_file, composite);
        assert_eq!(h.dispatcher.files(), vec![composite.clone()]);

        let frames = h.media.frames(&composite).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].resolution(), CAMERA);
        // Screen pixels, stored BGR, land in the bottom-right quarter
        assert_eq!(frames[0].pixel(7, 7), [30, 20, 10]);
        assert_eq!(frames[0].pixel(0, 0), [0, 0, 0]);

        // Constituent files are kept
        assert!(session.camera_file.exists());
        assert!(session.screen_file.unwrap().exists());

        let infos = infos(&mut notices);
        assert!(infos[1].starts_with("Combined video created: "));
    }

    #[tokio::test]
    async fn test_composite_failure_still_exports_camera_file() {
        let (camera, gate) = ScriptedCamera::frames(CAMERA, 4);
        let h = harness(camera, true);
        let mut events = h.controller.subscribe();
        let mut errors = h.controller.subscribe();

        let session = h.controller.start(true).await.unwrap();
        h.media
            .fail_reads_after(session.screen_file.as_ref().unwrap(), 1);
        drain_until_exhausted(&h.controller, &gate);
        let report = finished(&mut events).await.unwrap();
        h.controller.wait_for_exports().await;

        assert!(report.composite.is_none());
        assert_eq!(h.dispatcher.files(), vec![session.camera_file.clone()]);

        let mut saw_error = false;
        while let Ok(event) = errors.try_recv() {
            if let SessionEvent::Error(e) = event {
                saw_error = true;
                assert_eq!(e.code, "EXPORT_ERROR");
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_frame_read_failure_finalizes_without_stop() {
        let frame = || CameraStep::Frame(FrameBuffer::filled(CAMERA, PixelOrder::Rgb, [5, 5, 5]));
        let (camera, _gate) = ScriptedCamera::with_steps(
            CAMERA,
            vec![frame(), frame(), CameraStep::Fail("unplugged".into())],
        );
        let h = harness(camera, true);
        let mut events = h.controller.subscribe();

        let session = h.controller.start(true).await.unwrap();
        let report = finished(&mut events).await.unwrap();
        h.controller.wait_for_exports().await;

        assert_eq!(h.controller.state(), SessionState::Idle);
        assert_eq!(report.capture_error.unwrap().code, "FRAME_READ_ERROR");
        assert_eq!(report.camera_frames, 2);
        assert_eq!(report.screen_frames, Some(2));
        assert!(report.composite.is_none());
        assert_eq!(h.media.readers_opened(), 0);
        assert_eq!(h.dispatcher.files(), vec![session.camera_file.clone()]);
        assert_eq!(h.media.frames(&session.camera_file).unwrap().len(), 2);
        assert_eq!(h.media.frames(&session.screen_file.unwrap()).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sink_failure_exports_partial_camera_file() {
        let (camera, _gate) = ScriptedCamera::frames(CAMERA, 3);
        let h = harness(camera, false);
        h.media.fail_sinks();
        let mut events = h.controller.subscribe();

        let session = h.controller.start(false).await.unwrap();
        let report = finished(&mut events).await.unwrap();
        h.controller.wait_for_exports().await;

        let error = report.capture_error.unwrap();
        assert_eq!(error.code, "RECORDING_ERROR");
        assert!(error.message.contains("disk full"));
        assert_eq!(report.camera_frames, 0);
        assert_eq!(report.export_file, session.camera_file);
        assert_eq!(h.dispatcher.files(), vec![session.camera_file.clone()]);
        assert_eq!(h.controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_screen_warning_is_forwarded() {
        let (camera, gate) = ScriptedCamera::frames(CAMERA, 2);
        let h = harness(camera, false);
        let mut events = h.controller.subscribe();
        let mut warnings = h.controller.subscribe();

        // No screen provider is configured
        let session = h.controller.start(true).await.unwrap();
        assert!(session.screen_file.is_none());
        drain_until_exhausted(&h.controller, &gate);
        finished(&mut events).await.unwrap();

        let mut forwarded = Vec::new();
        while let Ok(event) = warnings.try_recv() {
            if let SessionEvent::Warning(message) = event {
                forwarded.push(message);
            }
        }
        assert_eq!(forwarded.len(), 1);
        assert!(forwarded[0].contains("not available"));
    }

    #[tokio::test]
    async fn test_restart_after_timeout() {
        let (camera, _gate) = ScriptedCamera::frames(CAMERA, 0);
        let h = harness_with(camera, false, Duration::ZERO);
        let mut events = h.controller.subscribe();

        let first = h.controller.start(false).await.unwrap();
        let report = finished(&mut events).await.unwrap();
        h.controller.wait_for_exports().await;
        assert!(report.capture_error.is_none());
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert!(h.controller.stop().await.unwrap().is_none());

        // Free the path in case the clock has not moved on
        std::fs::remove_file(&first.camera_file).unwrap();
        let second = h.controller.start(false).await.unwrap();
        finished(&mut events).await.unwrap();
        h.controller.wait_for_exports().await;

        assert_eq!(
            h.dispatcher.files(),
            vec![first.camera_file, second.camera_file]
        );
    }

    #[tokio::test]
    async fn test_missing_camera_file_aborts_export() {
        let (camera, gate) = ScriptedCamera::frames(CAMERA, 3);
        let h = harness(camera, true);
        let mut events = h.controller.subscribe();

        let session = h.controller.start(true).await.unwrap();
        std::fs::remove_file(&session.camera_file).unwrap();
        drain_until_exhausted(&h.controller, &gate);

        let err = finished(&mut events).await.unwrap_err();
        h.controller.wait_for_exports().await;

        assert_eq!(err.code, "EXPORT_ABORTED");
        assert!(err.message.contains(&*session.camera_file.to_string_lossy()));
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert_eq!(h.media.readers_opened(), 0);
        assert!(h.dispatcher.calls().is_empty());

        // The controller accepts a new session afterwards
        assert!(h.controller.current_session().is_none());
    }

    #[tokio::test]
    async fn test_credentials_snapshot_is_taken_per_export() {
        let (camera, gate) = ScriptedCamera::frames(CAMERA, 1);
        let h = harness(camera, false);
        let mut events = h.controller.subscribe();
        h.controller
            .set_credentials([("box_token", "b")].into_iter().collect());

        h.controller.start(false).await.unwrap();
        drain_until_exhausted(&h.controller, &gate);
        finished(&mut events).await.unwrap();
        h.controller.wait_for_exports().await;

        let (_, credentials) = &h.dispatcher.calls()[0];
        assert_eq!(credentials.get("box_token"), Some("b"));
        assert!(credentials.get("dropbox_token").is_none());
    }
}

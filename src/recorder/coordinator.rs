//! Recording coordinator
//!
//! Owns the camera and drives one capture session at a time through the
//! `Idle → Recording → Stopping → Idle` lifecycle.

use super::state::{EndReason, RecorderConfig, RecordingOutcome, RecordingState, Session};
use super::worker::{self, CaptureJob, ScreenChannel, WorkerReport};
use super::{RecordingError, RecordingResult};
use crate::capture::traits::{CaptureSource, ScreenProvider};
use crate::export::types::{FrameSink, SinkFactory, VideoSpec};
use crate::utils::paths::{PathNamer, SCREEN_SUFFIX};
use chrono::{Local, NaiveDateTime};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::broadcast;

/// Events emitted during recording
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// Recording started; carries the session id
    Started(String),
    /// Something degraded but the session continues
    Warning(String),
    /// The capture loop exited
    Ended(EndReason),
}

/// Runs capture sessions against a single camera
pub struct Recorder {
    /// Current recording state
    state: Arc<RwLock<RecordingState>>,

    /// Lent to the worker while a session runs
    camera: Option<Box<dyn CaptureSource>>,

    screen: Option<Arc<dyn ScreenProvider>>,

    sinks: Arc<dyn SinkFactory>,

    namer: PathNamer,

    config: RecorderConfig,

    session: Option<Session>,

    stop_flag: Arc<AtomicBool>,

    worker: Option<JoinHandle<WorkerReport>>,

    /// Event broadcaster
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl Recorder {
    /// Create a recorder around an opened camera
    pub fn new(
        camera: Box<dyn CaptureSource>,
        screen: Option<Arc<dyn ScreenProvider>>,
        sinks: Arc<dyn SinkFactory>,
        namer: PathNamer,
        config: RecorderConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(RecordingState::Idle)),
            camera: Some(camera),
            screen,
            sinks,
            namer,
            config,
            session: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: None,
            event_tx,
        }
    }

    /// Get the current recording state
    pub fn state(&self) -> RecordingState {
        *self.state.read()
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    /// The active session, if any
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Handle for subscribing to events without borrowing the recorder
    pub fn event_sender(&self) -> broadcast::Sender<RecordingEvent> {
        self.event_tx.clone()
    }

    /// Start a session stamped with the current local time
    pub fn start(&mut self, record_screen: bool) -> RecordingResult<Session> {
        self.start_at(Local::now().naive_local(), record_screen)
    }

    /// Start a session stamped with `now`.
    ///
    /// Fails with [`RecordingError::AlreadyRecording`] unless idle, and with
    /// [`RecordingError::OutputExists`] rather than overwrite a file from an
    /// earlier session.
    pub fn start_at(&mut self, now: NaiveDateTime, record_screen: bool) -> RecordingResult<Session> {
        if self.state() != RecordingState::Idle {
            return Err(RecordingError::AlreadyRecording);
        }

        let resolution = self
            .camera
            .as_ref()
            .map(|camera| camera.resolution())
            .ok_or_else(|| RecordingError::DeviceUnavailable("camera was lost".to_string()))?;

        let dir = self.namer.ensure_directory(&now)?;
        let camera_path = dir.join(self.namer.filename_for(&now, ""));
        if camera_path.exists() {
            return Err(RecordingError::OutputExists(camera_path));
        }

        tracing::info!("Starting recording to: {:?}", camera_path);

        let camera_spec = VideoSpec {
            resolution,
            fps: self.config.fps,
            codec: self.config.codec,
        };
        let camera_sink = self.sinks.open_sink(&camera_path, &camera_spec)?;

        let screen = if record_screen {
            self.open_screen(&dir.join(self.namer.filename_for(&now, SCREEN_SUFFIX)))
        } else {
            None
        };

        let session = Session::new(
            now,
            record_screen,
            camera_path,
            screen.as_ref().map(|channel| channel.sink.path().to_path_buf()),
        );

        let camera = match self.camera.take() {
            Some(camera) => camera,
            None => {
                return Err(RecordingError::DeviceUnavailable(
                    "camera was lost".to_string(),
                ))
            }
        };

        self.stop_flag.store(false, Ordering::Release);
        let job = CaptureJob {
            camera,
            camera_sink,
            screen,
            stop: self.stop_flag.clone(),
            max_duration: self.config.max_duration,
            events: self.event_tx.clone(),
        };

        let handle = std::thread::Builder::new()
            .name("capture-worker".to_string())
            .spawn(move || worker::run(job))?;

        self.worker = Some(handle);
        self.session = Some(session.clone());
        *self.state.write() = RecordingState::Recording;
        let _ = self.event_tx.send(RecordingEvent::Started(session.id.clone()));

        tracing::info!("Recording started (session {})", session.id);
        Ok(session)
    }

    /// Open the screen source and its sink; failures degrade to camera-only
    fn open_screen(&self, path: &Path) -> Option<ScreenChannel> {
        let Some(provider) = self.screen.as_ref() else {
            self.warn("Screen capture is not available on this system".to_string());
            return None;
        };

        let source = match provider.open_screen(self.config.fps) {
            Ok(source) => source,
            Err(e) => {
                self.warn(format!("Screen capture unavailable, recording camera only: {e}"));
                return None;
            }
        };

        let spec = VideoSpec {
            resolution: source.resolution(),
            fps: self.config.fps,
            codec: self.config.codec,
        };
        let sink: Box<dyn FrameSink> = match self.sinks.open_sink(path, &spec) {
            Ok(sink) => sink,
            Err(e) => {
                self.warn(format!("Could not create screen file, recording camera only: {e}"));
                return None;
            }
        };

        Some(ScreenChannel { source, sink })
    }

    fn warn(&self, message: String) {
        tracing::warn!("{}", message);
        let _ = self.event_tx.send(RecordingEvent::Warning(message));
    }

    /// Ask the capture loop to exit without waiting for it
    pub fn request_stop(&self) {
        if self.state() == RecordingState::Recording {
            self.stop_flag.store(true, Ordering::Release);
        }
    }

    /// Stop the session and wait for its files to be closed.
    ///
    /// Returns `None` when no session is running.
    pub fn stop(&mut self) -> Option<RecordingOutcome> {
        if self.state() != RecordingState::Recording {
            return None;
        }

        tracing::info!("Stopping recording");
        *self.state.write() = RecordingState::Stopping;
        self.stop_flag.store(true, Ordering::Release);

        let report = self.worker.take().map(|handle| handle.join());
        let session = self.session.take();

        let outcome = match (report, session) {
            (Some(Ok(report)), Some(session)) => {
                self.camera = Some(report.camera);
                Some(RecordingOutcome {
                    session,
                    camera_frames: report.camera_frames,
                    screen_frames: report.screen_frames,
                    ended_by: report.ended_by,
                    duration: report.duration,
                })
            }
            (Some(Err(_)), Some(session)) => {
                tracing::error!("Capture worker panicked; camera is no longer available");
                Some(RecordingOutcome {
                    session,
                    camera_frames: 0,
                    screen_frames: None,
                    ended_by: EndReason::Panicked,
                    duration: Default::default(),
                })
            }
            _ => None,
        };

        *self.state.write() = RecordingState::Idle;

        if let Some(outcome) = &outcome {
            tracing::info!(
                "Recording stopped ({:?}). Files: {:?}",
                outcome.ended_by,
                outcome.files()
            );
        }
        outcome
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.state() == RecordingState::Recording {
            self.stop();
        }
    }
}

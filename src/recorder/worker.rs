//! Capture loop
//!
//! Runs on its own thread. Every iteration reads one camera frame and, when
//! a screen is attached, one screen snapshot; both are written before the
//! next iteration starts. Cancellation is checked once per iteration.

use super::coordinator::RecordingEvent;
use super::state::EndReason;
use crate::capture::traits::{CaptureError, CaptureSource, ScreenSource};
use crate::export::types::{FrameSink, SINK_PIXEL_ORDER};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

pub(crate) struct ScreenChannel {
    pub source: Box<dyn ScreenSource>,
    pub sink: Box<dyn FrameSink>,
}

pub(crate) struct CaptureJob {
    pub camera: Box<dyn CaptureSource>,
    pub camera_sink: Box<dyn FrameSink>,
    pub screen: Option<ScreenChannel>,
    pub stop: Arc<AtomicBool>,
    pub max_duration: Duration,
    pub events: broadcast::Sender<RecordingEvent>,
}

/// What the worker hands back on exit; the camera returns to the recorder
pub(crate) struct WorkerReport {
    pub camera: Box<dyn CaptureSource>,
    pub camera_frames: u64,
    pub screen_frames: Option<u64>,
    pub ended_by: EndReason,
    pub duration: Duration,
}

pub(crate) fn run(job: CaptureJob) -> WorkerReport {
    let CaptureJob {
        mut camera,
        mut camera_sink,
        mut screen,
        stop,
        max_duration,
        events,
    } = job;

    let started = Instant::now();
    let mut screen_frames = screen.as_ref().map(|_| 0u64);

    let mut ended_by = loop {
        if stop.load(Ordering::Acquire) {
            break EndReason::Stopped;
        }
        if started.elapsed() >= max_duration {
            tracing::info!("Maximum session duration reached ({:?})", max_duration);
            break EndReason::TimedOut;
        }

        let frame = match camera.read_frame() {
            Ok(frame) => frame,
            // A read interrupted by the stop request is not a failure
            Err(_) if stop.load(Ordering::Acquire) => break EndReason::Stopped,
            Err(e) => {
                tracing::error!("Camera read failed: {}", e);
                let reason = match e {
                    CaptureError::ReadFailed(msg) => msg,
                    other => other.to_string(),
                };
                break EndReason::FrameReadFailed(reason);
            }
        };

        if let Err(e) = camera_sink.write_frame(&frame.into_order(SINK_PIXEL_ORDER)) {
            tracing::error!("Camera sink rejected frame: {}", e);
            break EndReason::SinkFailed(e.to_string());
        }

        let screen_error = screen.as_mut().and_then(|channel| {
            let result = channel
                .source
                .snapshot()
                .map_err(|e| e.to_string())
                .and_then(|shot| {
                    channel
                        .sink
                        .write_frame(&shot.into_order(SINK_PIXEL_ORDER))
                        .map_err(|e| e.to_string())
                });
            result.err()
        });

        if let Some(reason) = screen_error {
            tracing::warn!("Screen capture failed, continuing camera-only: {}", reason);
            let _ = events.send(RecordingEvent::Warning(format!(
                "Screen capture stopped: {reason}"
            )));
            if let Some(channel) = screen.take() {
                screen_frames = Some(close_screen(channel));
            }
        }
    };

    let camera_frames = camera_sink.frames_written();
    if let Err(e) = camera_sink.finish() {
        tracing::error!("Failed to finalize camera file: {}", e);
        if ended_by.is_clean() {
            ended_by = EndReason::SinkFailed(e.to_string());
        }
    }

    if let Some(channel) = screen.take() {
        screen_frames = Some(close_screen(channel));
    }

    let duration = started.elapsed();
    tracing::info!(
        "Capture loop ended ({:?}): {} camera frames, {:?} screen frames in {:.1}s",
        ended_by,
        camera_frames,
        screen_frames,
        duration.as_secs_f64()
    );

    let _ = events.send(RecordingEvent::Ended(ended_by.clone()));

    WorkerReport {
        camera,
        camera_frames,
        screen_frames,
        ended_by,
        duration,
    }
}

fn close_screen(channel: ScreenChannel) -> u64 {
    let ScreenChannel { source, sink } = channel;
    // Stop the grabber before the encoder flushes
    drop(source);
    let frames = sink.frames_written();
    if let Err(e) = sink.finish() {
        tracing::warn!("Failed to finalize screen file: {}", e);
    }
    frames
}

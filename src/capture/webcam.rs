//! Webcam capture using nokhwa
//!
//! The nokhwa camera handle is not `Send`, so it lives on a dedicated device
//! thread for the whole process lifetime. [`WebcamSource`] is the `Send`
//! handle the recorder owns: every `read_frame` is a request/reply round
//! trip to that thread.

use super::frame::{FrameBuffer, PixelOrder, Resolution};
use super::traits::{CameraInfo, CaptureError, CaptureResult, CaptureSource};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::sync::mpsc;
use std::thread::JoinHandle;

/// Get list of available cameras
pub fn get_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                CameraInfo {
                    id,
                    name: info.human_name().to_string(),
                    description: info.description().to_string(),
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

type FrameReply = mpsc::SyncSender<CaptureResult<FrameBuffer>>;

/// Handle to a camera opened on its device thread
pub struct WebcamSource {
    requests: Option<mpsc::Sender<FrameReply>>,
    resolution: Resolution,
    device_thread: Option<JoinHandle<()>>,
}

impl WebcamSource {
    /// Open the camera at `index`.
    ///
    /// Returns [`CaptureError::DeviceUnavailable`] when the device cannot be
    /// opened or its stream cannot be started.
    pub fn open(index: u32) -> CaptureResult<Self> {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<CaptureResult<Resolution>>(1);
        let (request_tx, request_rx) = mpsc::channel::<FrameReply>();

        let device_thread = std::thread::Builder::new()
            .name("camera-device".to_string())
            .spawn(move || device_loop(index, ready_tx, request_rx))?;

        let resolution = match ready_rx.recv() {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(e)) => {
                let _ = device_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = device_thread.join();
                return Err(CaptureError::DeviceUnavailable(
                    "camera thread exited during startup".to_string(),
                ));
            }
        };

        tracing::info!("Webcam {} opened at {}", index, resolution);

        Ok(Self {
            requests: Some(request_tx),
            resolution,
            device_thread: Some(device_thread),
        })
    }
}

impl CaptureSource for WebcamSource {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn read_frame(&mut self) -> CaptureResult<FrameBuffer> {
        let requests = self
            .requests
            .as_ref()
            .ok_or_else(|| CaptureError::DeviceUnavailable("camera closed".to_string()))?;

        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        requests
            .send(reply_tx)
            .map_err(|_| CaptureError::ReadFailed("camera thread is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| CaptureError::ReadFailed("camera thread dropped the request".to_string()))?
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        // Closing the request channel ends the device loop
        drop(self.requests.take());
        if let Some(handle) = self.device_thread.take() {
            let _ = handle.join();
        }
    }
}

fn device_loop(
    index: u32,
    ready: mpsc::SyncSender<CaptureResult<Resolution>>,
    requests: mpsc::Receiver<FrameReply>,
) {
    let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

    let mut camera = match Camera::new(CameraIndex::Index(index), format) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to open camera {}: {:?}", index, e);
            let _ = ready.send(Err(CaptureError::DeviceUnavailable(e.to_string())));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        tracing::error!("Failed to open camera stream: {:?}", e);
        let _ = ready.send(Err(CaptureError::DeviceUnavailable(e.to_string())));
        return;
    }

    let camera_format = camera.camera_format();
    let resolution = Resolution::new(
        camera_format.resolution().width(),
        camera_format.resolution().height(),
    );
    tracing::debug!(
        "Camera format: {}x{} @ {}fps, {:?}",
        resolution.width,
        resolution.height,
        camera_format.frame_rate(),
        camera_format.format()
    );

    if ready.send(Ok(resolution)).is_err() {
        let _ = camera.stop_stream();
        return;
    }

    while let Ok(reply) = requests.recv() {
        let result = camera
            .frame()
            .and_then(|buffer| buffer.decode_image::<RgbFormat>())
            .map_err(|e| CaptureError::ReadFailed(e.to_string()))
            .and_then(|image| {
                let frame_res = Resolution::new(image.width(), image.height());
                FrameBuffer::from_raw(frame_res, PixelOrder::Rgb, image.into_raw())
                    .map_err(|e| CaptureError::ReadFailed(e.to_string()))
            })
            .and_then(|frame| {
                // Some backends change size mid-stream; sinks are fixed-size
                if frame.resolution() == resolution {
                    Ok(frame)
                } else {
                    Err(CaptureError::ReadFailed(format!(
                        "camera delivered {} but stream was negotiated at {}",
                        frame.resolution(),
                        resolution
                    )))
                }
            });
        let _ = reply.send(result);
    }

    if let Err(e) = camera.stop_stream() {
        tracing::warn!("Error stopping camera stream: {:?}", e);
    }
    tracing::info!("Camera device thread stopped");
}

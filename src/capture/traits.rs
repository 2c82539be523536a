//! Capture trait definitions
//!
//! Platform-agnostic traits for capture sources.

use super::frame::{FrameBuffer, Resolution};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Failed to read frame: {0}")]
    ReadFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// A camera-like source yielding one frame per request.
///
/// Reads block until the device delivers the next frame, so the caller's
/// loop cadence follows the device.
pub trait CaptureSource: Send {
    /// Negotiated output resolution; every frame read has this size
    fn resolution(&self) -> Resolution;

    /// Block until the next frame is available
    fn read_frame(&mut self) -> CaptureResult<FrameBuffer>;
}

/// A screen source producing on-demand snapshots
pub trait ScreenSource: Send {
    /// Detected screen resolution
    fn resolution(&self) -> Resolution;

    /// Take a snapshot of the current screen contents
    fn snapshot(&mut self) -> CaptureResult<FrameBuffer>;
}

/// Opens a fresh screen source for each recording session
pub trait ScreenProvider: Send + Sync {
    fn open_screen(&self, fps: u32) -> CaptureResult<Box<dyn ScreenSource>>;
}

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Backend-specific description
    pub description: String,
}

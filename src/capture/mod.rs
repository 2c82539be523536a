//! Capture sources
//!
//! Camera capture goes through nokhwa; screen capture runs an FFmpeg grab
//! device. Both hand out [`FrameBuffer`]s through the traits in [`traits`].

pub mod frame;
pub mod screen;
pub mod traits;
pub mod webcam;

pub use frame::{FrameBuffer, PixelOrder, Resolution};
pub use screen::{FfmpegScreenProvider, FfmpegScreenSource};
pub use traits::{
    CameraInfo, CaptureError, CaptureResult, CaptureSource, ScreenProvider,
    ScreenSource,
};
pub use webcam::{get_cameras, WebcamSource};

//! Media and export types
//!
//! This module defines the sink/reader abstractions shared by the recorder
//! and the compositor, the codec tag type, and the error types for encoding,
//! decoding and export.

use crate::capture::frame::{FrameBuffer, FrameSizeError, PixelOrder, Resolution};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Channel ordering every video sink expects
pub const SINK_PIXEL_ORDER: PixelOrder = PixelOrder::Bgr;

/// A four-character codec tag such as `XVID`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FourCc([u8; 4]);

impl FourCc {
    pub const XVID: FourCc = FourCc(*b"XVID");
    pub const MJPG: FourCc = FourCc(*b"MJPG");
    pub const H264: FourCc = FourCc(*b"H264");
    pub const FFV1: FourCc = FourCc(*b"FFV1");

    pub fn as_str(&self) -> &str {
        // Construction only admits ASCII alphanumerics
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// FFmpeg output arguments selecting the encoder for this tag
    pub fn encoder_args(&self) -> Result<Vec<String>, MediaError> {
        let args = match Encoder::for_tag(&self.0) {
            Some(Encoder::Mpeg4) => vec!["-c:v", "mpeg4", "-vtag", self.as_str(), "-q:v", "4"],
            Some(Encoder::Mjpeg) => vec!["-c:v", "mjpeg", "-q:v", "3", "-pix_fmt", "yuvj420p"],
            Some(Encoder::X264) => vec![
                "-c:v", "libx264", "-preset", "veryfast", "-crf", "18", "-pix_fmt", "yuv420p",
            ],
            Some(Encoder::Ffv1) => vec!["-c:v", "ffv1"],
            None => return Err(MediaError::UnsupportedCodec(self.to_string())),
        };
        Ok(args.into_iter().map(String::from).collect())
    }
}

/// FFmpeg encoder families reachable from a codec tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoder {
    Mpeg4,
    Mjpeg,
    X264,
    Ffv1,
}

impl Encoder {
    fn for_tag(tag: &[u8; 4]) -> Option<Self> {
        match tag {
            b"XVID" | b"DIVX" | b"FMP4" => Some(Self::Mpeg4),
            b"MJPG" => Some(Self::Mjpeg),
            b"H264" | b"AVC1" | b"X264" => Some(Self::X264),
            b"FFV1" => Some(Self::Ffv1),
            _ => None,
        }
    }
}

impl Default for FourCc {
    fn default() -> Self {
        Self::XVID
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FourCc {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii_alphanumeric()) {
            return Err(MediaError::UnsupportedCodec(s.to_string()));
        }
        let mut tag = [0u8; 4];
        for (dst, src) in tag.iter_mut().zip(bytes) {
            *dst = src.to_ascii_uppercase();
        }
        if Encoder::for_tag(&tag).is_none() {
            return Err(MediaError::UnsupportedCodec(s.to_string()));
        }
        Ok(FourCc(tag))
    }
}

impl TryFrom<String> for FourCc {
    type Error = MediaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FourCc> for String {
    fn from(value: FourCc) -> Self {
        value.to_string()
    }
}

/// Format of a video stream written by a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSpec {
    pub resolution: Resolution,
    pub fps: u32,
    pub codec: FourCc,
}

/// An output that accepts frames and encodes them to a file
pub trait FrameSink: Send {
    /// Path of the file being written
    fn path(&self) -> &Path;

    /// Encode one frame; it must match the sink's resolution
    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<(), MediaError>;

    /// Number of frames accepted so far
    fn frames_written(&self) -> u64;

    /// Flush and close the file
    fn finish(self: Box<Self>) -> Result<PathBuf, MediaError>;
}

/// Opens sinks for new video files
pub trait SinkFactory: Send + Sync {
    fn open_sink(&self, path: &Path, spec: &VideoSpec) -> Result<Box<dyn FrameSink>, MediaError>;
}

/// Sequential reader over a finished video file
pub trait VideoReader: Send {
    fn resolution(&self) -> Resolution;

    fn fps(&self) -> f64;

    /// Next frame, or `None` once the stream is exhausted
    fn read_frame(&mut self) -> Result<Option<FrameBuffer>, MediaError>;
}

/// Opens readers over finished video files
pub trait ReaderFactory: Send + Sync {
    fn open_reader(&self, path: &Path) -> Result<Box<dyn VideoReader>, MediaError>;
}

/// Check a frame against the sink's negotiated format
pub fn check_frame(spec: &VideoSpec, frame: &FrameBuffer) -> Result<(), MediaError> {
    if frame.resolution() != spec.resolution {
        return Err(MediaError::FrameMismatch {
            expected: spec.resolution,
            actual: frame.resolution(),
        });
    }
    Ok(())
}

/// Encoding/decoding errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Frame is {actual}, sink expects {expected}")]
    FrameMismatch {
        expected: Resolution,
        actual: Resolution,
    },

    #[error("Unsupported codec tag: {0}")]
    UnsupportedCodec(String),
}

impl From<FrameSizeError> for MediaError {
    fn from(e: FrameSizeError) -> Self {
        MediaError::Decoding(e.to_string())
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read {}: {reason}", path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Upload to {provider} failed: {message}")]
    Upload { provider: String, message: String },
}

impl From<ExportError> for String {
    fn from(e: ExportError) -> String {
        e.to_string()
    }
}

//! Video export module
//!
//! Media encode/decode over FFmpeg, the picture-in-picture compositor, and
//! dispatch of finished files to storage providers.

pub mod compositor;
pub mod dispatch;
pub mod ffmpeg;
pub mod types;

pub use compositor::{overlay_corner, overlay_rect, CompositeOutput, Compositor, OverlayRect};
pub use dispatch::{
    CredentialField, ExportDispatcher, MultiExport, Provider, ProviderCredentials, UploadOutcome,
    UploadStatus, Uploader,
};
pub use ffmpeg::FfmpegBackend;
pub use types::{
    ExportError, FourCc, FrameSink, MediaError, ReaderFactory, SinkFactory, VideoReader,
    VideoSpec, SINK_PIXEL_ORDER,
};

//! Picture-in-picture compositing
//!
//! Reads two finished recordings in lockstep and writes a third video where
//! every secondary frame is shrunk to a quarter of the primary's size and
//! pasted into the primary's bottom-right corner.

use crate::capture::frame::FrameBuffer;
use crate::export::types::{
    ExportError, FourCc, FrameSink, MediaError, ReaderFactory, SinkFactory, VideoReader, VideoSpec,
};
use crate::utils::paths::combined_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Placement of the overlay inside the primary frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Overlay geometry for a primary frame of the given size.
///
/// The overlay is a quarter of the primary's width and height, flush with
/// the bottom and right edges. `None` when the primary is too small to hold
/// a non-empty overlay.
pub fn overlay_rect(primary_width: u32, primary_height: u32) -> Option<OverlayRect> {
    let width = primary_width / 4;
    let height = primary_height / 4;
    if width == 0 || height == 0 {
        return None;
    }
    Some(OverlayRect {
        x: primary_width - width,
        y: primary_height - height,
        width,
        height,
    })
}

/// Paste `secondary`, scaled down, over the bottom-right corner of `primary`
pub fn overlay_corner(primary: &mut FrameBuffer, secondary: &FrameBuffer) -> Option<OverlayRect> {
    let rect = overlay_rect(primary.width(), primary.height())?;
    if secondary.width() == 0 || secondary.height() == 0 {
        return None;
    }
    let scaled = secondary.resize_nearest(rect.width, rect.height);
    primary.blit(&scaled, rect.x, rect.y);
    Some(rect)
}

/// Result of a successful composite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeOutput {
    pub path: PathBuf,
    pub frames: u64,
}

/// Merges two recordings into one picture-in-picture video
pub struct Compositor {
    readers: Arc<dyn ReaderFactory>,
    sinks: Arc<dyn SinkFactory>,
    fps: u32,
    codec: FourCc,
}

impl Compositor {
    /// Create a compositor writing at the recording frame rate and codec
    pub fn new(
        readers: Arc<dyn ReaderFactory>,
        sinks: Arc<dyn SinkFactory>,
        fps: u32,
        codec: FourCc,
    ) -> Self {
        Self {
            readers,
            sinks,
            fps,
            codec,
        }
    }

    /// Overlay `secondary` onto `primary`, writing `<primary>_combined.<ext>`.
    ///
    /// The output is staged under a temporary name and only renamed into place
    /// once both streams were read to the end of the shorter one.
    pub fn combine(&self, primary: &Path, secondary: &Path) -> Result<CompositeOutput, ExportError> {
        let mut primary_reader = self.open(primary)?;
        let mut secondary_reader = self.open(secondary)?;

        let output_path = combined_path(primary);
        let staging_path = staging_path(&output_path);

        let spec = VideoSpec {
            resolution: primary_reader.resolution(),
            fps: self.fps,
            codec: self.codec,
        };

        let source_fps = primary_reader.fps();
        if (source_fps - f64::from(self.fps)).abs() > 0.5 {
            tracing::warn!(
                "{:?} runs at {:.2} fps; the composite is written at {} fps",
                primary,
                source_fps,
                self.fps
            );
        }

        tracing::info!(
            "Compositing {:?} ({}) with {:?} ({}) into {:?}",
            primary,
            primary_reader.resolution(),
            secondary,
            secondary_reader.resolution(),
            output_path
        );

        let mut sink = self.sinks.open_sink(&staging_path, &spec)?;

        let frames = match pump(
            primary_reader.as_mut(),
            secondary_reader.as_mut(),
            sink.as_mut(),
        ) {
            Ok(frames) => frames,
            Err(e) => {
                drop(sink);
                remove_staging(&staging_path);
                return Err(e.into());
            }
        };

        // Readers are done; release them before the encoder flushes
        drop(primary_reader);
        drop(secondary_reader);

        if let Err(e) = sink.finish() {
            remove_staging(&staging_path);
            return Err(e.into());
        }

        std::fs::rename(&staging_path, &output_path).inspect_err(|_| remove_staging(&staging_path))?;

        tracing::info!("Combined video created: {:?} ({} frames)", output_path, frames);

        Ok(CompositeOutput {
            path: output_path,
            frames,
        })
    }

    fn open(&self, path: &Path) -> Result<Box<dyn VideoReader>, ExportError> {
        self.readers
            .open_reader(path)
            .map_err(|e| ExportError::SourceUnreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

/// Advance both readers one frame at a time until either is exhausted
fn pump(
    primary: &mut dyn VideoReader,
    secondary: &mut dyn VideoReader,
    sink: &mut dyn FrameSink,
) -> Result<u64, MediaError> {
    let mut frames = 0u64;
    loop {
        let Some(mut frame) = primary.read_frame()? else {
            break;
        };
        let Some(overlay) = secondary.read_frame()? else {
            break;
        };

        overlay_corner(&mut frame, &overlay);
        sink.write_frame(&frame)?;
        frames += 1;
    }
    Ok(frames)
}

/// `<dir>/<stem>.partial.<ext>` next to the final output
fn staging_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{stem}.partial.{}", ext.to_string_lossy()),
        None => format!("{stem}.partial"),
    };
    output.with_file_name(name)
}

fn remove_staging(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove partial composite {:?}: {}", path, e);
        }
    }
}

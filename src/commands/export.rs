//! `combine` command

use super::Context;
use crate::export::{Compositor, FfmpegBackend};
use crate::utils::error::AppError;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Composite `secondary` into the corner of `primary` as a standalone step
pub async fn combine(ctx: &Context, primary: PathBuf, secondary: PathBuf) -> Result<()> {
    let backend = Arc::new(FfmpegBackend::default());
    backend.check_available()?;

    let recording = &ctx.settings.recording;
    let compositor = Compositor::new(backend.clone(), backend, recording.fps, recording.codec);

    let output = tokio::task::spawn_blocking(move || compositor.combine(&primary, &secondary))
        .await?
        .map_err(AppError::from)?;

    println!(
        "Combined video created: {} ({} frames)",
        output.path.display(),
        output.frames
    );
    Ok(())
}

//! cam-recorder - webcam recording with optional picture-in-picture screen capture.
//!
//! This is the main library crate. It provides the capture sources, the
//! recorder and compositor, export dispatch, and the command-line entry point.

pub mod capture;
pub mod commands;
pub mod export;
pub mod recorder;
pub mod session;
pub mod settings;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging and run the command line
pub fn run() -> anyhow::Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cam_recorder=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting cam-recorder v{}", env!("CARGO_PKG_VERSION"));

    let cli = commands::Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(commands::execute(cli))
}

//! Command-line control surface
//!
//! Each subcommand maps onto one handler module. Handlers print user-facing
//! messages; diagnostics go through `tracing`.

pub mod credentials;
pub mod export;
pub mod recording;
pub mod system;

use crate::settings::{self, Settings, SettingsError, CREDENTIALS_FILE, SETTINGS_FILE};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cam-recorder")]
#[command(about = "Record the webcam, optionally together with the screen")]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record until Ctrl-C or the maximum duration
    Record {
        /// Also capture the screen and composite it into the camera video
        #[arg(long)]
        screen: bool,

        /// Maximum session length in seconds
        #[arg(long)]
        max_duration: Option<u64>,

        /// Root directory for recordings
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Camera index
        #[arg(long)]
        camera: Option<u32>,
    },

    /// Overlay a secondary video onto the corner of a primary one
    Combine {
        primary: PathBuf,
        secondary: PathBuf,
    },

    /// List available cameras
    Cameras,

    /// Show system and media backend information
    System,

    /// Manage storage provider credentials
    Credentials {
        #[command(subcommand)]
        action: CredentialsAction,
    },
}

#[derive(Subcommand)]
pub enum CredentialsAction {
    /// Show stored credentials, secrets masked
    Show,
    /// Set one credential
    Set { key: String, value: String },
    /// Remove one credential
    Unset { key: String },
    /// List providers and the keys they read
    Providers,
}

/// Resolved configuration locations and the loaded settings
pub struct Context {
    pub config_dir: PathBuf,
    pub settings_path: PathBuf,
    pub settings: Settings,
}

impl Context {
    pub fn load(settings_path: Option<&Path>) -> Result<Self, SettingsError> {
        let settings_path = match settings_path {
            Some(path) => path.to_path_buf(),
            None => settings::default_config_dir()?.join(SETTINGS_FILE),
        };
        let config_dir = settings_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let settings = settings::load_settings(&settings_path)?;
        Ok(Self {
            config_dir,
            settings_path,
            settings,
        })
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.config_dir.join(CREDENTIALS_FILE)
    }
}

/// Run the parsed command line
pub async fn execute(cli: Cli) -> Result<()> {
    let ctx = Context::load(cli.settings.as_deref())?;
    tracing::debug!("Using settings from {:?}", ctx.settings_path);

    match cli.command {
        Commands::Record {
            screen,
            max_duration,
            output,
            camera,
        } => {
            let mut settings = ctx.settings.recording.clone();
            if let Some(secs) = max_duration {
                settings.max_duration_secs = secs;
            }
            if let Some(root) = output {
                settings.output_root = root;
            }
            if let Some(index) = camera {
                settings.camera_index = index;
            }
            recording::record(&ctx, settings, screen).await
        }
        Commands::Combine { primary, secondary } => {
            export::combine(&ctx, primary, secondary).await
        }
        Commands::Cameras => system::cameras(),
        Commands::System => system::system_info(&ctx),
        Commands::Credentials { action } => credentials::run(&ctx, action),
    }
}

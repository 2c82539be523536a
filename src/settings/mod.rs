//! User configuration
//!
//! Recording settings and provider credentials, both stored as JSON in the
//! user config directory.

pub mod credentials;
pub mod schema;
pub mod store;

pub use credentials::{mask, CredentialSet, CredentialStore};
pub use schema::{RecordingSettings, ScreenSettings, Settings};
pub use store::{
    default_config_dir, load_settings, SettingsError, CREDENTIALS_FILE,
    SETTINGS_FILE,
};

//! Export dispatch
//!
//! Hands a finished recording to every storage provider that has
//! credentials configured. Upload protocols live behind [`Uploader`]
//! implementations registered with [`MultiExport`].

use crate::export::types::ExportError;
use crate::settings::CredentialSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// One named credential a provider reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialField {
    pub key: &'static str,
    pub label: &'static str,
    /// Masked when displayed
    pub secret: bool,
    pub required: bool,
}

const fn field(key: &'static str, label: &'static str, secret: bool) -> CredentialField {
    CredentialField {
        key,
        label,
        secret,
        required: true,
    }
}

const FTP_FIELDS: &[CredentialField] = &[
    field("ftp_host", "FTP Host", false),
    field("ftp_username", "FTP Username", false),
    field("ftp_password", "FTP Password", true),
    CredentialField {
        key: "ftp_destination",
        label: "FTP Destination Path",
        secret: false,
        required: false,
    },
];
const GDRIVE_FIELDS: &[CredentialField] = &[field("gdrive_folder_id", "Google Drive Folder ID", false)];
const DROPBOX_FIELDS: &[CredentialField] = &[field("dropbox_token", "Dropbox Access Token", true)];
const ONEDRIVE_FIELDS: &[CredentialField] = &[
    field("onedrive_client_id", "OneDrive Client ID", false),
    field("onedrive_client_secret", "OneDrive Client Secret", true),
    field("onedrive_tenant_id", "OneDrive Tenant ID", false),
];
const SYNC_COM_FIELDS: &[CredentialField] = &[field("sync_com_token", "Sync.com Access Token", true)];
const TRESORIT_FIELDS: &[CredentialField] = &[field("tresorit_token", "Tresorit Access Token", true)];
const WASABI_FIELDS: &[CredentialField] = &[
    field("wasabi_access_key", "Wasabi Access Key", false),
    field("wasabi_secret_key", "Wasabi Secret Key", true),
];
const MEGA_FIELDS: &[CredentialField] = &[
    field("mega_email", "Mega Email", false),
    field("mega_password", "Mega Password", true),
];
const BOX_FIELDS: &[CredentialField] = &[field("box_token", "Box Access Token", true)];

/// Supported storage providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Ftp,
    GoogleDrive,
    Dropbox,
    OneDrive,
    SyncCom,
    Tresorit,
    Wasabi,
    Mega,
    BoxCom,
}

impl Provider {
    pub const ALL: [Provider; 9] = [
        Provider::Ftp,
        Provider::GoogleDrive,
        Provider::Dropbox,
        Provider::OneDrive,
        Provider::SyncCom,
        Provider::Tresorit,
        Provider::Wasabi,
        Provider::Mega,
        Provider::BoxCom,
    ];

    /// Short identifier used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Ftp => "ftp",
            Provider::GoogleDrive => "gdrive",
            Provider::Dropbox => "dropbox",
            Provider::OneDrive => "onedrive",
            Provider::SyncCom => "sync",
            Provider::Tresorit => "tresorit",
            Provider::Wasabi => "wasabi",
            Provider::Mega => "mega",
            Provider::BoxCom => "box",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Ftp => "FTP",
            Provider::GoogleDrive => "Google Drive",
            Provider::Dropbox => "Dropbox",
            Provider::OneDrive => "OneDrive",
            Provider::SyncCom => "Sync.com",
            Provider::Tresorit => "Tresorit",
            Provider::Wasabi => "Wasabi",
            Provider::Mega => "Mega",
            Provider::BoxCom => "Box",
        }
    }

    pub fn fields(&self) -> &'static [CredentialField] {
        match self {
            Provider::Ftp => FTP_FIELDS,
            Provider::GoogleDrive => GDRIVE_FIELDS,
            Provider::Dropbox => DROPBOX_FIELDS,
            Provider::OneDrive => ONEDRIVE_FIELDS,
            Provider::SyncCom => SYNC_COM_FIELDS,
            Provider::Tresorit => TRESORIT_FIELDS,
            Provider::Wasabi => WASABI_FIELDS,
            Provider::Mega => MEGA_FIELDS,
            Provider::BoxCom => BOX_FIELDS,
        }
    }

    /// Provider and field declaring `key`, if any
    pub fn field_for_key(key: &str) -> Option<(Provider, CredentialField)> {
        Provider::ALL.iter().find_map(|provider| {
            provider
                .fields()
                .iter()
                .find(|f| f.key == key)
                .map(|f| (*provider, *f))
        })
    }

    /// The provider's subset of `credentials`, or `None` when a required
    /// field is missing
    pub fn credentials_from(&self, credentials: &CredentialSet) -> Option<ProviderCredentials> {
        let mut values = BTreeMap::new();
        for field in self.fields() {
            match credentials.get(field.key) {
                Some(value) => {
                    values.insert(field.key, value.to_string());
                }
                None if field.required => return None,
                None => {}
            }
        }
        Some(ProviderCredentials {
            provider: *self,
            values,
        })
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.name() == lower)
            .ok_or_else(|| format!("Unknown provider: {s}"))
    }
}

/// Credentials scoped to a single provider
#[derive(Clone)]
pub struct ProviderCredentials {
    provider: Provider,
    values: BTreeMap<&'static str, String>,
}

impl ProviderCredentials {
    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("provider", &self.provider)
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Upload protocol for one provider
#[async_trait]
pub trait Uploader: Send + Sync {
    fn provider(&self) -> Provider;

    async fn upload(&self, file: &Path, credentials: &ProviderCredentials) -> Result<(), ExportError>;
}

/// Outcome of offering a file to one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Uploaded,
    Failed(String),
    /// Credentials are configured but nothing can speak the protocol
    NoUploader,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub provider: Provider,
    pub status: UploadStatus,
}

/// Sends a finished file to the configured providers
#[async_trait]
pub trait ExportDispatcher: Send + Sync {
    /// Offer `file` to every provider configured in `credentials`.
    ///
    /// Unconfigured providers are skipped and produce no outcome.
    async fn dispatch(&self, file: &Path, credentials: &CredentialSet) -> Vec<UploadOutcome>;
}

/// Dispatcher over a registry of uploaders
#[derive(Default)]
pub struct MultiExport {
    uploaders: HashMap<Provider, Arc<dyn Uploader>>,
}

impl MultiExport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an uploader, replacing any previous one for its provider
    pub fn register(&mut self, uploader: Arc<dyn Uploader>) {
        tracing::info!("Registering uploader: {}", uploader.provider());
        self.uploaders.insert(uploader.provider(), uploader);
    }
}

#[async_trait]
impl ExportDispatcher for MultiExport {
    async fn dispatch(&self, file: &Path, credentials: &CredentialSet) -> Vec<UploadOutcome> {
        let mut outcomes = Vec::new();

        for provider in Provider::ALL {
            let Some(scoped) = provider.credentials_from(credentials) else {
                tracing::debug!("Skipping {}: not configured", provider);
                continue;
            };

            let status = match self.uploaders.get(&provider) {
                Some(uploader) => match uploader.upload(file, &scoped).await {
                    Ok(()) => {
                        tracing::info!("Uploaded {:?} to {}", file, provider);
                        UploadStatus::Uploaded
                    }
                    Err(e) => {
                        tracing::warn!("Upload of {:?} to {} failed: {}", file, provider, e);
                        UploadStatus::Failed(e.to_string())
                    }
                },
                None => {
                    tracing::warn!("{} is configured but no uploader is available", provider);
                    UploadStatus::NoUploader
                }
            };

            outcomes.push(UploadOutcome { provider, status });
        }

        outcomes
    }
}

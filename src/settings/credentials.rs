//! Provider credentials
//!
//! A flat key-value document (JSON object of strings). The mutable
//! [`CredentialStore`] belongs to the configuration side; exports only ever
//! see an immutable [`CredentialSet`] snapshot.

use super::store::{write_atomic, SettingsError};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Persistent credential mapping
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl CredentialStore {
    /// Load the mapping at `path`; a missing file is an empty mapping
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };

        tracing::debug!("Loaded {} credential entries from {:?}", values.len(), path);

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set a value; empty values remove the key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if value.is_empty() {
            self.values.remove(&key);
        } else {
            self.values.insert(key, value);
        }
    }

    /// Remove a key, returning whether it was present
    pub fn unset(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    /// Rewrite the whole document
    pub fn save(&self) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(&self.values)?;
        write_atomic(&self.path, content.as_bytes())?;
        tracing::info!("Saved credentials to {:?}", self.path);
        Ok(())
    }

    /// Immutable copy of the current values
    pub fn snapshot(&self) -> CredentialSet {
        CredentialSet(Arc::new(self.values.clone()))
    }
}

/// Read-only snapshot of credential strings
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialSet(Arc<BTreeMap<String, String>>);

impl CredentialSet {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<BTreeMap<String, String>> for CredentialSet {
    fn from(values: BTreeMap<String, String>) -> Self {
        Self(Arc::new(values))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CredentialSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<BTreeMap<_, _>>()
            .into()
    }
}

// Values never reach logs
impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Replacement text for secret values on display
pub fn mask(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        "*".repeat(value.chars().count().min(8))
    }
}

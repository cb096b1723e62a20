use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::session::TokenStore;

/// Device-local state: the auth token and client settings.
#[derive(Debug, Clone)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub token_path: PathBuf,
    pub settings_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_notifications")]
    pub notifications_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notifications_enabled: default_notifications(),
        }
    }
}

fn default_notifications() -> bool {
    true
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|source| io_err(&data_dir, source))?;

        let token_path = data_dir.join("auth_token");
        let settings_path = data_dir.join("settings.toml");

        info!(
            data_dir = %data_dir.display(),
            token = %token_path.display(),
            settings = %settings_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            token_path,
            settings_path,
        })
    }

    pub fn token_store(&self) -> FileTokenStore {
        FileTokenStore {
            path: self.token_path.clone(),
        }
    }

    /// Stored settings, or the defaults when the file is missing or
    /// unreadable.
    #[tracing::instrument(skip(self))]
    pub fn load_settings(&self) -> Settings {
        match self.try_load_settings() {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!("no settings stored; using defaults");
                Settings::default()
            }
            Err(err) => {
                warn!(error = %err, "failed to load settings; using defaults");
                Settings::default()
            }
        }
    }

    fn try_load_settings(&self) -> Result<Option<Settings>, StoreError> {
        let Some(raw) = read_optional(&self.settings_path)? else {
            return Ok(None);
        };
        Ok(Some(toml::from_str(&raw)?))
    }

    #[tracing::instrument(skip(self))]
    pub fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        let text = toml::to_string(settings)?;
        write_atomic(&self.settings_path, text.as_bytes())?;
        info!(
            notifications_enabled = settings.notifications_enabled,
            "saved settings"
        );
        Ok(())
    }
}

/// [`TokenStore`] persisting the token in a single file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn get_token(&self) -> Result<Option<String>, StoreError> {
        let token = read_optional(&self.path)?
            .map(|raw| raw.trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(token)
    }

    fn set_token(&self, token: &str) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|source| io_err(dir, source))?;
        }
        write_atomic(&self.path, token.as_bytes())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_err(&self.path, source)),
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(io_err(path, source)),
    }
}

#[tracing::instrument(skip(path, bytes))]
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    debug!(file = %path.display(), len = bytes.len(), "writing atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir).map_err(|source| io_err(dir, source))?;
    temp.write_all(bytes)
        .and_then(|()| temp.flush())
        .map_err(|source| io_err(path, source))?;

    temp.persist(path).map_err(|source| StoreError::Persist {
        path: path.display().to_string(),
        source,
    })?;

    Ok(())
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn token_roundtrip_and_idempotent_clear() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        let tokens = store.token_store();

        assert_eq!(tokens.get_token().expect("read empty"), None);

        tokens.set_token("abc123").expect("store token");
        assert_eq!(
            tokens.get_token().expect("read token").as_deref(),
            Some("abc123")
        );

        tokens.clear().expect("clear");
        tokens.clear().expect("clear twice");
        assert_eq!(tokens.get_token().expect("read cleared"), None);
    }

    #[test]
    fn blank_token_file_counts_as_no_token() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        fs::write(&store.token_path, "  \n").expect("write blank token");
        assert_eq!(store.token_store().get_token().expect("read"), None);
    }

    #[test]
    fn settings_default_to_notifications_on() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        assert!(store.load_settings().notifications_enabled);

        store
            .save_settings(&Settings {
                notifications_enabled: false,
            })
            .expect("save settings");
        assert!(!store.load_settings().notifications_enabled);
    }

    #[test]
    fn corrupt_settings_fall_back_to_defaults() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        fs::write(&store.settings_path, "notifications_enabled = maybe").expect("write");
        assert_eq!(store.load_settings(), Settings::default());
    }
}

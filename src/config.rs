//! Engine configuration.
//!
//! Loaded from an optional TOML file with `REPOSYNC_`-prefixed environment
//! overrides layered on top. The session database defaults to the
//! platform data directory.

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the remote repository store.
    pub base_url: String,
    /// Bearer token for the store's session auth, if issued.
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            base_url: "http://localhost:8000".to_string(),
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Session database directory; platform data dir when unset.
    #[serde(default)]
    pub session_db: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the sled directory, falling back to the platform data dir.
    pub fn resolve_session_db(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.session_db {
            return Ok(path.clone());
        }
        let dirs = ProjectDirs::from("", "reposync", "reposync").ok_or_else(|| {
            ConfigError::Message("could not determine platform data directory".to_string())
        })?;
        Ok(dirs.data_dir().join("sessions"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Delay before a closed-editor agent edit opens the file, letting the
    /// transient tree/listing emphasis play out first.
    pub deferred_open_delay_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            deferred_open_delay_ms: 1500,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub editor: EditorConfig,
}

impl SyncConfig {
    /// Load from `path` (ignored when absent) plus environment overrides
    /// such as `REPOSYNC_REMOTE__BASE_URL`.
    pub fn load(path: Option<&Path>) -> Result<SyncConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder
            .add_source(Environment::with_prefix("REPOSYNC").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn deferred_open_delay(&self) -> Duration {
        Duration::from_millis(self.editor.deferred_open_delay_ms)
    }
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use ota_core::PolicyConfig;
use ota_ports::{ClientVersion, InvalidVersionCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode settings for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid client version: {0}")]
    InvalidVersion(#[from] InvalidVersionCode),
}

/// Every tunable of the engine, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct EngineConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub app_id: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub device_id: String,

    #[serde(default = "default_version_name")]
    pub current_version_name: String,

    #[serde(default = "default_version_code")]
    pub current_version_code: u32,

    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    #[serde(default)]
    pub force_update_on_wifi: bool,

    #[serde(default)]
    pub auto_download_on_wifi: bool,

    #[serde(default = "default_true")]
    pub auto_install_apk: bool,

    #[serde(default)]
    pub auto_install_on_wifi: bool,

    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,

    /// Host hint that the only link is unmetered, reported as Wi-Fi.
    #[serde(default)]
    pub assume_unmetered: bool,
}

fn default_api_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_version_name() -> String {
    "1.0.0".to_string()
}

fn default_version_code() -> u32 {
    1
}

fn default_check_interval() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_http_timeout() -> u64 {
    30
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            app_id: String::new(),
            api_key: None,
            device_id: String::new(),
            current_version_name: default_version_name(),
            current_version_code: default_version_code(),
            check_interval_secs: default_check_interval(),
            force_update_on_wifi: false,
            auto_download_on_wifi: false,
            auto_install_apk: true,
            auto_install_on_wifi: false,
            cache_dir: None,
            http_timeout_secs: default_http_timeout(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
            assume_unmetered: false,
        }
    }
}

impl EngineConfig {
    /// Missing file yields defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`] when the file exists but cannot be read
    /// and [`ConfigError::Parse`] when it is not valid settings JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write pretty-printed JSON, creating parent directories.
    ///
    /// # Errors
    /// Returns [`ConfigError::Write`] when the directory or file cannot be
    /// written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content).map_err(write_error)
    }

    /// # Errors
    /// Returns [`ConfigError::InvalidVersion`] when the version code is 0.
    pub fn client_version(&self) -> Result<ClientVersion, ConfigError> {
        Ok(ClientVersion::new(
            self.current_version_name.clone(),
            self.current_version_code,
        )?)
    }

    #[must_use]
    pub fn policy(&self) -> PolicyConfig {
        PolicyConfig {
            force_update_on_wifi: self.force_update_on_wifi,
            auto_download_on_wifi: self.auto_download_on_wifi,
            auto_install_apk: self.auto_install_apk,
            auto_install_on_wifi: self.auto_install_on_wifi,
        }
    }

    /// Never zero; a zero interval would spin the scheduler.
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR_NAME: &str = "ota-updater";
const UPDATE_DIR_NAME: &str = "OTA_Updates";
const BUNDLE_DIR_NAME: &str = "OTA_Bundles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AppPathsError {
    #[error("Could not determine home directory")]
    HomeDirUnavailable,
    #[error("Could not determine config directory")]
    ConfigDirUnavailable,
    #[error("Could not determine cache directory")]
    CacheDirUnavailable,
    #[error("Could not determine data directory")]
    DataDirUnavailable,
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Build application paths for the current platform.
    ///
    /// # Errors
    /// Returns an error when a required base directory (for example the user
    /// home/config/cache/data directory) cannot be determined.
    pub fn new() -> Result<Self, AppPathsError> {
        #[cfg(target_os = "macos")]
        {
            let home = dirs::home_dir().ok_or(AppPathsError::HomeDirUnavailable)?;
            Ok(Self {
                config_dir: home.join("Library/Application Support").join(APP_DIR_NAME),
                cache_dir: home.join("Library/Caches").join(APP_DIR_NAME),
                data_dir: home.join("Library/Application Support").join(APP_DIR_NAME),
            })
        }

        #[cfg(not(target_os = "macos"))]
        {
            Ok(Self {
                config_dir: dirs::config_dir()
                    .ok_or(AppPathsError::ConfigDirUnavailable)?
                    .join(APP_DIR_NAME),
                cache_dir: dirs::cache_dir()
                    .ok_or(AppPathsError::CacheDirUnavailable)?
                    .join(APP_DIR_NAME),
                data_dir: dirs::data_dir()
                    .ok_or(AppPathsError::DataDirUnavailable)?
                    .join(APP_DIR_NAME),
            })
        }
    }

    /// Paths rooted under a single directory, for hosts that manage their
    /// own storage.
    #[must_use]
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            config_dir: root.join("config"),
            cache_dir: root.join("cache"),
            data_dir: root.join("data"),
        }
    }

    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("ota-agent.log")
    }

    /// Directory that receives downloaded application binaries.
    #[must_use]
    pub fn update_dir(&self) -> PathBuf {
        update_dir_in(&self.cache_dir)
    }

    /// Directory that holds downloaded and active bundles.
    #[must_use]
    pub fn bundle_dir(&self) -> PathBuf {
        bundle_dir_in(&self.cache_dir)
    }

    /// Ensure all application directories exist on disk.
    ///
    /// # Errors
    /// Returns an error if any directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.cache_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

#[must_use]
pub fn update_dir_in(cache_dir: &Path) -> PathBuf {
    cache_dir.join(UPDATE_DIR_NAME)
}

#[must_use]
pub fn bundle_dir_in(cache_dir: &Path) -> PathBuf {
    cache_dir.join(BUNDLE_DIR_NAME)
}

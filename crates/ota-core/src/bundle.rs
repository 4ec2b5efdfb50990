use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info, warn};
use ota_ports::{BundleActivation, BundlePort, PortError};

pub const ACTIVE_BUNDLE_NAME: &str = "active.bundle";

/// Bundle store that stages bundles as files in the bundle cache directory.
///
/// Activation copies the downloaded bundle over `active.bundle`; the host's
/// bundle loader picks it up on the next launch.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsBundleStore;

#[must_use]
pub fn active_bundle_path(bundle_dir: &Path) -> PathBuf {
    bundle_dir.join(ACTIVE_BUNDLE_NAME)
}

fn bundle_dir_of(bundle: &Path) -> Result<&Path, PortError> {
    bundle.parent().ok_or_else(|| {
        PortError::platform(
            "bundle store",
            format!("{} has no parent directory", bundle.display()),
        )
    })
}

#[async_trait]
impl BundlePort for FsBundleStore {
    async fn apply(&self, bundle: &Path) -> Result<BundleActivation, PortError> {
        let active = active_bundle_path(bundle_dir_of(bundle)?);
        tokio::fs::copy(bundle, &active).await?;
        info!("Activated bundle {} as {}", bundle.display(), active.display());
        Ok(BundleActivation::RestartRequired)
    }

    async fn cleanup(&self, keep: &Path) -> Result<(), PortError> {
        let dir = bundle_dir_of(keep)?;
        let keep_name = keep.file_name();
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name == ACTIVE_BUNDLE_NAME || Some(name.as_os_str()) == keep_name {
                continue;
            }
            let path = entry.path();
            if !entry.file_type().await.is_ok_and(|kind| kind.is_file()) {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed superseded bundle {}", path.display()),
                Err(error) => warn!("Failed to remove old bundle {}: {error}", path.display()),
            }
        }
        Ok(())
    }
}

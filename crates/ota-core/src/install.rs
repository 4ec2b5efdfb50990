use std::path::Path;

use async_trait::async_trait;
use log::info;
use ota_ports::{InstallStrategy, PortError};

/// Hands the downloaded binary to the desktop's default handler for its file
/// type. Last resort in the install chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenPathInstaller;

impl OpenPathInstaller {
    pub const NAME: &'static str = "open-path";
}

#[async_trait]
impl InstallStrategy for OpenPathInstaller {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn install(&self, artifact: &Path) -> Result<(), PortError> {
        if !tokio::fs::try_exists(artifact).await? {
            return Err(PortError::rejected(
                Self::NAME,
                format!("{} does not exist", artifact.display()),
            ));
        }

        let path = artifact.to_path_buf();
        tokio::task::spawn_blocking(move || open::that_detached(&path))
            .await
            .map_err(|error| PortError::platform("open-path installer", error.to_string()))?
            .map_err(|error| PortError::rejected(Self::NAME, error.to_string()))?;

        info!("Opened {} with the system handler", artifact.display());
        Ok(())
    }
}

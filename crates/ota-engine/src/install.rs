use std::path::Path;

use log::{debug, info, warn};
use ota_ports::{InstallAttempt, InstallStrategies};

use crate::error::SessionError;

/// Try each configured strategy in order until one accepts `artifact`.
///
/// On success the returned attempts end with the successful one. When every
/// strategy fails the error carries one attempt per strategy tried.
pub async fn run_install_chain(
    strategies: &InstallStrategies,
    artifact: &Path,
) -> Result<Vec<InstallAttempt>, SessionError> {
    if strategies.is_empty() {
        return Err(SessionError::unavailable("install"));
    }

    let mut attempts = Vec::new();
    for strategy in strategies.ordered() {
        let name = strategy.name();
        if !strategy.is_supported() {
            debug!("Skipping install strategy {name}: not supported on this platform");
            continue;
        }

        match strategy.install(artifact).await {
            Ok(()) => {
                info!("Install handed off via {name}");
                attempts.push(InstallAttempt::succeeded(name));
                return Ok(attempts);
            }
            Err(error) => {
                warn!("Install strategy {name} failed: {error}");
                attempts.push(InstallAttempt::failed(name, error.to_string()));
            }
        }
    }

    Err(SessionError::Install { attempts })
}

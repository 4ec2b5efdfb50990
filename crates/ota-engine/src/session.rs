use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use ota_core::{InstallDecision, UpdateAction, classify_update, decide, decide_install};
use ota_ports::{
    CheckQuery, CheckResponse, DownloadProgress, InstallAttempt, InstallPrompt, TransferPort,
    UpdateManifest, UpdateStatus, UpdateType,
};
use tokio::sync::mpsc;

use crate::engine::EngineContext;
use crate::error::{IntegrityError, SessionError};
use crate::hooks::UpdateProgress;
use crate::install::run_install_chain;
use crate::layout::ArtifactKind;
use crate::state::{Completion, SessionOutcome, SessionState};

const PROGRESS_CHANNEL_CAPACITY: usize = 32;

/// Run one session unless another one holds the guard.
pub(crate) async fn run_guarded(context: &EngineContext) -> Option<SessionOutcome> {
    let Some(_guard) = context.try_begin() else {
        debug!("Update check skipped: a session is already running");
        return None;
    };
    Some(UpdateSession::new(context).run().await)
}

/// Check the artifact on disk: present, non-empty and at least the minimum
/// size for its kind.
pub async fn verify_artifact(
    transfer: &dyn TransferPort,
    artifact: &Path,
    kind: ArtifactKind,
) -> Result<u64, IntegrityError> {
    if !transfer
        .exists(artifact)
        .await
        .map_err(IntegrityError::Unreadable)?
    {
        return Err(IntegrityError::Missing {
            path: artifact.to_path_buf(),
        });
    }

    let size = transfer
        .stat(artifact)
        .await
        .map_err(IntegrityError::Unreadable)?
        .size;
    if size == 0 {
        return Err(IntegrityError::Empty);
    }
    let minimum = kind.min_size();
    if size < minimum {
        return Err(IntegrityError::Undersized { size, minimum });
    }
    Ok(size)
}

struct Target {
    manifest: UpdateManifest,
    update_type: UpdateType,
}

struct TransferPlan {
    url: String,
    artifact: PathBuf,
    kind: ArtifactKind,
}

struct UpdateSession<'a> {
    context: &'a EngineContext,
    target: Option<Target>,
}

impl<'a> UpdateSession<'a> {
    fn new(context: &'a EngineContext) -> Self {
        Self {
            context,
            target: None,
        }
    }

    async fn run(mut self) -> SessionOutcome {
        let result = self.drive().await;

        self.context.set_state(SessionState::Reporting);
        self.report_outcome(&result).await;

        let outcome = SessionOutcome::from(result);
        self.context.set_state(outcome.clone().into());
        self.notify_host(&outcome);
        outcome
    }

    async fn drive(&mut self) -> Result<Completion, SessionError> {
        let context = self.context;
        context.set_state(SessionState::Checking);

        if !context.ports.network.sample().await.connected {
            return Err(SessionError::NoConnectivity);
        }

        let query = CheckQuery {
            current: context.client.clone(),
            app_id: context.config.app_id.clone(),
            device_id: context.config.device_id.clone(),
        };
        let offered = context
            .ports
            .registry
            .check_for_update(&query)
            .await
            .and_then(CheckResponse::into_manifest)
            .map_err(SessionError::Registry)?;

        let Some(manifest) = offered else {
            info!("{} is up to date", context.client);
            return Ok(Completion::UpToDate);
        };

        let update_type = manifest
            .update_type
            .unwrap_or_else(|| classify_update(&context.client.name, &manifest.version_name));
        info!(
            "Update available: {} (code {}, {update_type})",
            manifest.version_name, manifest.version_code
        );
        context.hooks.on_update_available(&manifest);
        self.target = Some(Target {
            manifest: manifest.clone(),
            update_type,
        });

        context.set_state(SessionState::Deciding);
        let network = context.ports.network.sample().await;
        let action = decide(update_type, network, &context.policy);
        debug!("Policy for {update_type} update on {network:?}: {action:?}");

        let Some(plan) = self.plan(&manifest, action)? else {
            return Ok(Completion::NoAction);
        };
        let transfer = context
            .ports
            .transfer
            .clone()
            .ok_or_else(|| SessionError::unavailable("transfer"))?;
        prepare_target(transfer.as_ref(), &plan.artifact).await?;

        // Connectivity may have changed while the cache was prepared.
        let network = context.ports.network.sample().await;
        if !network.connected {
            return Err(SessionError::NoConnectivity);
        }
        let action = decide(update_type, network, &context.policy);
        if !action.starts_transfer() {
            info!(
                "Network changed before downloading {}; deferring",
                manifest.version_name
            );
            return Ok(Completion::NoAction);
        }

        context
            .reporter
            .report(
                UpdateStatus::Downloading,
                &context.client.name,
                &manifest.version_name,
                update_type,
                None,
            )
            .await;

        self.download(transfer.as_ref(), &plan, update_type).await?;

        context.set_state(SessionState::Verifying);
        let size = verify_artifact(transfer.as_ref(), &plan.artifact, plan.kind)
            .await
            .map_err(SessionError::Integrity)?;
        debug!("Verified {} ({size} bytes)", plan.artifact.display());

        context.set_state(SessionState::Applying);
        self.apply(action, &manifest, &plan.artifact).await
    }

    fn plan(
        &self,
        manifest: &UpdateManifest,
        action: UpdateAction,
    ) -> Result<Option<TransferPlan>, SessionError> {
        let layout = &self.context.layout;
        match action {
            UpdateAction::NoAction => {
                info!(
                    "Not downloading {} on the current network",
                    manifest.version_name
                );
                Ok(None)
            }
            UpdateAction::DownloadAndApplyBundle => {
                let Some(url) = &manifest.bundle_url else {
                    warn!(
                        "Minor update {} has no bundle URL; skipping",
                        manifest.version_name
                    );
                    return Ok(None);
                };
                if self.context.ports.bundle.is_none() {
                    return Err(SessionError::unavailable("bundle"));
                }
                Ok(Some(TransferPlan {
                    url: url.clone(),
                    artifact: layout.artifact_path(ArtifactKind::Bundle, &manifest.version_name),
                    kind: ArtifactKind::Bundle,
                }))
            }
            UpdateAction::ForceInstall | UpdateAction::DownloadThenDecideInstall => {
                Ok(Some(TransferPlan {
                    url: manifest.download_url.clone(),
                    artifact: layout.artifact_path(ArtifactKind::Binary, &manifest.version_name),
                    kind: ArtifactKind::Binary,
                }))
            }
        }
    }

    async fn download(
        &self,
        transfer: &dyn TransferPort,
        plan: &TransferPlan,
        update_type: UpdateType,
    ) -> Result<(), SessionError> {
        self.context
            .set_state(SessionState::Downloading(DownloadProgress {
                bytes_received: 0,
                total_bytes: None,
            }));
        info!("Downloading {} to {}", plan.url, plan.artifact.display());

        let (sender, mut receiver) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let download = transfer.download(&plan.url, &plan.artifact, sender);
        tokio::pin!(download);

        let result = loop {
            tokio::select! {
                result = &mut download => break result,
                Some(progress) = receiver.recv() => self.emit_progress(progress, update_type),
            }
        };
        while let Ok(progress) = receiver.try_recv() {
            self.emit_progress(progress, update_type);
        }

        let outcome = result.map_err(|error| SessionError::transfer(error.to_string()))?;
        if !outcome.is_success() {
            return Err(SessionError::transfer_status(outcome.status_code));
        }
        info!("Downloaded {} bytes", outcome.bytes_written);
        Ok(())
    }

    fn emit_progress(&self, progress: DownloadProgress, update_type: UpdateType) {
        self.context.record_progress(progress);
        self.context.hooks.on_update_progress(&UpdateProgress {
            progress: progress.percent(),
            bytes_written: progress.bytes_received,
            content_length: progress.total_bytes,
            update_type,
        });
    }

    async fn apply(
        &self,
        action: UpdateAction,
        manifest: &UpdateManifest,
        artifact: &Path,
    ) -> Result<Completion, SessionError> {
        let context = self.context;
        match action {
            UpdateAction::ForceInstall => {
                context.hooks.on_force_update(manifest);
                self.install(artifact).await
            }
            UpdateAction::DownloadThenDecideInstall => {
                let network = context.ports.network.sample().await;
                match decide_install(network, &context.policy) {
                    InstallDecision::Automatic => self.install(artifact).await,
                    InstallDecision::Prompt => {
                        info!("Asking the host to confirm install of {}", manifest.version_name);
                        context.hooks.on_install_prompt(&InstallPrompt {
                            manifest: manifest.clone(),
                            artifact: artifact.to_path_buf(),
                        });
                        Ok(Completion::AwaitingInstallPrompt)
                    }
                }
            }
            UpdateAction::DownloadAndApplyBundle => self.apply_bundle(artifact).await,
            UpdateAction::NoAction => Ok(Completion::NoAction),
        }
    }

    async fn install(&self, artifact: &Path) -> Result<Completion, SessionError> {
        let attempts = run_install_chain(&self.context.ports.install, artifact).await?;
        let strategy = attempts.last().map_or("unknown", |attempt| attempt.strategy);
        Ok(Completion::Installed { strategy })
    }

    async fn apply_bundle(&self, bundle: &Path) -> Result<Completion, SessionError> {
        let port = self
            .context
            .ports
            .bundle
            .clone()
            .ok_or_else(|| SessionError::unavailable("bundle"))?;

        let activation = port.apply(bundle).await.map_err(|error| SessionError::Install {
            attempts: vec![InstallAttempt::failed("bundle", error.to_string())],
        })?;
        info!("Bundle {} applied: {activation:?}", bundle.display());

        if let Err(error) = port.cleanup(bundle).await {
            warn!("Failed to clear superseded bundles: {error}");
        }
        Ok(Completion::BundleApplied(activation))
    }

    async fn report_outcome(&self, result: &Result<Completion, SessionError>) {
        let Some(target) = &self.target else {
            return;
        };
        let (status, error_message) = match result {
            Ok(Completion::UpToDate | Completion::NoAction) => return,
            Ok(_) => (UpdateStatus::Completed, None),
            Err(error) => (UpdateStatus::Failed, Some(error.to_string())),
        };

        self.context
            .reporter
            .report(
                status,
                &self.context.client.name,
                &target.manifest.version_name,
                target.update_type,
                error_message,
            )
            .await;
    }

    fn notify_host(&self, outcome: &SessionOutcome) {
        let hooks = &self.context.hooks;
        match outcome {
            SessionOutcome::Completed(completion) => {
                debug!("Session completed: {completion:?}");
                if completion.delivered_update()
                    && let Some(target) = &self.target
                {
                    hooks.on_update_complete(&target.manifest);
                }
            }
            SessionOutcome::Failed(SessionError::NoConnectivity) if self.target.is_none() => {
                info!("Skipping update check: no network connection");
            }
            SessionOutcome::Failed(failure) => {
                error!("Update session failed: {failure}");
                hooks.on_update_error(failure);
            }
        }
    }
}

/// Make sure the cache directory accepts writes and drop whatever a previous
/// attempt left at the target path.
async fn prepare_target(transfer: &dyn TransferPort, artifact: &Path) -> Result<(), SessionError> {
    let Some(dir) = artifact.parent() else {
        return Err(SessionError::transfer(format!(
            "{} has no parent directory",
            artifact.display()
        )));
    };
    transfer
        .ensure_writable(dir)
        .await
        .map_err(|error| SessionError::transfer(format!("cache directory unusable: {error}")))?;

    let stale = transfer
        .exists(artifact)
        .await
        .map_err(|error| SessionError::transfer(error.to_string()))?;
    if stale {
        debug!("Removing stale artifact {}", artifact.display());
        transfer.remove(artifact).await.map_err(|error| {
            SessionError::transfer(format!("stale artifact not removed: {error}"))
        })?;
    }
    Ok(())
}

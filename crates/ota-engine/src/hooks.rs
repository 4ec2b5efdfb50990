use crossbeam_channel::{Receiver, Sender};
use ota_ports::{InstallPrompt, UpdateManifest, UpdateType};

use crate::error::SessionError;
use crate::state::SessionState;

/// Payload of [`UpdateHooks::on_update_progress`]. `progress` is a
/// percentage and is `None` when the server sent no content length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateProgress {
    pub progress: Option<f64>,
    pub bytes_written: u64,
    pub content_length: Option<u64>,
    pub update_type: UpdateType,
}

/// Host callbacks. They run on the engine's task and should return quickly.
pub trait UpdateHooks: Send + Sync {
    fn on_update_available(&self, _manifest: &UpdateManifest) {}

    fn on_update_progress(&self, _progress: &UpdateProgress) {}

    /// The update was installed, applied, or handed to the install prompt.
    fn on_update_complete(&self, _manifest: &UpdateManifest) {}

    fn on_update_error(&self, _error: &SessionError) {}

    fn on_state_change(&self, _state: &SessionState) {}

    /// Fired right before a forced install starts.
    fn on_force_update(&self, _manifest: &UpdateManifest) {}

    fn on_install_prompt(&self, _prompt: &InstallPrompt) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl UpdateHooks for NoopHooks {}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    UpdateAvailable(UpdateManifest),
    Progress(UpdateProgress),
    UpdateComplete(UpdateManifest),
    UpdateError(SessionError),
    StateChanged(SessionState),
    ForceUpdate(UpdateManifest),
    InstallPrompt(InstallPrompt),
}

/// Forwards every hook as an [`EngineEvent`] so threads outside the runtime
/// can consume them.
#[derive(Debug, Clone)]
pub struct ChannelHooks {
    sender: Sender<EngineEvent>,
}

impl ChannelHooks {
    #[must_use]
    pub fn new() -> (Self, Receiver<EngineEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { sender }, receiver)
    }

    fn send(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }
}

impl UpdateHooks for ChannelHooks {
    fn on_update_available(&self, manifest: &UpdateManifest) {
        self.send(EngineEvent::UpdateAvailable(manifest.clone()));
    }

    fn on_update_progress(&self, progress: &UpdateProgress) {
        self.send(EngineEvent::Progress(*progress));
    }

    fn on_update_complete(&self, manifest: &UpdateManifest) {
        self.send(EngineEvent::UpdateComplete(manifest.clone()));
    }

    fn on_update_error(&self, error: &SessionError) {
        self.send(EngineEvent::UpdateError(error.clone()));
    }

    fn on_state_change(&self, state: &SessionState) {
        self.send(EngineEvent::StateChanged(state.clone()));
    }

    fn on_force_update(&self, manifest: &UpdateManifest) {
        self.send(EngineEvent::ForceUpdate(manifest.clone()));
    }

    fn on_install_prompt(&self, prompt: &InstallPrompt) {
        self.send(EngineEvent::InstallPrompt(prompt.clone()));
    }
}

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};
use ota_core::PolicyConfig;
use ota_ports::{CapabilityPorts, ClientVersion, DownloadProgress, InstallAttempt};

use crate::config::{ConfigError, EngineConfig};
use crate::error::SessionError;
use crate::hooks::UpdateHooks;
use crate::install::run_install_chain;
use crate::layout::ArtifactLayout;
use crate::reporter::StatusReporter;
use crate::scheduler::Scheduler;
use crate::session;
use crate::state::{SessionOutcome, SessionState};

/// Everything a session needs, shared between the engine handle, the
/// scheduler task and any session it spawns.
pub(crate) struct EngineContext {
    pub(crate) config: EngineConfig,
    pub(crate) client: ClientVersion,
    pub(crate) policy: PolicyConfig,
    pub(crate) ports: CapabilityPorts,
    pub(crate) layout: ArtifactLayout,
    pub(crate) hooks: Arc<dyn UpdateHooks>,
    pub(crate) reporter: StatusReporter,
    active: AtomicBool,
    state: Mutex<SessionState>,
}

/// Holds the single-session flag; dropping it releases the flag.
pub(crate) struct SessionGuard<'a> {
    active: &'a AtomicBool,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

impl EngineContext {
    pub(crate) fn try_begin(&self) -> Option<SessionGuard<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SessionGuard {
                active: &self.active,
            })
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        debug!("Session state: {}", state.name());
        {
            let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            current.clone_from(&state);
        }
        self.hooks.on_state_change(&state);
    }

    pub(crate) fn record_progress(&self, progress: DownloadProgress) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let SessionState::Downloading(latest) = &mut *current {
            *latest = progress;
        }
    }

    fn state(&self) -> SessionState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// The update orchestration engine: one instance per installed app.
pub struct Engine {
    context: Arc<EngineContext>,
    scheduler: Mutex<Option<Scheduler>>,
}

impl Engine {
    /// # Errors
    /// Returns an error when the configured version code is invalid.
    pub fn new(
        config: EngineConfig,
        ports: CapabilityPorts,
        layout: ArtifactLayout,
        hooks: Arc<dyn UpdateHooks>,
    ) -> Result<Self, ConfigError> {
        let client = config.client_version()?;
        let reporter = StatusReporter::new(ports.registry.clone(), config.device_id.clone());
        let policy = config.policy();

        Ok(Self {
            context: Arc::new(EngineContext {
                config,
                client,
                policy,
                ports,
                layout,
                hooks,
                reporter,
                active: AtomicBool::new(false),
                state: Mutex::new(SessionState::Idle),
            }),
            scheduler: Mutex::new(None),
        })
    }

    /// Begin network monitoring, run one check right away and arm the
    /// periodic timer. Must be called from within a Tokio runtime; returns
    /// `false` when already started or when no runtime is available.
    pub fn start(&self) -> bool {
        let mut scheduler = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner);
        if scheduler.is_some() {
            debug!("Engine already started");
            return false;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("Cannot start update engine outside a Tokio runtime");
            return false;
        };

        info!(
            "Starting update engine for {} (every {}s)",
            self.context.client,
            self.context.config.check_interval().as_secs()
        );
        *scheduler = Some(Scheduler::spawn(&runtime, self.context.clone()));
        true
    }

    /// Stop scheduling new sessions. A session already in flight keeps
    /// running to its terminal state.
    pub fn stop(&self) -> bool {
        let scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match scheduler {
            Some(scheduler) => {
                scheduler.stop();
                info!("Update engine stopped");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Run one session on the caller's task. Returns `None` without doing
    /// anything when another session is active.
    pub async fn manual_check(&self) -> Option<SessionOutcome> {
        session::run_guarded(&self.context).await
    }

    #[must_use]
    pub fn is_session_active(&self) -> bool {
        self.context.is_active()
    }

    /// Latest state of the current or most recent session.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.context.state()
    }

    /// Run the install fallback chain on an artifact that a previous session
    /// downloaded, for hosts that confirm an install prompt later.
    ///
    /// # Errors
    /// Returns [`SessionError::Install`] when every strategy fails.
    pub async fn install_artifact(
        &self,
        artifact: &Path,
    ) -> Result<Vec<InstallAttempt>, SessionError> {
        info!("Installing {} on host request", artifact.display());
        run_install_chain(&self.context.ports.install, artifact).await
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.context.config
    }

    #[must_use]
    pub fn client_version(&self) -> &ClientVersion {
        &self.context.client
    }

    #[must_use]
    pub fn layout(&self) -> &ArtifactLayout {
        &self.context.layout
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

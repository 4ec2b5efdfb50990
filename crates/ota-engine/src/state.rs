use ota_ports::{BundleActivation, DownloadProgress};

use crate::error::SessionError;

/// How a session that reached `Completed` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    UpToDate,
    /// An update exists but policy starts no transfer this cycle.
    NoAction,
    /// The install chain accepted the downloaded binary.
    Installed { strategy: &'static str },
    /// The binary is downloaded and the host was asked to confirm install.
    AwaitingInstallPrompt,
    BundleApplied(BundleActivation),
}

impl Completion {
    /// Whether an artifact was transferred and handed on this session.
    #[must_use]
    pub fn delivered_update(self) -> bool {
        matches!(
            self,
            Self::Installed { .. } | Self::AwaitingInstallPrompt | Self::BundleApplied(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed(Completion),
    Failed(SessionError),
}

impl SessionOutcome {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    #[must_use]
    pub fn error(&self) -> Option<&SessionError> {
        match self {
            Self::Failed(error) => Some(error),
            Self::Completed(_) => None,
        }
    }
}

impl From<Result<Completion, SessionError>> for SessionOutcome {
    fn from(result: Result<Completion, SessionError>) -> Self {
        match result {
            Ok(completion) => Self::Completed(completion),
            Err(error) => Self::Failed(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Checking,
    Deciding,
    Downloading(DownloadProgress),
    Verifying,
    Applying,
    Reporting,
    Completed(Completion),
    Failed(SessionError),
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Deciding => "deciding",
            Self::Downloading(_) => "downloading",
            Self::Verifying => "verifying",
            Self::Applying => "applying",
            Self::Reporting => "reporting",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
        }
    }
}

impl From<SessionOutcome> for SessionState {
    fn from(outcome: SessionOutcome) -> Self {
        match outcome {
            SessionOutcome::Completed(completion) => Self::Completed(completion),
            SessionOutcome::Failed(error) => Self::Failed(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(SessionState::Completed(Completion::UpToDate).is_terminal());
        assert!(SessionState::Failed(SessionError::NoConnectivity).is_terminal());
        assert!(!SessionState::Reporting.is_terminal());
        assert!(!SessionState::Idle.is_terminal());
    }

    #[test]
    fn delivered_update_excludes_idle_cycles() {
        assert!(!Completion::UpToDate.delivered_update());
        assert!(!Completion::NoAction.delivered_update());
        assert!(Completion::AwaitingInstallPrompt.delivered_update());
        assert!(Completion::BundleApplied(BundleActivation::RestartRequired).delivered_update());
    }
}

use std::path::PathBuf;

use ota_ports::{InstallAttempt, PortError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("artifact missing at {}", .path.display())]
    Missing { path: PathBuf },

    #[error("artifact is empty")]
    Empty,

    #[error("artifact is {size} bytes, below the {minimum} byte minimum")]
    Undersized { size: u64, minimum: u64 },

    #[error("artifact could not be inspected: {0}")]
    Unreadable(PortError),
}

/// Why a session ended in `Failed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No network connection")]
    NoConnectivity,

    #[error("Registry error: {0}")]
    Registry(PortError),

    #[error("Transfer failed: {details}")]
    Transfer {
        status_code: Option<u16>,
        details: String,
    },

    #[error("Integrity check failed: {0}")]
    Integrity(IntegrityError),

    #[error(
        "Install failed after {} attempt(s): {}",
        .attempts.len(),
        summarize_attempts(.attempts)
    )]
    Install { attempts: Vec<InstallAttempt> },

    #[error("Capability not available: {port}")]
    CapabilityUnavailable { port: &'static str },
}

impl SessionError {
    pub(crate) fn transfer(details: impl Into<String>) -> Self {
        Self::Transfer {
            status_code: None,
            details: details.into(),
        }
    }

    pub(crate) fn transfer_status(status_code: u16) -> Self {
        Self::Transfer {
            status_code: Some(status_code),
            details: format!("server answered HTTP {status_code}"),
        }
    }

    pub(crate) fn unavailable(port: &'static str) -> Self {
        Self::CapabilityUnavailable { port }
    }

    /// Attempts recorded by the install chain, empty for other failures.
    #[must_use]
    pub fn install_attempts(&self) -> &[InstallAttempt] {
        match self {
            Self::Install { attempts } => attempts,
            _ => &[],
        }
    }
}

fn summarize_attempts(attempts: &[InstallAttempt]) -> String {
    if attempts.is_empty() {
        return "no supported strategy".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_error_lists_every_attempt() {
        let error = SessionError::Install {
            attempts: vec![
                InstallAttempt::failed("direct", "denied"),
                InstallAttempt::failed("open-path", "no handler"),
            ],
        };

        assert_eq!(
            error.to_string(),
            "Install failed after 2 attempt(s): direct: denied; open-path: no handler"
        );
        assert_eq!(error.install_attempts().len(), 2);
    }

    #[test]
    fn transfer_status_names_the_code() {
        let error = SessionError::transfer_status(404);
        assert!(matches!(
            error,
            SessionError::Transfer {
                status_code: Some(404),
                ..
            }
        ));
        assert_eq!(error.to_string(), "Transfer failed: server answered HTTP 404");
        assert!(error.install_attempts().is_empty());
    }
}

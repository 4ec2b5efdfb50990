//! Client-side OTA update orchestration.
//!
//! An [`Engine`] owns the capability ports resolved by the host, runs at most
//! one update session at a time (check, decide, download, verify, apply,
//! report) and schedules sessions from a timer, from Wi-Fi transitions and
//! from manual requests.

mod config;
mod engine;
mod error;
mod hooks;
mod install;
mod layout;
mod reporter;
mod scheduler;
mod session;
mod state;

pub use config::{ConfigError, EngineConfig};
pub use engine::Engine;
pub use error::{IntegrityError, SessionError};
pub use hooks::{ChannelHooks, EngineEvent, NoopHooks, UpdateHooks, UpdateProgress};
pub use install::run_install_chain;
pub use layout::{ArtifactKind, ArtifactLayout, MIN_BINARY_BYTES};
pub use reporter::StatusReporter;
pub use session::verify_artifact;
pub use state::{Completion, SessionOutcome, SessionState};

//! Concrete update logic and default adapters for the OTA engine.
//!
//! Pure pieces (version comparison, decision policy, the registry-side
//! status log and release selection) live next to the adapters that back the
//! capability traits on a desktop host: HTTP registry and transfer, a
//! filesystem bundle store, a watch-fed network monitor and an installer
//! that hands binaries to the system handler.

mod bundle;
mod install;
mod memory_registry;
mod network;
pub mod policy;
mod registry;
mod status_log;
mod transfer;
pub mod version;

pub use bundle::{ACTIVE_BUNDLE_NAME, FsBundleStore, active_bundle_path};
pub use install::OpenPathInstaller;
pub use memory_registry::{MemoryRegistry, ReleaseRecord, select_latest};
pub use network::NetworkMonitor;
pub use policy::{InstallDecision, PolicyConfig, UpdateAction, decide, decide_install};
pub use registry::HttpRegistry;
pub use status_log::{RECENT_ENTRY_WINDOW, RecordOutcome, StatusLog};
pub use transfer::HttpTransfer;
pub use version::{ParsedVersion, classify_update, compare_versions, parse_version_name};

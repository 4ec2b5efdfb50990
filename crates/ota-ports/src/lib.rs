//! Data model and capability interfaces for the OTA update engine.
//!
//! The engine never touches the network, the filesystem or the platform
//! installer directly; it talks to the traits defined here, which hosts
//! implement (or take from `ota-core`).

mod error;
mod traits;
mod types;

pub use error::{HttpStage, PortError};
pub use traits::{
    BundlePort, CapabilityPorts, InstallStrategies, InstallStrategy, NetworkPort, RegistryPort,
    TransferPort,
};
pub use types::{
    BundleActivation, CheckQuery, CheckResponse, ClientVersion, DownloadOutcome,
    DownloadProgress, FileStat, InstallAttempt, InstallPrompt, InvalidVersionCode, NetworkState,
    ReportAck, StatusLogEntry, StatusReport, UpdateManifest, UpdateStatus, UpdateType,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::PortError;

/// Version of the currently running application.
///
/// `code` is the authoritative ordering key; `name` is only for display and
/// for the registry's log entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientVersion {
    pub name: String,
    pub code: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("version code must be at least 1, got {0}")]
pub struct InvalidVersionCode(pub u32);

impl ClientVersion {
    /// # Errors
    /// Returns an error when `code` is zero.
    pub fn new(name: impl Into<String>, code: u32) -> Result<Self, InvalidVersionCode> {
        if code == 0 {
            return Err(InvalidVersionCode(code));
        }
        Ok(Self {
            name: name.into(),
            code,
        })
    }
}

impl fmt::Display for ClientVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    /// New application binary.
    Major,
    /// Bundle-only replacement.
    Minor,
}

impl UpdateType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry description of an available update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManifest {
    pub version_name: String,
    pub version_code: u32,
    /// Absent when the registry leaves classification to the client.
    #[serde(default)]
    pub update_type: Option<UpdateType>,
    #[serde(default)]
    pub release_notes: Option<String>,
    pub download_url: String,
    #[serde(default)]
    pub bundle_url: Option<String>,
    #[serde(default)]
    pub apk_size: Option<u64>,
    #[serde(default)]
    pub bundle_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub update_available: bool,
    #[serde(default)]
    pub update: Option<UpdateManifest>,
    #[serde(default)]
    pub message: Option<String>,
}

impl CheckResponse {
    #[must_use]
    pub fn up_to_date() -> Self {
        Self {
            update_available: false,
            update: None,
            message: Some("App is up to date".to_string()),
        }
    }

    #[must_use]
    pub fn available(manifest: UpdateManifest) -> Self {
        Self {
            update_available: true,
            update: Some(manifest),
            message: None,
        }
    }

    /// The offered manifest, or `None` when the registry reports no update.
    ///
    /// # Errors
    /// Returns [`PortError::Http`] when the registry flags an update but
    /// leaves the manifest out.
    pub fn into_manifest(self) -> Result<Option<UpdateManifest>, PortError> {
        match (self.update_available, self.update) {
            (false, _) => Ok(None),
            (true, Some(manifest)) => Ok(Some(manifest)),
            (true, None) => Err(PortError::http_parse(
                "update check",
                "updateAvailable without update",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckQuery {
    pub current: ClientVersion,
    pub app_id: String,
    pub device_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    pub connected: bool,
    pub is_wifi: bool,
}

impl NetworkState {
    #[must_use]
    pub fn offline() -> Self {
        Self {
            connected: false,
            is_wifi: false,
        }
    }

    #[must_use]
    pub fn wifi() -> Self {
        Self {
            connected: true,
            is_wifi: true,
        }
    }

    #[must_use]
    pub fn cellular() -> Self {
        Self {
            connected: true,
            is_wifi: false,
        }
    }

    /// Wi-Fi only counts while the link is actually up.
    #[must_use]
    pub fn on_wifi(self) -> bool {
        self.connected && self.is_wifi
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl UpdateStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether a log entry in this status still belongs to an attempt that is
    /// in flight and can absorb further reports.
    #[must_use]
    pub fn is_resumable(self) -> bool {
        matches!(self, Self::Pending | Self::Downloading)
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a status report sent to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: UpdateStatus,
    pub from_version: String,
    pub to_version: String,
    pub update_type: UpdateType,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportAck {
    #[serde(default)]
    pub message: String,
}

/// Registry-side log row. The client consumes these but never owns them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLogEntry {
    pub id: u64,
    pub app_id: String,
    pub from_version: String,
    pub to_version: String,
    pub update_type: UpdateType,
    pub device_id: String,
    pub status: UpdateStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub bytes_received: u64,
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    /// Percentage in `0.0..=100.0`, or `None` when the total is unknown.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> Option<f64> {
        match self.total_bytes {
            Some(total) if total > 0 => {
                Some((self.bytes_received as f64 / total as f64 * 100.0).min(100.0))
            }
            _ => None,
        }
    }
}

/// Final result of a transfer. A non-2xx `status_code` is a failed transfer
/// even though the port call itself succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub status_code: u16,
    pub bytes_written: u64,
}

impl DownloadOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleActivation {
    /// The new bundle is already running.
    Loaded,
    /// The bundle is staged and becomes active on the next launch.
    RestartRequired,
}

/// One try of one install strategy, kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallAttempt {
    pub strategy: &'static str,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl InstallAttempt {
    #[must_use]
    pub fn succeeded(strategy: &'static str) -> Self {
        Self {
            strategy,
            succeeded: true,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(strategy: &'static str, error: impl Into<String>) -> Self {
        Self {
            strategy,
            succeeded: false,
            error: Some(error.into()),
        }
    }
}

impl fmt::Display for InstallAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => write!(f, "{}: {error}", self.strategy),
            None if self.succeeded => write!(f, "{}: ok", self.strategy),
            None => write!(f, "{}: failed", self.strategy),
        }
    }
}

/// What the host needs to show an install prompt for a downloaded binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPrompt {
    pub manifest: UpdateManifest,
    pub artifact: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpStage;

    #[test]
    fn client_version_rejects_zero_code() {
        assert_eq!(
            ClientVersion::new("1.0.0", 0),
            Err(InvalidVersionCode(0))
        );
        let version = ClientVersion::new("1.0.0", 3).expect("code 3 is valid");
        assert_eq!(version.to_string(), "1.0.0 (3)");
    }

    #[test]
    fn manifest_deserializes_registry_payload() {
        let payload = serde_json::json!({
            "updateAvailable": true,
            "update": {
                "versionName": "2.0.0",
                "versionCode": 9,
                "updateType": "major",
                "releaseNotes": null,
                "downloadUrl": "https://registry.example/api/apks/9/download",
                "bundleUrl": null,
                "apkSize": 4096,
                "bundleSize": null
            }
        });

        let response: CheckResponse =
            serde_json::from_value(payload).expect("registry payload should deserialize");
        let manifest = response
            .into_manifest()
            .expect("flagged response should be well formed")
            .expect("manifest should be present");

        assert_eq!(manifest.version_code, 9);
        assert_eq!(manifest.update_type, Some(UpdateType::Major));
        assert_eq!(manifest.release_notes, None);
        assert_eq!(manifest.apk_size, Some(4096));
    }

    #[test]
    fn up_to_date_response_has_no_manifest() {
        let payload = serde_json::json!({
            "updateAvailable": false,
            "message": "App is up to date"
        });
        let response: CheckResponse =
            serde_json::from_value(payload).expect("up-to-date payload should deserialize");

        assert_eq!(response, CheckResponse::up_to_date());
        assert_eq!(response.into_manifest(), Ok(None));
    }

    #[test]
    fn flagged_response_without_manifest_is_malformed() {
        let payload = serde_json::json!({ "updateAvailable": true });
        let response: CheckResponse =
            serde_json::from_value(payload).expect("payload should deserialize");

        assert!(matches!(
            response.into_manifest(),
            Err(PortError::Http {
                stage: HttpStage::ResponseParse,
                ..
            })
        ));
    }

    #[test]
    fn status_report_serializes_camel_case() {
        let report = StatusReport {
            status: UpdateStatus::Downloading,
            from_version: "1.0.0".to_string(),
            to_version: "1.1.0".to_string(),
            update_type: UpdateType::Minor,
            error_message: None,
        };

        let value = serde_json::to_value(&report).expect("report should serialize");
        assert_eq!(value["status"], "downloading");
        assert_eq!(value["fromVersion"], "1.0.0");
        assert_eq!(value["toVersion"], "1.1.0");
        assert_eq!(value["updateType"], "minor");
    }

    #[test]
    fn progress_percent_requires_known_total() {
        let known = DownloadProgress {
            bytes_received: 512,
            total_bytes: Some(2048),
        };
        let unknown = DownloadProgress {
            bytes_received: 512,
            total_bytes: None,
        };
        let zero = DownloadProgress {
            bytes_received: 0,
            total_bytes: Some(0),
        };

        assert_eq!(known.percent(), Some(25.0));
        assert_eq!(unknown.percent(), None);
        assert_eq!(zero.percent(), None);
    }

    #[test]
    fn wifi_requires_connection() {
        let stale = NetworkState {
            connected: false,
            is_wifi: true,
        };
        assert!(!stale.on_wifi());
        assert!(NetworkState::wifi().on_wifi());
        assert!(!NetworkState::cellular().on_wifi());
    }

    #[test]
    fn resumable_statuses_are_non_terminal() {
        assert!(UpdateStatus::Pending.is_resumable());
        assert!(UpdateStatus::Downloading.is_resumable());
        assert!(!UpdateStatus::Completed.is_resumable());
        assert!(!UpdateStatus::Failed.is_resumable());
    }
}

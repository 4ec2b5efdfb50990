use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use log::debug;
use ota_ports::{
    CheckQuery, CheckResponse, PortError, RegistryPort, ReportAck, StatusReport, UpdateManifest,
    UpdateStatus, UpdateType,
};

use crate::status_log::{RecordOutcome, StatusLog};
use crate::version::classify_update;

/// One uploaded build known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub version_name: String,
    pub version_code: u32,
    pub update_type: Option<UpdateType>,
    pub release_notes: Option<String>,
    pub download_url: String,
    pub bundle_url: Option<String>,
    pub apk_size: Option<u64>,
    pub bundle_size: Option<u64>,
}

impl ReleaseRecord {
    pub fn new(
        version_name: impl Into<String>,
        version_code: u32,
        download_url: impl Into<String>,
    ) -> Self {
        Self {
            version_name: version_name.into(),
            version_code,
            update_type: None,
            release_notes: None,
            download_url: download_url.into(),
            bundle_url: None,
            apk_size: None,
            bundle_size: None,
        }
    }

    #[must_use]
    pub fn with_update_type(mut self, update_type: UpdateType) -> Self {
        self.update_type = Some(update_type);
        self
    }

    #[must_use]
    pub fn with_bundle_url(mut self, bundle_url: impl Into<String>) -> Self {
        self.bundle_url = Some(bundle_url.into());
        self
    }

    #[must_use]
    pub fn with_release_notes(mut self, notes: impl Into<String>) -> Self {
        self.release_notes = Some(notes.into());
        self
    }

    fn to_manifest(&self, current_version_name: &str) -> UpdateManifest {
        UpdateManifest {
            version_name: self.version_name.clone(),
            version_code: self.version_code,
            update_type: Some(
                self.update_type
                    .unwrap_or_else(|| classify_update(current_version_name, &self.version_name)),
            ),
            release_notes: self.release_notes.clone(),
            download_url: self.download_url.clone(),
            bundle_url: self.bundle_url.clone(),
            apk_size: self.apk_size,
            bundle_size: self.bundle_size,
        }
    }
}

/// Among releases newer than `current_code`, the one with the highest code.
/// Clients always jump straight to the latest build.
#[must_use]
pub fn select_latest(releases: &[ReleaseRecord], current_code: u32) -> Option<&ReleaseRecord> {
    releases
        .iter()
        .filter(|release| release.version_code > current_code)
        .fold(None, |latest: Option<&ReleaseRecord>, release| match latest {
            Some(latest) if latest.version_code >= release.version_code => Some(latest),
            _ => Some(release),
        })
}

/// In-process registry for a single app: release list plus status log.
pub struct MemoryRegistry {
    app_id: String,
    releases: RwLock<Vec<ReleaseRecord>>,
    log: StatusLog,
}

impl MemoryRegistry {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            releases: RwLock::new(Vec::new()),
            log: StatusLog::new(),
        }
    }

    pub fn publish(&self, release: ReleaseRecord) {
        self.releases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(release);
    }

    #[must_use]
    pub fn status_log(&self) -> &StatusLog {
        &self.log
    }

    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Synchronous form of [`RegistryPort::report_status`].
    pub fn record_report(&self, device_id: &str, report: &StatusReport) -> RecordOutcome {
        self.log.record(&self.app_id, device_id, report)
    }
}

#[async_trait]
impl RegistryPort for MemoryRegistry {
    async fn check_for_update(&self, query: &CheckQuery) -> Result<CheckResponse, PortError> {
        if query.app_id != self.app_id {
            return Err(PortError::HttpStatus {
                operation: "update check",
                status: 401,
                body_snippet: format!(": unknown app id {}", query.app_id),
            });
        }

        let manifest = {
            let releases = self.releases.read().unwrap_or_else(PoisonError::into_inner);
            select_latest(&releases, query.current.code)
                .map(|release| release.to_manifest(&query.current.name))
        };

        let Some(manifest) = manifest else {
            debug!("No release newer than {} for {}", query.current, self.app_id);
            return Ok(CheckResponse::up_to_date());
        };

        if !query.device_id.is_empty() {
            self.log.insert(
                &self.app_id,
                &query.device_id,
                &query.current.name,
                &manifest.version_name,
                manifest.update_type.unwrap_or(UpdateType::Minor),
                UpdateStatus::Pending,
            );
        }

        Ok(CheckResponse::available(manifest))
    }

    async fn report_status(
        &self,
        device_id: &str,
        report: &StatusReport,
    ) -> Result<ReportAck, PortError> {
        let outcome = self.record_report(device_id, report);
        debug!("Recorded {} report for {}: {outcome:?}", report.status, report.to_version);
        Ok(ReportAck {
            message: "Update status reported successfully".to_string(),
        })
    }
}

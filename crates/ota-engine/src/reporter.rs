use std::sync::Arc;

use log::{debug, warn};
use ota_ports::{RegistryPort, StatusReport, UpdateStatus, UpdateType};

/// Client side of status reporting. Reports are best effort: a failed call
/// is logged and dropped, never surfaced to the session.
#[derive(Clone)]
pub struct StatusReporter {
    registry: Arc<dyn RegistryPort>,
    device_id: String,
}

impl StatusReporter {
    pub fn new(registry: Arc<dyn RegistryPort>, device_id: impl Into<String>) -> Self {
        Self {
            registry,
            device_id: device_id.into(),
        }
    }

    /// Returns whether the registry acknowledged the report.
    pub async fn report(
        &self,
        status: UpdateStatus,
        from_version: &str,
        to_version: &str,
        update_type: UpdateType,
        error_message: Option<String>,
    ) -> bool {
        let report = StatusReport {
            status,
            from_version: from_version.to_string(),
            to_version: to_version.to_string(),
            update_type,
            error_message,
        };

        match self.registry.report_status(&self.device_id, &report).await {
            Ok(ack) => {
                debug!("Reported {status} for {to_version}: {}", ack.message);
                true
            }
            Err(error) => {
                warn!("Failed to report {status} for {to_version}: {error}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use ota_core::MemoryRegistry;
    use ota_ports::{CheckQuery, CheckResponse, PortError, ReportAck};

    use super::*;

    struct DownRegistry;

    #[async_trait]
    impl RegistryPort for DownRegistry {
        async fn check_for_update(&self, _query: &CheckQuery) -> Result<CheckResponse, PortError> {
            Err(PortError::http_request("update check", "connection refused"))
        }

        async fn report_status(
            &self,
            _device_id: &str,
            _report: &StatusReport,
        ) -> Result<ReportAck, PortError> {
            Err(PortError::http_request("status report", "connection refused"))
        }
    }

    #[tokio::test]
    async fn registry_failure_is_swallowed() {
        let reporter = StatusReporter::new(Arc::new(DownRegistry), "device-1");

        let acknowledged = reporter
            .report(UpdateStatus::Failed, "1.0.0", "2.0.0", UpdateType::Major, None)
            .await;

        assert!(!acknowledged);
    }

    #[tokio::test]
    async fn repeated_downloading_reports_touch_one_entry() {
        let registry = Arc::new(MemoryRegistry::new("app"));
        registry.status_log().insert(
            "app",
            "device-1",
            "1.0.0",
            "2.0.0",
            UpdateType::Major,
            UpdateStatus::Pending,
        );
        let reporter = StatusReporter::new(registry.clone(), "device-1");

        for _ in 0..2 {
            assert!(
                reporter
                    .report(UpdateStatus::Downloading, "1.0.0", "2.0.0", UpdateType::Major, None)
                    .await
            );
        }

        let entries = registry.status_log().recent("app", 10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, UpdateStatus::Downloading);
    }
}

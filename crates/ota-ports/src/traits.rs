use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::error::PortError;
use crate::types::{
    BundleActivation, CheckQuery, CheckResponse, DownloadOutcome, DownloadProgress, FileStat,
    NetworkState, ReportAck, StatusReport,
};

#[async_trait]
pub trait NetworkPort: Send + Sync {
    /// Fresh connectivity snapshot. Never cached by the caller across a
    /// suspension point.
    async fn sample(&self) -> NetworkState;

    /// Change notifications, or `None` when the platform cannot deliver them.
    fn subscribe(&self) -> Option<watch::Receiver<NetworkState>>;
}

#[async_trait]
pub trait TransferPort: Send + Sync {
    /// Download `url` into `dest`, reporting progress through `progress`.
    ///
    /// A transfer that reached the server but returned a non-success status
    /// is reported through [`DownloadOutcome::status_code`], not as an error.
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: mpsc::Sender<DownloadProgress>,
    ) -> Result<DownloadOutcome, PortError>;

    async fn exists(&self, path: &Path) -> Result<bool, PortError>;

    async fn remove(&self, path: &Path) -> Result<(), PortError>;

    async fn stat(&self, path: &Path) -> Result<FileStat, PortError>;

    /// Create `dir` if needed and prove it accepts writes.
    async fn ensure_writable(&self, dir: &Path) -> Result<(), PortError>;
}

#[async_trait]
pub trait InstallStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Static platform check, for strategies that only exist on some OS
    /// versions.
    fn is_supported(&self) -> bool {
        true
    }

    async fn install(&self, artifact: &Path) -> Result<(), PortError>;
}

#[async_trait]
pub trait BundlePort: Send + Sync {
    /// Make `bundle` the active bundle.
    async fn apply(&self, bundle: &Path) -> Result<BundleActivation, PortError>;

    /// Delete cached bundles next to `keep`, except `keep` itself and the
    /// active bundle.
    async fn cleanup(&self, keep: &Path) -> Result<(), PortError>;
}

#[async_trait]
pub trait RegistryPort: Send + Sync {
    async fn check_for_update(&self, query: &CheckQuery) -> Result<CheckResponse, PortError>;

    async fn report_status(
        &self,
        device_id: &str,
        report: &StatusReport,
    ) -> Result<ReportAck, PortError>;
}

/// Install strategies in their fixed fallback order. Empty slots are
/// skipped.
#[derive(Clone, Default)]
pub struct InstallStrategies {
    pub direct: Option<Arc<dyn InstallStrategy>>,
    pub content_uri: Option<Arc<dyn InstallStrategy>>,
    pub alternate: Option<Arc<dyn InstallStrategy>>,
    pub open_path: Option<Arc<dyn InstallStrategy>>,
}

impl InstallStrategies {
    #[must_use]
    pub fn with_direct(mut self, strategy: Arc<dyn InstallStrategy>) -> Self {
        self.direct = Some(strategy);
        self
    }

    #[must_use]
    pub fn with_content_uri(mut self, strategy: Arc<dyn InstallStrategy>) -> Self {
        self.content_uri = Some(strategy);
        self
    }

    #[must_use]
    pub fn with_alternate(mut self, strategy: Arc<dyn InstallStrategy>) -> Self {
        self.alternate = Some(strategy);
        self
    }

    #[must_use]
    pub fn with_open_path(mut self, strategy: Arc<dyn InstallStrategy>) -> Self {
        self.open_path = Some(strategy);
        self
    }

    pub fn ordered(&self) -> impl Iterator<Item = &Arc<dyn InstallStrategy>> {
        [
            &self.direct,
            &self.content_uri,
            &self.alternate,
            &self.open_path,
        ]
        .into_iter()
        .flatten()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered().next().is_none()
    }
}

/// Platform capabilities resolved once when the engine is built.
#[derive(Clone)]
pub struct CapabilityPorts {
    pub network: Arc<dyn NetworkPort>,
    pub registry: Arc<dyn RegistryPort>,
    pub transfer: Option<Arc<dyn TransferPort>>,
    pub bundle: Option<Arc<dyn BundlePort>>,
    pub install: InstallStrategies,
}

impl CapabilityPorts {
    pub fn new(network: Arc<dyn NetworkPort>, registry: Arc<dyn RegistryPort>) -> Self {
        Self {
            network,
            registry,
            transfer: None,
            bundle: None,
            install: InstallStrategies::default(),
        }
    }

    #[must_use]
    pub fn with_transfer(mut self, transfer: Arc<dyn TransferPort>) -> Self {
        self.transfer = Some(transfer);
        self
    }

    #[must_use]
    pub fn with_bundle(mut self, bundle: Arc<dyn BundlePort>) -> Self {
        self.bundle = Some(bundle);
        self
    }

    #[must_use]
    pub fn with_install(mut self, install: InstallStrategies) -> Self {
        self.install = install;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;

    struct NamedStrategy(&'static str);

    #[async_trait]
    impl InstallStrategy for NamedStrategy {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn install(&self, _artifact: &Path) -> Result<(), PortError> {
            Ok(())
        }
    }

    fn named(name: &'static str) -> Arc<dyn InstallStrategy> {
        Arc::new(NamedStrategy(name))
    }

    #[test]
    fn ordered_follows_fixed_slot_order_regardless_of_registration_order() {
        let strategies = InstallStrategies::default()
            .with_open_path(named("open-path"))
            .with_alternate(named("alternate"))
            .with_direct(named("direct"))
            .with_content_uri(named("content-uri"));

        let names: Vec<_> = strategies.ordered().map(|s| s.name()).collect();

        assert_eq!(names, ["direct", "content-uri", "alternate", "open-path"]);
    }

    #[test]
    fn ordered_skips_empty_slots() {
        let strategies = InstallStrategies::default()
            .with_direct(named("direct"))
            .with_open_path(named("open-path"));

        let names: Vec<_> = strategies.ordered().map(|s| s.name()).collect();

        assert_eq!(names, ["direct", "open-path"]);
        assert!(!strategies.is_empty());
        assert!(InstallStrategies::default().is_empty());
    }

    #[tokio::test]
    async fn is_supported_defaults_to_true() {
        let strategy = NamedStrategy("direct");
        assert!(strategy.is_supported());
        assert!(strategy.install(Path::new("/tmp/app.apk")).await.is_ok());
    }
}

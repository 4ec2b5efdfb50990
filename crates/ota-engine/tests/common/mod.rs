#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crossbeam_channel::Receiver;
use ota_engine::{ArtifactLayout, ChannelHooks, Engine, EngineConfig, EngineEvent, SessionState};
use ota_ports::{
    BundleActivation, BundlePort, CapabilityPorts, CheckQuery, CheckResponse, DownloadOutcome,
    DownloadProgress, FileStat, InstallStrategies, InstallStrategy, NetworkPort, NetworkState,
    PortError, RegistryPort, ReportAck, StatusReport, TransferPort, UpdateManifest, UpdateType,
};
use tokio::sync::{Notify, mpsc, watch};

pub fn manifest(version_name: &str, version_code: u32, update_type: UpdateType) -> UpdateManifest {
    UpdateManifest {
        version_name: version_name.to_string(),
        version_code,
        update_type: Some(update_type),
        release_notes: Some("Bug fixes".to_string()),
        download_url: format!("https://registry.example/api/apks/{version_code}/download"),
        bundle_url: None,
        apk_size: None,
        bundle_size: None,
    }
}

pub fn config() -> EngineConfig {
    EngineConfig {
        app_id: "demo-app".to_string(),
        device_id: "device-1".to_string(),
        current_version_name: "1.0.0".to_string(),
        current_version_code: 4,
        ..EngineConfig::default()
    }
}

/// Hands out queued states first, then keeps returning the fallback.
pub struct ScriptedNetwork {
    queued: Mutex<VecDeque<NetworkState>>,
    fallback: NetworkState,
    samples: AtomicUsize,
}

impl ScriptedNetwork {
    pub fn steady(state: NetworkState) -> Arc<Self> {
        Self::scripted(Vec::new(), state)
    }

    pub fn scripted(queued: Vec<NetworkState>, fallback: NetworkState) -> Arc<Self> {
        Arc::new(Self {
            queued: Mutex::new(queued.into()),
            fallback,
            samples: AtomicUsize::new(0),
        })
    }

    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkPort for ScriptedNetwork {
    async fn sample(&self) -> NetworkState {
        self.samples.fetch_add(1, Ordering::SeqCst);
        self.queued
            .lock()
            .expect("network script lock")
            .pop_front()
            .unwrap_or(self.fallback)
    }

    fn subscribe(&self) -> Option<watch::Receiver<NetworkState>> {
        None
    }
}

pub struct CheckGate {
    pub entered: Notify,
    pub release: Notify,
}

pub struct FakeRegistry {
    response: Result<CheckResponse, PortError>,
    gate: Option<Arc<CheckGate>>,
    checks: AtomicUsize,
    reports: Mutex<Vec<StatusReport>>,
}

impl FakeRegistry {
    pub fn up_to_date() -> Arc<Self> {
        Self::answering(Ok(CheckResponse::up_to_date()))
    }

    pub fn offering(manifest: UpdateManifest) -> Arc<Self> {
        Self::answering(Ok(CheckResponse::available(manifest)))
    }

    pub fn answering(response: Result<CheckResponse, PortError>) -> Arc<Self> {
        Arc::new(Self {
            response,
            gate: None,
            checks: AtomicUsize::new(0),
            reports: Mutex::new(Vec::new()),
        })
    }

    /// Checks block until `gate.release` is notified.
    pub fn gated(response: CheckResponse) -> (Arc<Self>, Arc<CheckGate>) {
        let gate = Arc::new(CheckGate {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let registry = Arc::new(Self {
            response: Ok(response),
            gate: Some(gate.clone()),
            checks: AtomicUsize::new(0),
            reports: Mutex::new(Vec::new()),
        });
        (registry, gate)
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn reports(&self) -> Vec<StatusReport> {
        self.reports.lock().expect("reports lock").clone()
    }
}

#[async_trait]
impl RegistryPort for FakeRegistry {
    async fn check_for_update(&self, _query: &CheckQuery) -> Result<CheckResponse, PortError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.response.clone()
    }

    async fn report_status(
        &self,
        _device_id: &str,
        report: &StatusReport,
    ) -> Result<ReportAck, PortError> {
        self.reports
            .lock()
            .expect("reports lock")
            .push(report.clone());
        Ok(ReportAck {
            message: "ok".to_string(),
        })
    }
}

/// Writes `body_len` bytes in four chunks, or answers `status_code`
/// without writing when it is not a success code.
pub struct FakeTransfer {
    status_code: u16,
    body_len: usize,
    announce_length: bool,
    downloads: Mutex<Vec<String>>,
}

impl FakeTransfer {
    pub fn serving(body_len: usize) -> Arc<Self> {
        Arc::new(Self {
            status_code: 200,
            body_len,
            announce_length: true,
            downloads: Mutex::new(Vec::new()),
        })
    }

    pub fn serving_unsized(body_len: usize) -> Arc<Self> {
        Arc::new(Self {
            status_code: 200,
            body_len,
            announce_length: false,
            downloads: Mutex::new(Vec::new()),
        })
    }

    pub fn answering(status_code: u16) -> Arc<Self> {
        Arc::new(Self {
            status_code,
            body_len: 0,
            announce_length: false,
            downloads: Mutex::new(Vec::new()),
        })
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().expect("downloads lock").clone()
    }
}

#[async_trait]
impl TransferPort for FakeTransfer {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: mpsc::Sender<DownloadProgress>,
    ) -> Result<DownloadOutcome, PortError> {
        self.downloads
            .lock()
            .expect("downloads lock")
            .push(url.to_string());
        if !(200..300).contains(&self.status_code) {
            return Ok(DownloadOutcome {
                status_code: self.status_code,
                bytes_written: 0,
            });
        }

        let total_bytes = self.announce_length.then_some(self.body_len as u64);
        let chunk = self.body_len.div_ceil(4).max(1);
        let mut body = Vec::with_capacity(self.body_len);
        while body.len() < self.body_len {
            let next = chunk.min(self.body_len - body.len());
            body.extend(std::iter::repeat_n(0xA5_u8, next));
            let _ = progress
                .send(DownloadProgress {
                    bytes_received: body.len() as u64,
                    total_bytes,
                })
                .await;
        }
        tokio::fs::write(dest, &body).await?;

        Ok(DownloadOutcome {
            status_code: self.status_code,
            bytes_written: body.len() as u64,
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool, PortError> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn remove(&self, path: &Path) -> Result<(), PortError> {
        Ok(tokio::fs::remove_file(path).await?)
    }

    async fn stat(&self, path: &Path) -> Result<FileStat, PortError> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(FileStat {
            size: metadata.len(),
        })
    }

    async fn ensure_writable(&self, dir: &Path) -> Result<(), PortError> {
        Ok(tokio::fs::create_dir_all(dir).await?)
    }
}

pub struct FakeInstaller {
    name: &'static str,
    succeed: bool,
    calls: AtomicUsize,
}

impl FakeInstaller {
    pub fn succeeding(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            succeed: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            succeed: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstallStrategy for FakeInstaller {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn install(&self, _artifact: &Path) -> Result<(), PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.succeed {
            Ok(())
        } else {
            Err(PortError::rejected(self.name, "installer refused the package"))
        }
    }
}

#[derive(Default)]
pub struct FakeBundle {
    fail: bool,
    applied: Mutex<Vec<PathBuf>>,
    cleaned: Mutex<Vec<PathBuf>>,
}

impl FakeBundle {
    pub fn working() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn applied(&self) -> Vec<PathBuf> {
        self.applied.lock().expect("applied lock").clone()
    }

    pub fn cleaned(&self) -> Vec<PathBuf> {
        self.cleaned.lock().expect("cleaned lock").clone()
    }
}

#[async_trait]
impl BundlePort for FakeBundle {
    async fn apply(&self, bundle: &Path) -> Result<BundleActivation, PortError> {
        if self.fail {
            return Err(PortError::platform("bundle loader", "bundle rejected"));
        }
        self.applied
            .lock()
            .expect("applied lock")
            .push(bundle.to_path_buf());
        Ok(BundleActivation::RestartRequired)
    }

    async fn cleanup(&self, keep: &Path) -> Result<(), PortError> {
        self.cleaned
            .lock()
            .expect("cleaned lock")
            .push(keep.to_path_buf());
        Ok(())
    }
}

pub fn installers(installers: &[Arc<FakeInstaller>]) -> InstallStrategies {
    let mut strategies = InstallStrategies::default();
    let mut slots = installers.iter().cloned();
    if let Some(direct) = slots.next() {
        strategies = strategies.with_direct(direct);
    }
    if let Some(content_uri) = slots.next() {
        strategies = strategies.with_content_uri(content_uri);
    }
    if let Some(alternate) = slots.next() {
        strategies = strategies.with_alternate(alternate);
    }
    if let Some(open_path) = slots.next() {
        strategies = strategies.with_open_path(open_path);
    }
    strategies
}

pub struct Harness {
    pub engine: Engine,
    pub events: Receiver<EngineEvent>,
    pub layout: ArtifactLayout,
    _cache: tempfile::TempDir,
}

impl Harness {
    pub fn new(config: EngineConfig, ports: CapabilityPorts) -> Self {
        let cache = tempfile::tempdir().expect("cache dir should be created");
        let layout = ArtifactLayout::in_cache_dir(cache.path());
        let (hooks, events) = ChannelHooks::new();
        let engine = Engine::new(config, ports, layout.clone(), Arc::new(hooks))
            .expect("engine should build");
        Self {
            engine,
            events,
            layout,
            _cache: cache,
        }
    }

    pub fn drain(&self) -> Vec<EngineEvent> {
        self.events.try_iter().collect()
    }
}

pub fn states(events: &[EngineEvent]) -> Vec<SessionState> {
    events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::StateChanged(state) => Some(state.clone()),
            _ => None,
        })
        .collect()
}

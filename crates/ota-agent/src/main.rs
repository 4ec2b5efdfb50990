mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use log::{debug, error, info, warn};
use ota_core::{FsBundleStore, HttpRegistry, HttpTransfer, NetworkMonitor, OpenPathInstaller};
use ota_engine::{
    ArtifactLayout, ChannelHooks, ConfigError, Engine, EngineConfig, EngineEvent, SessionOutcome,
    SessionState,
};
use ota_platform::{AppPaths, AppPathsError};
use ota_ports::{CapabilityPorts, InstallStrategies, NetworkState};
use thiserror::Error;

use crate::logging::LogSettings;

#[derive(Error, Debug)]
enum AgentError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Paths(#[from] AppPathsError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    once: bool,
    settings: Option<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, AgentError> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--once" => parsed.once = true,
            "--settings" => {
                let path = args
                    .next()
                    .ok_or_else(|| AgentError::Usage("--settings needs a path".to_string()))?;
                parsed.settings = Some(PathBuf::from(path));
            }
            other => {
                return Err(AgentError::Usage(format!(
                    "unknown argument {other}; usage: ota-agent [--once] [--settings <path>]"
                )));
            }
        }
    }
    Ok(parsed)
}

fn initial_network(config: &EngineConfig) -> NetworkState {
    if config.assume_unmetered {
        NetworkState::wifi()
    } else {
        NetworkState::cellular()
    }
}

fn build_engine(
    config: EngineConfig,
    paths: &AppPaths,
) -> Result<(Engine, Receiver<EngineEvent>), AgentError> {
    let client = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .user_agent(concat!("ota-agent/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let registry = HttpRegistry::new(client.clone(), config.api_url.clone(), config.app_id.clone())
        .with_api_key(config.api_key.clone());
    let network = Arc::new(NetworkMonitor::new(initial_network(&config)));
    let layout = config
        .cache_dir
        .as_deref()
        .map_or_else(|| ArtifactLayout::from_paths(paths), ArtifactLayout::in_cache_dir);

    let ports = CapabilityPorts::new(network, Arc::new(registry))
        .with_transfer(Arc::new(HttpTransfer::new(client)))
        .with_bundle(Arc::new(FsBundleStore))
        .with_install(InstallStrategies::default().with_open_path(Arc::new(OpenPathInstaller)));

    let (hooks, events) = ChannelHooks::new();
    let engine = Engine::new(config, ports, layout, Arc::new(hooks))?;
    Ok((engine, events))
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::UpdateAvailable(manifest) => info!(
            "Update {} (code {}) available",
            manifest.version_name, manifest.version_code
        ),
        EngineEvent::Progress(progress) => match progress.progress {
            Some(percent) => info!("Downloaded {percent:.0}% ({} bytes)", progress.bytes_written),
            None => info!("Downloaded {} bytes", progress.bytes_written),
        },
        EngineEvent::UpdateComplete(manifest) => {
            info!("Update {} delivered", manifest.version_name);
        }
        EngineEvent::UpdateError(failure) => error!("Update failed: {failure}"),
        EngineEvent::StateChanged(SessionState::Failed(_) | SessionState::Completed(_)) => {}
        EngineEvent::StateChanged(state) => debug!("Session {}", state.name()),
        EngineEvent::ForceUpdate(manifest) => {
            warn!("Installing required update {}", manifest.version_name);
        }
        EngineEvent::InstallPrompt(prompt) => info!(
            "Update {} is ready to install from {}",
            prompt.manifest.version_name,
            prompt.artifact.display()
        ),
    }
}

async fn run(args: Args) -> Result<bool, AgentError> {
    let paths = AppPaths::new()?;
    let settings_path = args.settings.unwrap_or_else(|| paths.settings_file());
    let config = EngineConfig::load(&settings_path)?;

    if let Err(error) = paths.ensure_dirs() {
        eprintln!("Failed to create application directories: {error}");
    }
    logging::init_logging(&LogSettings::from_config(
        &config,
        paths.log_file(),
        args.once,
    ));
    info!("Loaded settings from {}", settings_path.display());

    let (engine, events) = build_engine(config, &paths)?;
    std::thread::spawn(move || {
        for event in events {
            log_event(&event);
        }
    });

    let succeeded = if args.once {
        match engine.manual_check().await {
            Some(SessionOutcome::Completed(completion)) => {
                info!("Update check finished: {completion:?}");
                true
            }
            Some(SessionOutcome::Failed(failure)) => {
                error!("Update check failed: {failure}");
                false
            }
            None => false,
        }
    } else {
        engine.start();
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for shutdown signal: {error}");
        }
        engine.stop();
        true
    };

    Ok(succeeded)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("ota-agent: {error}");
            error!("{error}");
            ExitCode::FAILURE
        }
    }
}

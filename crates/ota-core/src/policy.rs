use ota_ports::{NetworkState, UpdateType};

/// Tunables that drive [`decide`] and [`decide_install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct PolicyConfig {
    pub force_update_on_wifi: bool,
    pub auto_download_on_wifi: bool,
    pub auto_install_apk: bool,
    pub auto_install_on_wifi: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            force_update_on_wifi: false,
            auto_download_on_wifi: false,
            auto_install_apk: true,
            auto_install_on_wifi: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    /// Download the binary and install it without asking.
    ForceInstall,
    /// Download the binary; settle install-vs-prompt once it is on disk.
    DownloadThenDecideInstall,
    /// Download the bundle and apply it silently.
    DownloadAndApplyBundle,
    /// Surface the manifest, transfer nothing this cycle.
    NoAction,
}

impl UpdateAction {
    #[must_use]
    pub fn starts_transfer(self) -> bool {
        !matches!(self, Self::NoAction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallDecision {
    Automatic,
    Prompt,
}

/// First matching rule wins.
#[must_use]
pub fn decide(
    update_type: UpdateType,
    network: NetworkState,
    config: &PolicyConfig,
) -> UpdateAction {
    match update_type {
        UpdateType::Major if config.force_update_on_wifi && network.on_wifi() => {
            UpdateAction::ForceInstall
        }
        UpdateType::Major => UpdateAction::DownloadThenDecideInstall,
        UpdateType::Minor if network.on_wifi() && config.auto_download_on_wifi => {
            UpdateAction::DownloadAndApplyBundle
        }
        UpdateType::Minor => UpdateAction::NoAction,
    }
}

/// Install step for [`UpdateAction::DownloadThenDecideInstall`], evaluated
/// against the network state sampled after the download finished.
#[must_use]
pub fn decide_install(network: NetworkState, config: &PolicyConfig) -> InstallDecision {
    if !config.auto_install_apk {
        return InstallDecision::Prompt;
    }
    if config.auto_install_on_wifi && !network.on_wifi() {
        return InstallDecision::Prompt;
    }
    InstallDecision::Automatic
}

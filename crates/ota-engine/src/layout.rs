use std::path::{Path, PathBuf};

use ota_platform::{AppPaths, bundle_dir_in, update_dir_in};

/// Smallest binary accepted by the integrity check.
pub const MIN_BINARY_BYTES: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Binary,
    Bundle,
}

impl ArtifactKind {
    #[must_use]
    pub fn min_size(self) -> u64 {
        match self {
            Self::Binary => MIN_BINARY_BYTES,
            Self::Bundle => 1,
        }
    }
}

/// Where downloaded artifacts land in the engine-owned cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub update_dir: PathBuf,
    pub bundle_dir: PathBuf,
}

impl ArtifactLayout {
    pub fn new(update_dir: impl Into<PathBuf>, bundle_dir: impl Into<PathBuf>) -> Self {
        Self {
            update_dir: update_dir.into(),
            bundle_dir: bundle_dir.into(),
        }
    }

    #[must_use]
    pub fn in_cache_dir(cache_dir: &Path) -> Self {
        Self::new(update_dir_in(cache_dir), bundle_dir_in(cache_dir))
    }

    #[must_use]
    pub fn from_paths(paths: &AppPaths) -> Self {
        Self::new(paths.update_dir(), paths.bundle_dir())
    }

    #[must_use]
    pub fn artifact_path(&self, kind: ArtifactKind, version_name: &str) -> PathBuf {
        let version = file_safe(version_name);
        match kind {
            ArtifactKind::Binary => self.update_dir.join(format!("app-update-{version}.apk")),
            ArtifactKind::Bundle => self.bundle_dir.join(format!("bundle-{version}.bundle")),
        }
    }
}

// Version names come from the registry and end up in file names.
fn file_safe(version_name: &str) -> String {
    version_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_follow_version() {
        let layout = ArtifactLayout::in_cache_dir(Path::new("/cache"));

        assert_eq!(
            layout.artifact_path(ArtifactKind::Binary, "2.0.0"),
            Path::new("/cache/OTA_Updates/app-update-2.0.0.apk")
        );
        assert_eq!(
            layout.artifact_path(ArtifactKind::Bundle, "1.1.0"),
            Path::new("/cache/OTA_Bundles/bundle-1.1.0.bundle")
        );
    }

    #[test]
    fn separators_in_version_names_stay_inside_cache() {
        let layout = ArtifactLayout::new("/updates", "/bundles");

        assert_eq!(
            layout.artifact_path(ArtifactKind::Binary, "../../etc/2.0"),
            Path::new("/updates/app-update-.._.._etc_2.0.apk")
        );
    }

    #[test]
    fn binaries_need_a_kibibyte() {
        assert_eq!(ArtifactKind::Binary.min_size(), 1024);
        assert_eq!(ArtifactKind::Bundle.min_size(), 1);
    }
}

use std::cmp::Ordering;

use ota_ports::UpdateType;
use semver::Version;

/// Numeric core of a version name. Always present, even for garbage input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ParsedVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ParsedVersion {
    #[must_use]
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

fn strip_prefix(version_name: &str) -> &str {
    let trimmed = version_name.trim();
    trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed)
}

fn parse_semver(version_name: &str) -> Option<Version> {
    Version::parse(strip_prefix(version_name)).ok()
}

/// Parse a version name into `(major, minor, patch)`.
///
/// Strict semver is tried first. Anything else is split on `.` and each of
/// the first three segments is read as an integer, with missing or
/// non-numeric segments becoming 0.
#[must_use]
pub fn parse_version_name(version_name: &str) -> ParsedVersion {
    if let Some(parsed) = parse_semver(version_name) {
        return ParsedVersion::new(parsed.major, parsed.minor, parsed.patch);
    }

    let mut parts = strip_prefix(version_name)
        .split('.')
        .map(|part| part.trim().parse::<u64>().unwrap_or(0));

    ParsedVersion::new(
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

/// Compare two version names.
///
/// Uses full semver precedence when both sides are valid semver, otherwise
/// falls back to numeric `(major, minor, patch)` ordering.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_semver(a), parse_semver(b)) {
        (Some(a), Some(b)) => a.cmp_precedence(&b),
        _ => parse_version_name(a).cmp(&parse_version_name(b)),
    }
}

/// Classify the upgrade from `current` to `candidate`.
///
/// Only a bump of the major component is a major update; minor and patch
/// differences of any size, equal versions and downgrades are all minor.
#[must_use]
pub fn classify_update(current: &str, candidate: &str) -> UpdateType {
    if parse_version_name(candidate).major > parse_version_name(current).major {
        UpdateType::Major
    } else {
        UpdateType::Minor
    }
}

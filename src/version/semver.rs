//! Relaxed semantic versions as published by NuGet registries
//!
//! Grammar: `major[.minor[.patch[.build]]][-prerelease][+buildmetadata]`.
//! Minor, patch and build are optional and default to 0, and every numeric
//! segment may carry leading zeros. Ordering only looks at the four numeric
//! segments; prerelease and build metadata never make a version newer.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::version::error::VersionError;

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<major>\d+)(?:\.(?P<minor>\d+))?(?:\.(?P<patch>\d+))?(?:\.(?P<build>\d+))?(?:-(?P<prerelease>[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?(?:\+(?P<metadata>[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?$",
    )
    .expect("version pattern is a valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NugetVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub build: u64,
    pub prerelease: Option<String>,
    pub metadata: Option<String>,
}

impl NugetVersion {
    /// True when neither a prerelease nor a build metadata segment is present
    pub fn is_full_release(&self) -> bool {
        self.prerelease.is_none() && self.metadata.is_none()
    }

    fn numeric(&self) -> [u64; 4] {
        [self.major, self.minor, self.patch, self.build]
    }
}

impl FromStr for NugetVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VersionError::Invalid(s.to_string());
        let captures = VERSION_PATTERN.captures(s).ok_or_else(invalid)?;

        let segment = |name: &str| -> Result<u64, VersionError> {
            match captures.name(name) {
                Some(m) => m.as_str().parse().map_err(|_| invalid()),
                None => Ok(0),
            }
        };

        Ok(Self {
            major: segment("major")?,
            minor: segment("minor")?,
            patch: segment("patch")?,
            build: segment("build")?,
            prerelease: captures.name("prerelease").map(|m| m.as_str().to_string()),
            metadata: captures.name("metadata").map(|m| m.as_str().to_string()),
        })
    }
}

/// Releases between two versions, per segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionDiff {
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
}

pub fn parse_version(version: &str) -> Result<NugetVersion, VersionError> {
    version.parse()
}

pub fn is_full_release(version: &str) -> Result<bool, VersionError> {
    Ok(parse_version(version)?.is_full_release())
}

/// Whether `candidate` is newer than `version`.
///
/// Compares major, minor, patch and build in turn. Equal numeric segments
/// are never newer, whatever their prerelease tags say.
pub fn is_newer(version: &str, candidate: &str) -> Result<bool, VersionError> {
    let version = parse_version(version)?;
    let candidate = parse_version(candidate)?;

    Ok(candidate.numeric() > version.numeric())
}

/// How far `version` is behind `candidate`.
///
/// Only the most significant differing segment is reported: a major gap
/// zeroes minor and patch, a minor gap zeroes patch. A negative patch gap is
/// reported as 0.
pub fn count_behind(version: &str, candidate: &str) -> Result<VersionDiff, VersionError> {
    let version = parse_version(version)?;
    let candidate = parse_version(candidate)?;
    let delta = |current: u64, other: u64| {
        (i128::from(other) - i128::from(current)).clamp(i64::MIN.into(), i64::MAX.into()) as i64
    };

    let mut diff = VersionDiff {
        major: delta(version.major, candidate.major),
        ..VersionDiff::default()
    };
    if diff.major == 0 {
        diff.minor = delta(version.minor, candidate.minor);
        if diff.minor == 0 {
            diff.patch = delta(version.patch, candidate.patch).max(0);
        }
    }

    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", 1, 0, 0, 0)]
    #[case("1.2", 1, 2, 0, 0)]
    #[case("1.2.3", 1, 2, 3, 0)]
    #[case("3.3.105.24", 3, 3, 105, 24)]
    #[case("01.002.0003", 1, 2, 3, 0)]
    #[case("13.0.2-beta1", 13, 0, 2, 0)]
    fn parse_version_reads_numeric_segments(
        #[case] input: &str,
        #[case] major: u64,
        #[case] minor: u64,
        #[case] patch: u64,
        #[case] build: u64,
    ) {
        let version = parse_version(input).unwrap();
        assert_eq!(
            (version.major, version.minor, version.patch, version.build),
            (major, minor, patch, build)
        );
    }

    #[test]
    fn parse_version_keeps_prerelease_and_metadata() {
        let version = parse_version("1.0.0-rc.1+sha.5114f85").unwrap();

        assert_eq!(version.prerelease.as_deref(), Some("rc.1"));
        assert_eq!(version.metadata.as_deref(), Some("sha.5114f85"));
    }

    #[rstest]
    #[case("")]
    #[case("v1.0.0")]
    #[case("1.")]
    #[case("1.2.3.4.5")]
    #[case("1.0.0-")]
    #[case("$(PackageVersion)")]
    #[case("[1.0,2.0)")]
    #[case("99999999999999999999999")]
    fn parse_version_rejects_invalid_input(#[case] input: &str) {
        assert_eq!(
            parse_version(input),
            Err(VersionError::Invalid(input.to_string()))
        );
    }

    #[rstest]
    #[case("1.0.0", true)]
    #[case("1.0", true)]
    #[case("1.0.0.1", true)]
    #[case("1.0.0-beta", false)]
    #[case("1.0.0+build.7", false)]
    #[case("1.0.0-beta+build.7", false)]
    #[case("13.0.2-beta1", false)]
    fn is_full_release_returns_expected(#[case] version: &str, #[case] expected: bool) {
        assert_eq!(is_full_release(version), Ok(expected));
    }

    #[rstest]
    #[case("1.2.3", "1.2.3", false)]
    #[case("1.0.0-beta", "1.0.0-beta", false)]
    #[case("1.2", "1.2.0", false)]
    #[case("1.2.0", "1.2", false)]
    #[case("1.2.3", "1.3.1", true)]
    #[case("1.3.1", "1.2.3", false)]
    #[case("1.2.3", "2.0.0", true)]
    #[case("2.0.0", "1.9.9", false)]
    #[case("1.2.3", "1.2.4", true)]
    #[case("1.2.3.4", "1.2.3.5", true)]
    #[case("1.2.3.5", "1.2.3.4", false)]
    #[case("3.3.105.24", "3.3.105.999-beta", true)]
    #[case("1.0.0", "1.0.0-beta", false)]
    #[case("1.0.0-beta", "1.0.0", false)]
    #[case("1.01", "1.1", false)]
    fn is_newer_returns_expected(
        #[case] version: &str,
        #[case] candidate: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(is_newer(version, candidate), Ok(expected));
    }

    #[test]
    fn is_newer_rejects_invalid_versions() {
        assert!(is_newer("1.0.0", "latest").is_err());
        assert!(is_newer("*", "1.0.0").is_err());
    }

    #[rstest]
    #[case("1.2.3", "2.0.0", (1, 0, 0))]
    #[case("2.1.1", "2.1.1", (0, 0, 0))]
    #[case("1.1.1", "1.1.009", (0, 0, 8))]
    #[case("1.2.3", "1.5.0", (0, 3, 0))]
    #[case("1.2.9", "1.2.3", (0, 0, 0))]
    #[case("12.0.1", "13.0.1", (1, 0, 0))]
    #[case("3.0.0", "2.5.0", (-1, 0, 0))]
    #[case("1.0", "1.0.0.7", (0, 0, 0))]
    #[case("1.0.0", "9223372036854775808.0.0", (i64::MAX, 0, 0))]
    #[case("18446744073709551615.0.0", "0.0.0", (i64::MIN, 0, 0))]
    #[case("1.0.0", "1.18446744073709551615.0", (0, i64::MAX, 0))]
    fn count_behind_returns_expected(
        #[case] version: &str,
        #[case] candidate: &str,
        #[case] expected: (i64, i64, i64),
    ) {
        let diff = count_behind(version, candidate).unwrap();
        assert_eq!((diff.major, diff.minor, diff.patch), expected);
    }
}

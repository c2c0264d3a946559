//! Version parsing and comparison
//!
//! - [`semver`]: relaxed four-segment versions, "is newer" and "count behind"
//! - [`error`]: error for strings outside the version grammar

pub mod error;
pub mod semver;

pub use error::VersionError;
pub use semver::{NugetVersion, VersionDiff, count_behind, is_full_release, is_newer};

//! Common types for package containers

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;

use crate::parser::error::ParseError;

/// Kind of file that declares NuGet package references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// SDK-style project file (`*.csproj`) with `<PackageReference>` items
    ProjectFile,
    /// Legacy `packages.config` with `<package>` elements
    PackagesConfig,
}

impl ContainerKind {
    /// Returns the string representation of the container kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::ProjectFile => "csproj",
            ContainerKind::PackagesConfig => "packages.config",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry facts about a referenced package, filled in by resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDetails {
    /// Publish date of the referenced version
    pub version_date: Option<NaiveDate>,
    /// Newest version without prerelease or build metadata
    pub latest_release: Option<String>,
    pub latest_release_date: Option<NaiveDate>,
    /// Newest version of any kind
    pub latest_version: Option<String>,
    pub latest_version_date: Option<NaiveDate>,
    pub major_releases_behind: i64,
    pub minor_releases_behind: i64,
    pub patch_releases_behind: i64,
    /// Versions known to the registry, counted from the page summaries
    pub available_version_count: u64,
    /// Registration index URL the details were read from
    pub source: Option<String>,
    /// Human-facing package page, when the registry advertises one
    pub details_url: Option<String>,
}

/// A NuGet package reference found in a container
///
/// Identity (equality and hashing) is the `(name, version, target_framework)`
/// triple; resolved details never take part in it.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub version: Option<String>,
    /// Only present in `packages.config` entries
    pub target_framework: Option<String>,
    pub details: PackageDetails,
}

impl Package {
    pub fn new(
        name: impl Into<String>,
        version: Option<String>,
        target_framework: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            target_framework,
            details: PackageDetails::default(),
        }
    }

    fn identity(&self) -> (&str, Option<&str>, Option<&str>) {
        (
            &self.name,
            self.version.as_deref(),
            self.target_framework.as_deref(),
        )
    }

    /// Fill a registry's details template (`{id}`, `{version}`) for this package.
    ///
    /// The id is lowercased. Returns `None` when the package has no version.
    pub fn details_url_from(&self, template: &str) -> Option<String> {
        let version = self.version.as_deref()?;
        Some(
            template
                .replace("{id}", &self.name.to_lowercase())
                .replace("{version}", version),
        )
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Package {}

impl Hash for Package {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            write!(f, " {}", version)?;
        }
        if let Some(framework) = &self.target_framework {
            write!(f, " ({})", framework)?;
        }
        Ok(())
    }
}

/// A fetched file that declares package references
#[derive(Debug, Clone)]
pub struct PackageContainer {
    pub kind: ContainerKind,
    /// File name, e.g. `App.csproj`
    pub name: String,
    /// Repository name without the owner
    pub repo: String,
    /// Path of the file inside the repository
    pub path: String,
    /// Packages in document order
    pub packages: Vec<Package>,
}

impl PackageContainer {
    /// Parse `contents` as `kind` and build the container
    pub fn parse(
        kind: ContainerKind,
        name: impl Into<String>,
        repo: impl Into<String>,
        path: impl Into<String>,
        contents: &str,
    ) -> Result<Self, ParseError> {
        let packages = crate::parser::parse_packages(kind, contents)?;
        Ok(Self {
            kind,
            name: name.into(),
            repo: repo.into(),
            path: path.into(),
            packages,
        })
    }
}

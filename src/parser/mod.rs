//! Parser layer
//! - types.rs: Common types (Package, PackageContainer, ContainerKind)
//! - xml.rs: owned element tree over quick-xml
//! - csproj.rs: SDK-style project file parser
//! - packages_config.rs: packages.config parser
//! - nuget_config.rs: nuget.config package source parser

pub mod csproj;
pub mod error;
pub mod nuget_config;
pub mod packages_config;
pub mod types;
pub mod xml;

pub use error::ParseError;
pub use nuget_config::PackageSource;
pub use types::{ContainerKind, Package, PackageContainer, PackageDetails};

/// Extract the package references declared in a container file
pub fn parse_packages(kind: ContainerKind, content: &str) -> Result<Vec<Package>, ParseError> {
    match kind {
        ContainerKind::ProjectFile => csproj::parse(content),
        ContainerKind::PackagesConfig => packages_config::parse(content),
    }
}

//! Registry trait and the multi-server NuGet implementation

use std::sync::Arc;

use indexmap::IndexMap;
#[cfg(test)]
use mockall::automock;
use tracing::{info, warn};

use crate::http::HttpClient;
use crate::nuget::error::NugetError;
use crate::nuget::registrations::RegistrationIndex;
use crate::nuget::server::NugetServer;
use crate::parser::types::{Package, PackageDetails};
use crate::version::count_behind;

/// Trait for resolving package details from a registry
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// Resolves registry facts for a declared package
    ///
    /// # Returns
    /// * `Ok(Some(PackageDetails))` - Details from the first server that knows the package
    /// * `Ok(None)` - No configured server has the package
    /// * `Err(NugetError)` - A lookup failed
    async fn fetch_package_details(
        &self,
        package: &Package,
    ) -> Result<Option<PackageDetails>, NugetError>;
}

/// Queries NuGet servers in priority order
#[derive(Debug)]
pub struct Nuget {
    servers: Vec<NugetServer>,
}

impl Nuget {
    /// Initialize the default server first, then every discovered endpoint.
    ///
    /// `endpoints` maps service index URLs to display names. The default
    /// server failing is an error; a discovered endpoint failing is logged
    /// and skipped.
    pub async fn create(
        http: Arc<HttpClient>,
        default_index_url: &str,
        endpoints: &IndexMap<String, String>,
    ) -> Result<Self, NugetError> {
        let default = NugetServer::create(Arc::clone(&http), default_index_url).await?;
        info!("Initialized NuGet server API @ {}", default.index_url());
        let mut servers = vec![default];

        for (url, name) in endpoints {
            if servers.iter().any(|server| server.index_url() == url) {
                continue;
            }
            match NugetServer::create(Arc::clone(&http), url).await {
                Ok(server) => {
                    info!("Initialized NuGet server API @ {} ({})", url, name);
                    servers.push(server);
                }
                Err(e) => warn!("Skipping package source {} @ {}: {}", name, url, e),
            }
        }

        Ok(Self { servers })
    }

    pub fn servers(&self) -> &[NugetServer] {
        &self.servers
    }

    async fn find_index(
        &self,
        id: &str,
    ) -> Result<Option<(&NugetServer, RegistrationIndex)>, NugetError> {
        for server in &self.servers {
            if let Some(index) = server.registration_index(id).await? {
                return Ok(Some((server, index)));
            }
        }
        Ok(None)
    }
}

#[async_trait::async_trait]
impl Registry for Nuget {
    async fn fetch_package_details(
        &self,
        package: &Package,
    ) -> Result<Option<PackageDetails>, NugetError> {
        let Some((server, index)) = self.find_index(&package.name).await? else {
            warn!(
                "Could not find {} in any of the configured NuGet servers",
                package.name
            );
            return Ok(None);
        };
        let http = server.http();

        let mut details = PackageDetails {
            available_version_count: index.available_version_count(),
            source: Some(index.url.clone()),
            ..PackageDetails::default()
        };

        if let Some(version) = &package.version {
            details.version_date = index.version_date(http, version).await?;
        }
        if let Some(release) = index.latest_release(http).await? {
            details.latest_release = Some(release.version);
            details.latest_release_date = release.date;
        }
        if let Some(latest) = index.latest_version(http).await? {
            details.latest_version = Some(latest.version);
            details.latest_version_date = latest.date;
        }

        if let (Some(version), Some(release)) = (&package.version, &details.latest_release) {
            let diff = count_behind(version, release)?;
            details.major_releases_behind = diff.major;
            details.minor_releases_behind = diff.minor;
            details.patch_releases_behind = diff.patch;
            details.details_url = server
                .details_template()
                .and_then(|template| package.details_url_from(template));
        }

        Ok(Some(details))
    }
}

//! Canned organization searches and package source discovery

use futures::future::join_all;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::github::client::{CodeSearch, SearchResult};
use crate::github::error::GithubError;
use crate::parser::nuget_config::{self, PackageSource};

pub fn netcore_project_query(org: &str) -> String {
    format!("PackageReference+org:{}+extension:csproj", org)
}

pub fn package_config_query(org: &str) -> String {
    format!("package+org:{}+filename:packages.config", org)
}

pub fn nuget_config_query(org: &str) -> String {
    format!("packageSources+org:{}+filename:nuget.config", org)
}

/// SDK-style project files in `org`
pub async fn search_netcore_projects(
    search: &dyn CodeSearch,
    org: &str,
    limit: Option<usize>,
) -> Result<Vec<SearchResult>, GithubError> {
    search.search_code(&netcore_project_query(org), limit).await
}

/// Legacy `packages.config` files in `org`
pub async fn search_package_configs(
    search: &dyn CodeSearch,
    org: &str,
    limit: Option<usize>,
) -> Result<Vec<SearchResult>, GithubError> {
    search.search_code(&package_config_query(org), limit).await
}

/// `nuget.config` files declaring package sources in `org`
pub async fn search_nuget_configs(
    search: &dyn CodeSearch,
    org: &str,
    limit: Option<usize>,
) -> Result<Vec<SearchResult>, GithubError> {
    search.search_code(&nuget_config_query(org), limit).await
}

async fn read_package_sources(
    search: &dyn CodeSearch,
    result: &SearchResult,
) -> Result<Vec<PackageSource>, GithubError> {
    let text = search.fetch_text(&result.url).await?;
    Ok(nuget_config::parse(&text)?)
}

/// Every package source declared across the organization's `nuget.config`
/// files, keyed by service index URL in discovery order.
///
/// The first name seen for a URL wins. A file that cannot be fetched or
/// parsed is logged and skipped.
pub async fn get_unique_registry_endpoints(
    search: &dyn CodeSearch,
    org: &str,
    limit: Option<usize>,
) -> Result<IndexMap<String, String>, GithubError> {
    let results = search_nuget_configs(search, org, limit).await?;
    debug!("Found {} nuget.config file(s) in {}", results.len(), org);

    let sources = join_all(
        results
            .iter()
            .map(|result| read_package_sources(search, result)),
    )
    .await;

    let mut endpoints = IndexMap::new();
    for (result, sources) in results.iter().zip(sources) {
        match sources {
            Ok(sources) => {
                for source in sources {
                    endpoints.entry(source.url).or_insert(source.name);
                }
            }
            Err(e) => warn!(
                "Failed to read package sources from {}/{}: {}",
                result.repo, result.path, e
            ),
        }
    }

    info!("Found {} NuGet server(s) to query", endpoints.len());
    for (url, name) in &endpoints {
        info!("{} index: {}", name, url);
    }
    Ok(endpoints)
}

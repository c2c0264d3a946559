//! Organization scan orchestration
//!
//! endpoint discovery → declaration search → container extraction →
//! package resolution. Search pages are walked sequentially; container fetches
//! and package resolutions fan out with bounded concurrency. Per-item
//! failures are collected on the report instead of aborting the run.

pub mod report;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use indexmap::IndexSet;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConcurrencyConfig, ScanConfig};
use crate::github::{
    CodeSearch, GithubClient, GithubError, SearchResult, get_unique_registry_endpoints,
    search_netcore_projects, search_package_configs,
};
use crate::http::HttpClient;
use crate::nuget::{Nuget, NugetError, Registry};
use crate::parser::{ContainerKind, Package, PackageContainer, PackageDetails};

pub use report::{REPORT_COLUMNS, write_csv};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Organization name must not be empty")]
    EmptyOrg,

    #[error(transparent)]
    Github(#[from] GithubError),

    #[error(transparent)]
    Nuget(#[from] NugetError),

    #[error("Failed to write report to {path}: {reason}")]
    Report { path: String, reason: String },
}

/// A declaration file that could not be fetched or parsed
#[derive(Debug)]
pub struct ContainerFailure {
    pub kind: ContainerKind,
    pub result: SearchResult,
    pub error: GithubError,
}

/// A package whose registry lookup failed
#[derive(Debug)]
pub struct PackageFailure {
    pub package: Package,
    pub error: NugetError,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub containers: Vec<PackageContainer>,
    pub failed_containers: Vec<ContainerFailure>,
    pub failed_packages: Vec<PackageFailure>,
    pub elapsed: Duration,
}

impl ScanReport {
    pub fn package_count(&self) -> usize {
        self.containers.iter().map(|c| c.packages.len()).sum()
    }
}

async fn fetch_container(
    search: &dyn CodeSearch,
    kind: ContainerKind,
    result: &SearchResult,
) -> Result<PackageContainer, GithubError> {
    let text = search.fetch_text(&result.url).await?;
    Ok(PackageContainer::parse(
        kind,
        &result.name,
        &result.repo,
        &result.path,
        &text,
    )?)
}

/// Fetch and parse every declaration file, at most `concurrency` at a time.
///
/// Containers come back in declaration order.
pub async fn collect_containers(
    search: &dyn CodeSearch,
    declarations: Vec<(ContainerKind, SearchResult)>,
    concurrency: usize,
) -> (Vec<PackageContainer>, Vec<ContainerFailure>) {
    let outcomes: Vec<_> = stream::iter(declarations)
        .map(|(kind, result)| async move {
            let outcome = fetch_container(search, kind, &result).await;
            (kind, result, outcome)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut containers = Vec::new();
    let mut failures = Vec::new();
    for (kind, result, outcome) in outcomes {
        match outcome {
            Ok(container) => containers.push(container),
            Err(error) => failures.push(ContainerFailure {
                kind,
                result,
                error,
            }),
        }
    }
    (containers, failures)
}

/// Resolve every distinct package once and copy the details onto each
/// container entry with the same identity.
pub async fn resolve_packages(
    registry: &dyn Registry,
    containers: &mut [PackageContainer],
    concurrency: usize,
) -> Vec<PackageFailure> {
    let unique: IndexSet<Package> = containers
        .iter()
        .flat_map(|container| container.packages.iter().cloned())
        .collect();
    info!("Resolving {} distinct package(s)", unique.len());

    let outcomes: Vec<_> = stream::iter(unique)
        .map(|package| async move {
            let outcome = registry.fetch_package_details(&package).await;
            (package, outcome)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut resolved: HashMap<Package, PackageDetails> = HashMap::new();
    let mut failures = Vec::new();
    for (package, outcome) in outcomes {
        match outcome {
            Ok(Some(details)) => {
                resolved.insert(package, details);
            }
            Ok(None) => {}
            Err(error) => failures.push(PackageFailure { package, error }),
        }
    }

    for package in containers
        .iter_mut()
        .flat_map(|container| container.packages.iter_mut())
    {
        if let Some(details) = resolved.get(package) {
            package.details = details.clone();
        }
    }
    failures
}

/// Search, extract and resolve with already initialized clients
pub async fn scan_org(
    search: &dyn CodeSearch,
    registry: &dyn Registry,
    org: &str,
    concurrency: &ConcurrencyConfig,
) -> Result<ScanReport, ScanError> {
    let start = Instant::now();

    // GitHub rejects concurrent code searches, keep these sequential
    let projects = search_netcore_projects(search, org, None).await?;
    info!("Found {} .NET Core project(s) to process", projects.len());
    let package_configs = search_package_configs(search, org, None).await?;
    info!(
        "Found {} legacy .NET Framework project(s) to process",
        package_configs.len()
    );

    let declarations = projects
        .into_iter()
        .map(|result| (ContainerKind::ProjectFile, result))
        .chain(
            package_configs
                .into_iter()
                .map(|result| (ContainerKind::PackagesConfig, result)),
        )
        .collect();
    let (mut containers, failed_containers) =
        collect_containers(search, declarations, concurrency.container_fetches).await;
    for failure in &failed_containers {
        warn!(
            "Failed to get {} container {} from {}: {}",
            failure.kind, failure.result.name, failure.result.url, failure.error
        );
    }

    let failed_packages =
        resolve_packages(registry, &mut containers, concurrency.package_resolutions).await;
    for failure in &failed_packages {
        warn!(
            "Failed to get package {} from discovered NuGet server(s): {}",
            failure.package, failure.error
        );
    }

    Ok(ScanReport {
        containers,
        failed_containers,
        failed_packages,
        elapsed: start.elapsed(),
    })
}

async fn run_scan(
    github: &GithubClient,
    http: Arc<HttpClient>,
    org: &str,
    config: &ScanConfig,
) -> Result<ScanReport, ScanError> {
    let start = Instant::now();
    let endpoints = get_unique_registry_endpoints(github, org, None).await?;
    let nuget = Nuget::create(http, &config.nuget.service_index_url, &endpoints).await?;

    let mut report = scan_org(github, &nuget, org, &config.concurrency).await?;
    report.elapsed = start.elapsed();
    Ok(report)
}

/// Build the dependency report for every repository in `org`.
///
/// The org and token are validated before any request. The HTTP client is
/// closed once the run ends, whether it succeeded or not.
pub async fn build_org_report(
    org: &str,
    token: &str,
    config: &ScanConfig,
) -> Result<ScanReport, ScanError> {
    let org = org.trim();
    if org.is_empty() {
        return Err(ScanError::EmptyOrg);
    }

    let http = Arc::new(HttpClient::new(config.http.settings()));
    let github = GithubClient::with_base_url(Arc::clone(&http), token, &config.github.api_url)?;
    info!("Building NuGet dependency report for the {} GitHub org", org);

    let result = run_scan(&github, Arc::clone(&http), org, config).await;

    if let Ok(report) = &result {
        info!(
            "Processed {} for NuGet packages in {:.4} seconds",
            org,
            report.elapsed.as_secs_f64()
        );
    }
    info!("Cache hit info for get_as_json: {:?}", http.json_cache_stats());
    info!("Cache hit info for get_as_text: {:?}", http.text_cache_stats());
    http.close();

    result
}

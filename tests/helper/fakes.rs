//! In-memory code search and registry implementations

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use nuget_package_scanner::github::{CodeSearch, GithubError, SearchResult};
use nuget_package_scanner::http::HttpError;
use nuget_package_scanner::nuget::{NugetError, Registry};
use nuget_package_scanner::parser::{Package, PackageDetails};

/// Code search backed by a map from query to hits and from URL to file text
#[derive(Default)]
pub struct FakeCodeSearch {
    results: HashMap<String, Vec<SearchResult>>,
    files: HashMap<String, String>,
}

impl FakeCodeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file as a hit for `query`
    pub fn with_file(mut self, query: &str, repo: &str, path: &str, content: &str) -> Self {
        let url = format!("https://raw.example.com/{}/{}", repo, path);
        self.results
            .entry(query.to_string())
            .or_default()
            .push(SearchResult {
                name: path.rsplit('/').next().unwrap_or(path).to_string(),
                repo: repo.to_string(),
                path: path.to_string(),
                url: url.clone(),
            });
        self.files.insert(url, content.to_string());
        self
    }
}

#[async_trait]
impl CodeSearch for FakeCodeSearch {
    async fn search_code(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchResult>, GithubError> {
        let mut results = self.results.get(query).cloned().unwrap_or_default();
        if let Some(limit) = limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn fetch_text(&self, url: &str) -> Result<Arc<str>, GithubError> {
        self.files
            .get(url)
            .map(|text| Arc::from(text.as_str()))
            .ok_or_else(|| GithubError::Http(HttpError::Closed(url.to_string())))
    }
}

/// Registry that knows a fixed set of packages by name
#[derive(Default)]
pub struct FakeRegistry {
    packages: HashMap<String, PackageDetails>,
    failing: Vec<String>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latest_release(mut self, name: &str, latest: &str) -> Self {
        self.packages.insert(
            name.to_string(),
            PackageDetails {
                latest_release: Some(latest.to_string()),
                ..PackageDetails::default()
            },
        );
        self
    }

    pub fn with_failure(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn fetch_package_details(
        &self,
        package: &Package,
    ) -> Result<Option<PackageDetails>, NugetError> {
        if self.failing.contains(&package.name) {
            return Err(NugetError::ServiceIndex {
                url: "https://feed.example.com/index.json".to_string(),
                reason: "unavailable".to_string(),
            });
        }
        Ok(self.packages.get(&package.name).cloned())
    }
}

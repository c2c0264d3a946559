//! GitHub code search client

use std::sync::Arc;

use futures::future::join_all;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::DEFAULT_GITHUB_API_URL;
use crate::github::error::GithubError;
use crate::http::{HttpClient, RequestOptions};

/// A code search hit with its raw content URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// File name
    pub name: String,
    /// Repository name without the owner
    pub repo: String,
    /// Path inside the repository
    pub path: String,
    /// Raw content URL
    pub url: String,
}

/// Trait for organization wide code search
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait CodeSearch: Send + Sync {
    /// Runs a code search and resolves every hit to its raw content URL
    ///
    /// # Arguments
    /// * `query` - Search query, e.g. `PackageReference+org:acme+extension:csproj`
    /// * `limit` - Maximum number of hits to process
    ///
    /// # Returns
    /// * `Ok(Vec<SearchResult>)` - Resolved hits in search order
    /// * `Err(GithubError)` - If a search page cannot be fetched
    async fn search_code(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchResult>, GithubError>;

    /// Fetches the raw text of a file found by a search
    async fn fetch_text(&self, url: &str) -> Result<Arc<str>, GithubError>;
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    incomplete_results: bool,
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    name: String,
    path: String,
    /// Contents API URL of the hit
    url: String,
    repository: SearchRepository,
}

#[derive(Debug, Deserialize)]
struct SearchRepository {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    download_url: Option<String>,
}

/// Extract the `rel="next"` target from a `Link` header
pub fn next_page_link(header: Option<&str>) -> Option<String> {
    header?.split(',').find_map(|link| {
        let (target, params) = link.split_once(';')?;
        params
            .split(';')
            .any(|param| param.trim() == r#"rel="next""#)
            .then(|| {
                target
                    .trim()
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string()
            })
    })
}

/// Code search client for the GitHub REST API
#[derive(Debug)]
pub struct GithubClient {
    http: Arc<HttpClient>,
    base_url: String,
    options: RequestOptions,
}

impl GithubClient {
    pub fn new(http: Arc<HttpClient>, token: &str) -> Result<Self, GithubError> {
        Self::with_base_url(http, token, DEFAULT_GITHUB_API_URL)
    }

    /// Creates a client against a custom API base URL
    pub fn with_base_url(
        http: Arc<HttpClient>,
        token: &str,
        base_url: &str,
    ) -> Result<Self, GithubError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(GithubError::MissingToken);
        }

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            options: RequestOptions::strict()
                .with_header("Authorization", &format!("Bearer {}", token))
                .with_header("Accept", "application/vnd.github+json"),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &HttpClient {
        &self.http
    }

    pub(crate) fn options(&self) -> &RequestOptions {
        &self.options
    }

    fn search_url(&self, query: &str) -> String {
        format!("{}/search/code?q={}", self.base_url, query)
    }

    /// Resolve a hit to its download URL. Failures drop the hit.
    async fn resolve_hit(&self, item: &SearchItem) -> Option<SearchResult> {
        match self
            .http
            .get_json::<ContentDetails>(&item.url, &self.options)
            .await
        {
            Ok(Some(ContentDetails {
                download_url: Some(url),
            })) => Some(SearchResult {
                name: item.name.clone(),
                repo: item.repository.name.clone(),
                path: item.path.clone(),
                url,
            }),
            Ok(_) => {
                warn!(
                    "No download URL for {} in {}, skipping",
                    item.path, item.repository.name
                );
                None
            }
            Err(e) => {
                warn!(
                    "Failed to resolve {} in {}: {}",
                    item.path, item.repository.name, e
                );
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl CodeSearch for GithubClient {
    async fn search_code(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchResult>, GithubError> {
        let mut results = Vec::new();
        if limit == Some(0) {
            return Ok(results);
        }

        let mut hits = 0;
        let mut next = Some(self.search_url(query));
        while let Some(url) = next {
            info!("GitHub search query: {}", url);
            let response = self.http.get(&url, &self.options).await?.ok_or_else(|| {
                GithubError::InvalidResponse {
                    url: url.clone(),
                    reason: "search returned no page".to_string(),
                }
            })?;
            let page: SearchPage = response.json()?;
            if page.incomplete_results {
                warn!(
                    "GitHub reported incomplete results for {} ({} total)",
                    url, page.total_count
                );
            }

            let take = limit.map_or(page.items.len(), |limit| limit - hits);
            let items: Vec<&SearchItem> = page.items.iter().take(take).collect();
            hits += items.len();

            let resolved = join_all(items.into_iter().map(|item| self.resolve_hit(item))).await;
            results.extend(resolved.into_iter().flatten());

            if limit.is_some_and(|limit| hits >= limit) {
                break;
            }
            next = next_page_link(response.header("link"));
        }

        Ok(results)
    }

    async fn fetch_text(&self, url: &str) -> Result<Arc<str>, GithubError> {
        self.http
            .get_as_text(url, &self.options)
            .await?
            .ok_or_else(|| GithubError::InvalidResponse {
                url: url.to_string(),
                reason: "file not found".to_string(),
            })
    }
}

//! GitHub rate limit snapshot (`GET /rate_limit`)

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::github::client::GithubClient;
use crate::github::error::GithubError;
use crate::http::HttpResponse;

/// One rate limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    /// Window reset as a Unix timestamp
    pub reset: i64,
}

impl RateLimit {
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.reset, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Overall REST API window
    pub core: RateLimit,
    /// Code search window
    pub search: RateLimit,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
    rate: Option<RateLimit>,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    search: RateLimit,
}

fn header_number<T: std::str::FromStr>(response: &HttpResponse, name: &str) -> Option<T> {
    response.header(name).and_then(|value| value.trim().parse().ok())
}

fn limit_from_headers(response: &HttpResponse) -> Option<RateLimit> {
    Some(RateLimit {
        limit: header_number(response, "x-ratelimit-limit")?,
        remaining: header_number(response, "x-ratelimit-remaining")?,
        reset: header_number(response, "x-ratelimit-reset")?,
    })
}

fn format_reset(limit: &RateLimit) -> String {
    limit
        .reset_at()
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| limit.reset.to_string())
}

impl fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GitHub Limit: {}", self.core.limit)?;
        writeln!(f, "GitHub Remaining: {}", self.core.remaining)?;
        writeln!(f, "GitHub Reset: {}", format_reset(&self.core))?;
        writeln!(f, "Search API Limit: {}", self.search.limit)?;
        writeln!(f, "Search API Remaining: {}", self.search.remaining)?;
        write!(f, "Search API Reset: {}", format_reset(&self.search))
    }
}

impl GithubClient {
    /// Current rate limits. The overall window comes from the response
    /// headers, falling back to the body's `rate` object.
    pub async fn rate_limit(&self) -> Result<RateLimitInfo, GithubError> {
        let url = format!("{}/rate_limit", self.base_url());
        let response = self
            .http()
            .get(&url, self.options())
            .await?
            .ok_or_else(|| GithubError::InvalidResponse {
                url: url.clone(),
                reason: "rate limit endpoint not found".to_string(),
            })?;
        let body: RateLimitResponse = response.json()?;

        let core = limit_from_headers(&response)
            .or(body.rate)
            .ok_or_else(|| GithubError::InvalidResponse {
                url,
                reason: "no overall rate limit reported".to_string(),
            })?;

        Ok(RateLimitInfo {
            core,
            search: body.resources.search,
        })
    }
}

//! GitHub code search
//!
//! # Modules
//!
//! - [`client`]: the [`CodeSearch`] seam and its REST implementation
//! - [`search`]: canned organization queries and package source discovery
//! - [`rate_limit`]: rate limit snapshot
//! - [`error`]: code search errors

pub mod client;
pub mod error;
pub mod rate_limit;
pub mod search;

pub use client::{CodeSearch, GithubClient, SearchResult};
pub use error::GithubError;
pub use rate_limit::{RateLimit, RateLimitInfo};
pub use search::{
    get_unique_registry_endpoints, search_netcore_projects, search_nuget_configs,
    search_package_configs,
};

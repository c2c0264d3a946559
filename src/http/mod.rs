//! HTTP layer shared by the code search and registry clients
//!
//! # Modules
//!
//! - [`client`]: pooled, memoizing, retrying GET client
//! - [`error`]: error type for failed requests

pub mod client;
pub mod error;

pub use client::{CacheStats, HttpClient, HttpResponse, HttpSettings, RequestOptions, RetryPolicy};
pub use error::HttpError;

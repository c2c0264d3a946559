use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::http::{HttpSettings, RetryPolicy};

// =============================================================================
// Endpoint constants
// =============================================================================

/// Default base URL for the GitHub REST API
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Service index of the public NuGet registry, always queried first
pub const DEFAULT_NUGET_SERVICE_INDEX_URL: &str = "https://api.nuget.org/v3/index.json";

// =============================================================================
// HTTP constants
// =============================================================================

/// Maximum concurrent connections per origin
pub const DEFAULT_POOL_SIZE: usize = 100;

/// Per-request timeout in milliseconds (20 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Attempts per request, including the first one
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Lower bound of the randomized delay between attempts
pub const DEFAULT_RETRY_MIN_DELAY_MS: u64 = 1_000;

/// Upper bound of the randomized delay between attempts
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 3_000;

// =============================================================================
// Fan-out constants
// =============================================================================

/// Declaration files fetched and parsed at once
pub const DEFAULT_CONTAINER_FETCHES: usize = 16;

/// Packages resolved against the registries at once
pub const DEFAULT_PACKAGE_RESOLUTIONS: usize = 32;

/// Scanner configuration, read from an optional JSON file
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanConfig {
    pub github: GithubConfig,
    pub nuget: NugetConfig,
    pub http: HttpConfig,
    pub concurrency: ConcurrencyConfig,
}

impl ScanConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GithubConfig {
    pub api_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct NugetConfig {
    /// Service index of the registry queried before any discovered one
    pub service_index_url: String,
}

impl Default for NugetConfig {
    fn default() -> Self {
        Self {
            service_index_url: DEFAULT_NUGET_SERVICE_INDEX_URL.to_string(),
        }
    }
}

/// HTTP layer configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    pub pool_size: usize,
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_min_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_min_delay_ms: DEFAULT_RETRY_MIN_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

impl HttpConfig {
    pub fn settings(&self) -> HttpSettings {
        HttpSettings {
            pool_size: self.pool_size.max(1),
            timeout: Duration::from_millis(self.timeout_ms),
            retry: RetryPolicy {
                max_attempts: self.max_attempts.max(1),
                min_delay: Duration::from_millis(self.retry_min_delay_ms),
                max_delay: Duration::from_millis(self.retry_max_delay_ms.max(self.retry_min_delay_ms)),
            },
        }
    }
}

/// Bounds for the orchestrator's fan-out phases
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ConcurrencyConfig {
    pub container_fetches: usize,
    pub package_resolutions: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            container_fetches: DEFAULT_CONTAINER_FETCHES,
            package_resolutions: DEFAULT_PACKAGE_RESOLUTIONS,
        }
    }
}

/// Returns the path to the data directory for nuget-package-scanner.
/// Uses $XDG_DATA_HOME/nuget-package-scanner if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/nuget-package-scanner,
/// or ./nuget-package-scanner if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file of the last run.
pub fn log_path() -> PathBuf {
    data_dir().join("last_run.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("nuget-package-scanner")
}

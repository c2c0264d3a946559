//! Pooled HTTP client with retries and memoized GETs
//!
//! One `reqwest::Client` is opened per origin (scheme, host and port) on first
//! use and kept until [`HttpClient::close`]. Each origin also owns a semaphore
//! that caps the number of requests in flight against it.
//!
//! `get_as_json` and `get_as_text` are memoized per (url, options) for the
//! lifetime of the client. Concurrent callers asking for the same key wait on
//! the same fetch instead of issuing their own. Failed fetches are not stored.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use moka::future::Cache;
use rand::Rng;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_POOL_SIZE, DEFAULT_RETRY_MAX_DELAY_MS,
    DEFAULT_RETRY_MIN_DELAY_MS, DEFAULT_TIMEOUT_MS,
};
use crate::http::error::HttpError;

const USER_AGENT: &str = concat!("nuget-package-scanner/", env!("CARGO_PKG_VERSION"));

/// Retry behaviour for transient failures (5xx and connection errors)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per request, including the first one
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_delay: Duration::from_millis(DEFAULT_RETRY_MIN_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Retry without waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Random delay in `[min_delay, max_delay]`
    fn backoff(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Maximum concurrent requests per origin
    pub pool_size: usize,
    /// Per-request timeout
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            retry: RetryPolicy::default(),
        }
    }
}

/// Per-request options. Every field takes part in the memoization key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestOptions {
    /// Treat 404 as an absent resource instead of a client error
    pub allow_not_found: bool,
    pub headers: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            allow_not_found: true,
            headers: Vec::new(),
        }
    }
}

impl RequestOptions {
    /// Options under which 404 is a client error
    pub fn strict() -> Self {
        Self {
            allow_not_found: false,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// A fully read response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_str(&self.body).map_err(|source| HttpError::Decode {
            url: self.url.clone(),
            source,
        })
    }
}

/// Hit/miss counters of one memo cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheCounters {
    fn record(&self, fetched: bool) {
        let counter = if fetched { &self.misses } else { &self.hits };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    url: String,
    options: RequestOptions,
}

type Memo<T> = Cache<CacheKey, Option<T>>;

#[derive(Debug)]
struct OriginPool {
    client: reqwest::Client,
    permits: Semaphore,
}

/// Outcome of a single failed attempt
enum Failure {
    Transient(String),
    Fatal(HttpError),
}

/// HTTP client shared by every component of a scan
#[derive(Debug)]
pub struct HttpClient {
    settings: HttpSettings,
    pools: Mutex<HashMap<String, Arc<OriginPool>>>,
    json_cache: Memo<Arc<serde_json::Value>>,
    text_cache: Memo<Arc<str>>,
    json_stats: CacheCounters,
    text_stats: CacheCounters,
    closed: AtomicBool,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(HttpSettings::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn origin_key(url: &str) -> Result<String, HttpError> {
    let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed.origin().ascii_serialization()),
        other => Err(HttpError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {}", other),
        }),
    }
}

fn log_request(url: &str, status: StatusCode, headers: &HeaderMap) {
    let limit = headers
        .get("x-ratelimit-limit")
        .and_then(|v| v.to_str().ok());
    let remaining = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok());
    debug!(status = status.as_u16(), url, limit, remaining, "GET");
}

impl HttpClient {
    pub fn new(settings: HttpSettings) -> Self {
        Self {
            settings,
            pools: Mutex::new(HashMap::new()),
            json_cache: Cache::builder().build(),
            text_cache: Cache::builder().build(),
            json_stats: CacheCounters::default(),
            text_stats: CacheCounters::default(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// Number of origins with an open connection pool
    pub fn pool_count(&self) -> usize {
        lock(&self.pools).len()
    }

    pub fn json_cache_stats(&self) -> CacheStats {
        self.json_stats.snapshot()
    }

    pub fn text_cache_stats(&self) -> CacheStats {
        self.text_stats.snapshot()
    }

    fn pool_for(&self, url: &str) -> Result<Arc<OriginPool>, HttpError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HttpError::Closed(url.to_string()));
        }

        let origin = origin_key(url)?;
        let mut pools = lock(&self.pools);
        if let Some(pool) = pools.get(&origin) {
            return Ok(Arc::clone(pool));
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.settings.timeout)
            .pool_max_idle_per_host(self.settings.pool_size)
            .build()
            .map_err(HttpError::Client)?;

        debug!("Opening client session for {}", origin);
        let pool = Arc::new(OriginPool {
            client,
            permits: Semaphore::new(self.settings.pool_size),
        });
        pools.insert(origin, Arc::clone(&pool));
        Ok(pool)
    }

    /// GET `url`, retrying transient failures.
    ///
    /// Returns `Ok(None)` for a 404 when `options.allow_not_found` is set.
    /// 4xx responses fail immediately; 5xx responses and connection errors are
    /// retried up to the policy's attempt ceiling.
    pub async fn get(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Option<HttpResponse>, HttpError> {
        let pool = self.pool_for(url)?;
        let policy = &self.settings.retry;
        let mut attempt = 1;

        loop {
            match self.send_once(&pool, url, options).await {
                Ok(response) => return Ok(response),
                Err(Failure::Fatal(e)) => return Err(e),
                Err(Failure::Transient(reason)) => {
                    if attempt >= policy.max_attempts {
                        warn!("GET {} failed after {} attempts: {}", url, attempt, reason);
                        return Err(HttpError::RetriesExhausted {
                            url: url.to_string(),
                            attempts: attempt,
                            last_error: reason,
                        });
                    }
                    let delay = policy.backoff();
                    debug!(
                        "Retrying GET {} in {:?} (attempt {}/{}): {}",
                        url,
                        delay,
                        attempt + 1,
                        policy.max_attempts,
                        reason
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn send_once(
        &self,
        pool: &OriginPool,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Option<HttpResponse>, Failure> {
        let _permit = pool
            .permits
            .acquire()
            .await
            .map_err(|_| Failure::Fatal(HttpError::Closed(url.to_string())))?;

        let mut request = pool.client.get(url);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return Err(Failure::Fatal(HttpError::Network {
                    url: url.to_string(),
                    source: e,
                }));
            }
            Err(e) => return Err(Failure::Transient(e.to_string())),
        };

        let status = response.status();
        log_request(url, status, response.headers());

        if status == StatusCode::NOT_FOUND && options.allow_not_found {
            return Ok(None);
        }

        if status.is_server_error() {
            return Err(Failure::Transient(format!("server returned {}", status)));
        }

        if !status.is_success() {
            warn!("GET {} returned status {}", url, status);
            return Err(Failure::Fatal(HttpError::Status {
                url: url.to_string(),
                status,
            }));
        }

        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| Failure::Transient(e.to_string()))?;

        Ok(Some(HttpResponse {
            url: url.to_string(),
            status,
            headers,
            body,
        }))
    }

    async fn memoized<T, Fut>(
        memo: &Memo<T>,
        counters: &CacheCounters,
        key: CacheKey,
        fetch: Fut,
    ) -> Result<Option<T>, HttpError>
    where
        T: Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, HttpError>>,
    {
        let fetched = AtomicBool::new(false);
        let value = memo
            .try_get_with(key, async {
                fetched.store(true, Ordering::Relaxed);
                fetch.await
            })
            .await
            .map_err(HttpError::from_shared)?;
        counters.record(fetched.load(Ordering::Relaxed));

        Ok(value)
    }

    /// Memoized GET returning the parsed JSON body
    pub async fn get_as_json(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Option<Arc<serde_json::Value>>, HttpError> {
        let key = CacheKey {
            url: url.to_string(),
            options: options.clone(),
        };

        Self::memoized(&self.json_cache, &self.json_stats, key, async {
            match self.get(url, options).await? {
                Some(response) => Ok(Some(Arc::new(response.json::<serde_json::Value>()?))),
                None => Ok(None),
            }
        })
        .await
    }

    /// Memoized GET deserialized into `T`
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Option<T>, HttpError> {
        match self.get_as_json(url, options).await? {
            Some(value) => T::deserialize(value.as_ref())
                .map(Some)
                .map_err(|source| HttpError::Decode {
                    url: url.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Memoized GET returning the body as text
    pub async fn get_as_text(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Option<Arc<str>>, HttpError> {
        let key = CacheKey {
            url: url.to_string(),
            options: options.clone(),
        };

        Self::memoized(&self.text_cache, &self.text_stats, key, async {
            Ok(self
                .get(url, options)
                .await?
                .map(|response| Arc::from(response.body)))
        })
        .await
    }

    /// Flush the memo caches and close every pooled session.
    ///
    /// Safe to call when no session was ever opened, and more than once.
    /// Returns the number of sessions closed by this call.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        self.json_cache.invalidate_all();
        self.text_cache.invalidate_all();

        let pools: Vec<(String, Arc<OriginPool>)> = lock(&self.pools).drain().collect();
        if !pools.is_empty() {
            info!("Closing {} client session(s)", pools.len());
        }
        for (origin, pool) in &pools {
            debug!("Closing {} client session", origin);
            pool.permits.close();
        }
        pools.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::json;

    fn fast_client() -> HttpClient {
        HttpClient::new(HttpSettings {
            retry: RetryPolicy::immediate(3),
            ..HttpSettings::default()
        })
    }

    #[tokio::test]
    async fn get_returns_body_and_headers_for_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/resource")
            .with_status(200)
            .with_header("x-ratelimit-limit", "30")
            .with_header("x-ratelimit-remaining", "29")
            .with_body("hello")
            .create_async()
            .await;

        let client = fast_client();
        let response = client
            .get(&format!("{}/resource", server.url()), &RequestOptions::default())
            .await
            .unwrap()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, "hello");
        assert_eq!(response.header("x-ratelimit-remaining"), Some("29"));
    }

    #[tokio::test]
    async fn get_treats_404_as_absent_by_default() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = fast_client();
        let result = client
            .get(&format!("{}/missing", server.url()), &RequestOptions::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn get_fails_on_404_when_strict() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = fast_client();
        let result = client
            .get(&format!("{}/missing", server.url()), &RequestOptions::strict())
            .await;

        mock.assert_async().await;
        assert_eq!(result.unwrap_err().status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn get_does_not_retry_client_errors() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/invalid")
            .with_status(422)
            .expect(1)
            .create_async()
            .await;

        let client = fast_client();
        let result = client
            .get(&format!("{}/invalid", server.url()), &RequestOptions::default())
            .await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(HttpError::Status { status, .. }) if status == StatusCode::UNPROCESSABLE_ENTITY
        ));
    }

    #[tokio::test]
    async fn get_retries_server_errors_until_success() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("GET", "/flaky")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;
        let succeeding = server
            .mock("GET", "/flaky")
            .with_status(200)
            .with_body("finally")
            .expect(1)
            .create_async()
            .await;

        let client = fast_client();
        let response = client
            .get(&format!("{}/flaky", server.url()), &RequestOptions::default())
            .await
            .unwrap()
            .unwrap();

        failing.assert_async().await;
        succeeding.assert_async().await;
        assert_eq!(response.body, "finally");
    }

    #[tokio::test]
    async fn get_gives_up_after_max_attempts() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/down")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = fast_client();
        let result = client
            .get(&format!("{}/down", server.url()), &RequestOptions::default())
            .await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(HttpError::RetriesExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn get_as_json_coalesces_concurrent_requests() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/index.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"version": "3.0.0"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = fast_client();
        let url = format!("{}/index.json", server.url());
        let options = RequestOptions::default();
        let (first, second) = tokio::join!(
            client.get_as_json(&url, &options),
            client.get_as_json(&url, &options)
        );

        mock.assert_async().await;
        let first = first.unwrap().unwrap();
        assert_eq!(*first, json!({"version": "3.0.0"}));
        assert_eq!(Some(first), second.unwrap());
        assert_eq!(
            client.json_cache_stats(),
            CacheStats { hits: 1, misses: 1 }
        );
    }

    #[tokio::test]
    async fn get_as_text_is_memoized() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/file.csproj")
            .with_status(200)
            .with_body("<Project />")
            .expect(1)
            .create_async()
            .await;

        let client = fast_client();
        let url = format!("{}/file.csproj", server.url());
        let first = client
            .get_as_text(&url, &RequestOptions::default())
            .await
            .unwrap();
        let second = client
            .get_as_text(&url, &RequestOptions::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(first.as_deref(), Some("<Project />"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn memoization_key_includes_options() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/resource")
            .with_status(200)
            .with_body("{}")
            .expect(2)
            .create_async()
            .await;

        let client = fast_client();
        let url = format!("{}/resource", server.url());
        client
            .get_as_json(&url, &RequestOptions::default())
            .await
            .unwrap();
        client
            .get_as_json(
                &url,
                &RequestOptions::default().with_header("Authorization", "Bearer abc"),
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn memoization_key_includes_not_found_handling() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(2)
            .create_async()
            .await;

        let client = fast_client();
        let url = format!("{}/missing", server.url());
        let lenient = client.get_as_json(&url, &RequestOptions::default()).await;
        let strict = client.get_as_json(&url, &RequestOptions::strict()).await;

        mock.assert_async().await;
        assert!(matches!(lenient, Ok(None)));
        assert!(matches!(
            strict,
            Err(HttpError::Status { status, .. }) if status == StatusCode::NOT_FOUND
        ));
    }

    #[tokio::test]
    async fn failed_lookups_are_not_memoized() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("GET", "/later")
            .with_status(403)
            .expect(1)
            .create_async()
            .await;

        let client = fast_client();
        let url = format!("{}/later", server.url());
        assert!(
            client
                .get_as_json(&url, &RequestOptions::default())
                .await
                .is_err()
        );
        failing.assert_async().await;

        let succeeding = server
            .mock("GET", "/later")
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;
        let value = client
            .get_as_json(&url, &RequestOptions::default())
            .await
            .unwrap();

        succeeding.assert_async().await;
        assert_eq!(value.as_deref(), Some(&json!([])));
    }

    #[tokio::test]
    async fn get_json_reports_decode_errors() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/broken")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = fast_client();
        let result = client
            .get_json::<serde_json::Value>(
                &format!("{}/broken", server.url()),
                &RequestOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(HttpError::Decode { .. })));
    }

    #[tokio::test]
    async fn pools_are_created_per_origin() {
        let mut first = Server::new_async().await;
        let mut second = Server::new_async().await;
        first
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .create_async()
            .await;
        second
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .create_async()
            .await;

        let client = fast_client();
        let options = RequestOptions::default();
        client.get(&format!("{}/a", first.url()), &options).await.unwrap();
        client.get(&format!("{}/b", first.url()), &options).await.unwrap();
        assert_eq!(client.pool_count(), 1);

        client.get(&format!("{}/c", second.url()), &options).await.unwrap();
        assert_eq!(client.pool_count(), 2);

        assert_eq!(client.close(), 2);
        assert_eq!(client.pool_count(), 0);
    }

    #[tokio::test]
    async fn close_is_safe_without_sessions_and_idempotent() {
        let client = fast_client();

        assert_eq!(client.close(), 0);
        assert_eq!(client.close(), 0);
        assert!(matches!(
            client
                .get("http://localhost/after-close", &RequestOptions::default())
                .await,
            Err(HttpError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn get_rejects_invalid_urls() {
        let client = fast_client();

        let result = client.get("not a url", &RequestOptions::default()).await;
        assert!(matches!(result, Err(HttpError::InvalidUrl { .. })));

        let result = client
            .get("ftp://example.com/file", &RequestOptions::default())
            .await;
        assert!(matches!(result, Err(HttpError::InvalidUrl { .. })));
    }

    #[test]
    fn backoff_stays_within_bounds() {
        let policy = RetryPolicy {
            max_attempts: 3,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(30),
        };

        for _ in 0..50 {
            let delay = policy.backoff();
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_millis(30));
        }
        assert_eq!(RetryPolicy::immediate(3).backoff(), Duration::ZERO);
    }
}

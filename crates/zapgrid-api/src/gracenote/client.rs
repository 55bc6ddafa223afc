//! `ZapClient` - Gracenote listings API client implementation.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Proxy};
use tracing::instrument;
use url::Url;

use super::api::LocalZapApi;
use super::outcome::{FetchOutcome, TextPolicy, TransferStats};
use super::params::GridQuery;
use super::throttle::Throttle;
use super::types::LoginResponse;

/// Default base URL for the listings site.
const DEFAULT_BASE_URL: &str = "https://tvlistings.gracenote.com/";

/// Browser User-Agent the listings site accepts.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36";

/// Per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of attempts per request.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Allowed range for the number of attempts.
const MAX_RETRIES_RANGE: (u32, u32) = (1, 20);

/// Gracenote listings API client.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ZapClient {
    /// HTTP client (reqwest, gzip enabled).
    http_client: Client,
    /// Base URL.
    base_url: Url,
    /// Fixed-delay throttle.
    throttle: Throttle,
    /// Attempts per request.
    max_retries: u32,
    /// Run-level transfer counters.
    counters: TransferCounters,
}

/// Builder for `ZapClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ZapClientBuilder {
    base_url: Option<Url>,
    user_agent: Option<String>,
    delay: Option<Duration>,
    retry_backoff: Option<Duration>,
    max_retries: Option<u32>,
    timeout: Option<Duration>,
    proxy: Option<String>,
}

impl ZapClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            base_url: None,
            user_agent: None,
            delay: None,
            retry_backoff: None,
            max_retries: None,
            timeout: None,
            proxy: None,
        }
    }

    /// Overrides the base URL (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the User-Agent (default: a desktop browser UA).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the pause before every attempt (default: none).
    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the extra pause added between retries (default: 1s).
    #[must_use]
    pub const fn retry_backoff(mut self, step: Duration) -> Self {
        self.retry_backoff = Some(step);
        self
    }

    /// Sets the number of attempts per request, clamped to `1..=20` (default: 3).
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Sets the per-request timeout (default: 30s).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Routes all traffic through a proxy URL.
    #[must_use]
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - The proxy URL is invalid.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<ZapClient> {
        let base_url = if let Some(url) = self.base_url {
            url
        } else {
            let result = Url::parse(DEFAULT_BASE_URL);
            result.context("invalid default base URL")?
        };

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| String::from(DEFAULT_USER_AGENT));
        let (min_retries, max_retries) = MAX_RETRIES_RANGE;
        let max_retries = self
            .max_retries
            .unwrap_or(DEFAULT_MAX_RETRIES)
            .clamp(min_retries, max_retries);
        let delay = self.delay.unwrap_or(Duration::ZERO);
        let throttle = self.retry_backoff.map_or_else(
            || Throttle::with_delay(delay),
            |step| Throttle::new(delay, step),
        );

        let mut builder = Client::builder()
            .user_agent(&user_agent)
            .gzip(true)
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT));
        if let Some(ref proxy) = self.proxy {
            let proxy = Proxy::all(proxy.as_str())
                .with_context(|| format!("invalid proxy URL: {proxy}"))?;
            builder = builder.proxy(proxy);
        }
        let http_client = builder.build().context("failed to build HTTP client")?;

        tracing::debug!(
            %base_url,
            max_retries,
            delay_ms = throttle.delay().as_millis(),
            proxy = self.proxy.is_some(),
            "Listings client ready"
        );

        Ok(ZapClient {
            http_client,
            base_url,
            throttle,
            max_retries,
            counters: TransferCounters::default(),
        })
    }
}

/// A successful HTTP response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Declared charset (lowercased), if any.
    pub charset: Option<String>,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Decodes the body using the declared charset, defaulting to UTF-8.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected.
    #[must_use]
    pub fn text(&self) -> String {
        match self.charset.as_deref() {
            Some("iso-8859-1" | "latin1" | "latin-1") => {
                self.body.iter().copied().map(char::from).collect()
            }
            _ => String::from_utf8_lossy(&self.body).into_owned(),
        }
    }
}

/// Extracts the lowercased `charset` parameter from `Content-Type`.
fn declared_charset(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
    })
}

/// Thread-safe transfer counters.
#[derive(Debug, Default)]
struct TransferCounters {
    requests: AtomicU64,
    bytes: AtomicU64,
    peers: Mutex<HashSet<SocketAddr>>,
}

impl TransferCounters {
    fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn record_body(&self, peer: Option<SocketAddr>, len: usize) {
        self.bytes
            .fetch_add(u64::try_from(len).unwrap_or(u64::MAX), Ordering::Relaxed);
        if let Some(peer) = peer
            && let Ok(mut peers) = self.peers.lock()
        {
            peers.insert(peer);
        }
    }

    fn snapshot(&self) -> TransferStats {
        TransferStats {
            requests: self.requests.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            connections: self.peers.lock().map_or(0, |peers| peers.len()),
        }
    }
}

impl ZapClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> ZapClientBuilder {
        ZapClientBuilder::new()
    }

    /// Resolves an API path against the base URL.
    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("failed to join URL path: {path}"))
    }

    /// Sends a request with throttling and retry logic.
    ///
    /// Sleeps the throttle delay before every attempt and `delay + 1s`
    /// between attempts. An attempt succeeds only with a success status
    /// and a non-empty body. Exhausting every attempt yields `Failed`.
    async fn request_with_retry(
        &self,
        command: &str,
        build_request: impl Fn() -> reqwest::RequestBuilder,
    ) -> FetchOutcome<RawResponse> {
        for attempt in 1..=self.max_retries {
            self.throttle.pause().await;
            self.counters.record_request();

            match build_request().send().await {
                Ok(response) => {
                    let status = response.status();
                    let peer = response.remote_addr();
                    let charset = declared_charset(response.headers());
                    tracing::trace!(%command, %status, ?peer, "Response headers");

                    match response.bytes().await {
                        Ok(body) => {
                            self.counters.record_body(peer, body.len());
                            tracing::debug!(%command, %status, body_len = body.len(), "Response body received");
                            if status.is_success() && !body.is_empty() {
                                return FetchOutcome::Fetched(RawResponse {
                                    status: status.as_u16(),
                                    charset,
                                    body: body.to_vec(),
                                });
                            }
                            tracing::warn!(
                                %command,
                                attempt,
                                max_retries = self.max_retries,
                                code = status.as_u16(),
                                empty = body.is_empty(),
                                "Unusable response"
                            );
                        }
                        Err(e) => {
                            tracing::warn!(
                                %command,
                                attempt,
                                max_retries = self.max_retries,
                                error = %e,
                                "Failed to read response body"
                            );
                        }
                    }
                }
                Err(e) if e.is_timeout() => {
                    tracing::warn!(
                        %command,
                        attempt,
                        max_retries = self.max_retries,
                        "Request timed out"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        %command,
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Request failed"
                    );
                }
            }

            if attempt < self.max_retries {
                self.throttle.pause_before_retry().await;
            }
        }

        tracing::warn!(%command, attempts = self.max_retries, "All attempts failed");
        FetchOutcome::Failed
    }

    /// Fetches a response body as text.
    ///
    /// # Errors
    ///
    /// Returns an error when every attempt failed and `policy` is
    /// [`TextPolicy::Required`]; with [`TextPolicy::AllowEmpty`] a
    /// failure yields an empty string.
    pub async fn fetch_text(
        &self,
        command: &str,
        build_request: impl Fn() -> reqwest::RequestBuilder,
        policy: TextPolicy,
    ) -> Result<String> {
        match self.request_with_retry(command, build_request).await {
            FetchOutcome::Fetched(response) => Ok(response.text()),
            FetchOutcome::Failed => match policy {
                TextPolicy::AllowEmpty => Ok(String::new()),
                TextPolicy::Required => {
                    bail!("{command} failed after {} attempts", self.max_retries)
                }
            },
        }
    }
}

impl LocalZapApi for ZapClient {
    #[instrument(skip_all)]
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let url = self.endpoint("api/user/login")?;
        let form = [
            ("emailid", username),
            ("password", password),
            ("usertype", "0"),
            ("facebookuser", "false"),
        ];

        let body = self
            .fetch_text(
                "Login",
                || self.http_client.post(url.clone()).form(&form),
                TextPolicy::Required,
            )
            .await?;

        serde_json::from_str(&body).context("failed to decode login response")
    }

    #[instrument(skip_all, fields(start_ms = query.start_ms))]
    async fn grid(&self, query: &GridQuery) -> Result<FetchOutcome<String>> {
        let url = self.endpoint("api/grid")?;
        let pairs = query.to_query();

        let text = self
            .fetch_text(
                "Grid",
                || self.http_client.get(url.clone()).query(&pairs),
                TextPolicy::AllowEmpty,
            )
            .await?;

        Ok(if text.is_empty() {
            FetchOutcome::Failed
        } else {
            FetchOutcome::Fetched(text)
        })
    }

    #[instrument(skip_all, fields(%series_id))]
    async fn overview(&self, series_id: &str) -> Result<FetchOutcome<String>> {
        let url = self.endpoint("api/program/overviewDetails")?;
        let form = [
            ("programSeriesID", series_id),
            ("clickstream[FromPage]", "TV Grid"),
        ];

        Ok(self
            .request_with_retry("Overview", || {
                self.http_client.post(url.clone()).form(&form)
            })
            .await
            .map(|response| response.text()))
    }

    fn transfer_stats(&self) -> TransferStats {
        self.counters.snapshot()
    }
}

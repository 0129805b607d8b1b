//! A single-attempt HTTP GET primitive.
//!
//! This crate deliberately knows nothing about retries, circuit breakers, or
//! robots compliance — those live one layer up, in the Crawl Engine and the
//! Robots Oracle respectively. It mirrors the low-level/high-level split this
//! codebase draws between its raw HTTP client and its `ReliableHttpClient`
//! reliability wrapper: this is the raw layer.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use riptide_types::FetchError;
use tracing::warn;

const DEFAULT_USER_AGENT: &str = "CrawlspaceBot/1.0 (+https://example.invalid/bot)";
const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Tunables for [`Fetcher::new`]. Mirrors the connect/total timeout split
/// and TLS toggle this codebase's HTTP client builder exposes.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
    pub max_redirects: usize,
    pub verify_tls: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(5),
            total_timeout: Duration::from_secs(15),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            verify_tls: true,
        }
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub body: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
}

/// Synthetic 5xx status returned in [`FetchResponse`] when the underlying
/// request fails outright (no response received at all). The caller decides
/// how the URL is recorded; this crate never panics or propagates the raw
/// `reqwest` error past its own boundary.
const SYNTHETIC_FAILURE_STATUS: u16 = 599;

/// Performs one GET per call. Not retried, not rate-limited, not
/// robots-aware — those concerns live above this crate.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(options: &FetchOptions) -> Self {
        let mut builder = Client::builder()
            .user_agent(options.user_agent.clone())
            .connect_timeout(options.connect_timeout)
            .timeout(options.total_timeout)
            .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
            .gzip(true)
            .brotli(true);

        if !options.verify_tls {
            // Logged once at construction, not per-request, so a crawl with
            // broken-cert tolerance does not spam the log.
            warn!("TLS certificate verification disabled for this fetcher");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// Fetch `url`. On any network/TLS/timeout failure, returns a
    /// `FetchResponse` carrying an empty body and [`SYNTHETIC_FAILURE_STATUS`]
    /// rather than propagating the error, so the caller's drain loop can
    /// treat every outcome uniformly as "got a status code".
    pub async fn fetch(&self, url: &str) -> FetchResponse {
        match self.try_fetch(url).await {
            Ok(response) => response,
            Err(err) => {
                warn!(url, error = %err, "fetch failed");
                FetchResponse {
                    body: String::new(),
                    status: SYNTHETIC_FAILURE_STATUS,
                    headers: HashMap::new(),
                }
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, DEFAULT_ACCEPT)
            .send()
            .await
            .map_err(|err| classify_error(url, &err))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let body = response
            .text()
            .await
            .map_err(|err| classify_error(url, &err))?;

        Ok(FetchResponse {
            body,
            status,
            headers,
        })
    }
}

fn classify_error(url: &str, err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            timeout_secs: 15,
        }
    } else if err.is_connect() || err.to_string().to_lowercase().contains("certificate") {
        FetchError::Tls {
            url: url.to_string(),
            message: err.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Whether a `Content-Type` header value names an HTML-family document. The
/// Crawl Engine uses this to decide whether to attempt extraction.
pub fn is_html_content_type(content_type: &str) -> bool {
    let ct = content_type.split(';').next().unwrap_or("").trim();
    ct.starts_with("text/html") || ct.starts_with("application/xhtml")
}

/// Whether a status code is worth a short bounded retry at the Crawl
/// Engine level (§4.9's transient-status retry policy).
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 502 | 503 | 504)
}

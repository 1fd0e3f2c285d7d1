//! HTTP access to third-party card sites.
//!
//! [`HttpClient`] issues single GETs with browser-like headers and turns
//! non-2xx responses into [`FetchError::Status`] so the retry classifier can
//! act on the status code. [`PageFetcher`] wraps page requests in the
//! page-class rate limiter and the external-site retry policy.

mod user_agent;

pub use user_agent::{
    referer_for, resolve_user_agent, ACCEPT_HTML, ACCEPT_IMAGE, ACCEPT_LANGUAGE,
    BROWSER_USER_AGENT,
};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE as ACCEPT_LANGUAGE_HEADER, CONTENT_TYPE, REFERER, RETRY_AFTER,
    USER_AGENT,
};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::rate_limit::{RateLimiter, RetryPolicy, Retryable};

/// Errors from fetching a remote resource.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("HTTP {status} fetching {url}")]
    Status {
        status: u16,
        url: String,
        retry_after: Option<String>,
    },
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("network error reading body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl Retryable for FetchError {
    fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Network { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    fn retry_after_header(&self) -> Option<&str> {
        match self {
            FetchError::Status { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }
}

/// A fetched response body with its declared content type.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub url: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FetchedBody {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// HTTP client presenting browser-like headers.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    user_agent: String,
}

impl HttpClient {
    /// Create a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Self::with_user_agent(timeout, None)
    }

    /// Create a client with a custom user agent (None = browser default).
    pub fn with_user_agent(
        timeout: Duration,
        user_agent: Option<&str>,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            user_agent: resolve_user_agent(user_agent),
        })
    }

    /// Issue one GET. Non-2xx statuses become [`FetchError::Status`].
    pub async fn get(&self, url: &str, accept: &str) -> Result<FetchedBody, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut request = self
            .client
            .get(parsed.clone())
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, accept)
            .header(ACCEPT_LANGUAGE_HEADER, ACCEPT_LANGUAGE);
        if let Some(referer) = referer_for(&parsed) {
            request = request.header(REFERER, referer);
        }

        debug!("GET {}", url);
        let response = request.send().await.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                retry_after,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response.bytes().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;

        Ok(FetchedBody {
            url: url.to_string(),
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

/// Anything that can produce the HTML of a source page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;
}

/// Page fetcher: rate-limited, retried GETs of source pages.
#[derive(Clone, Debug)]
pub struct PageFetcher {
    http: HttpClient,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl PageFetcher {
    /// Create a fetcher using the external-site retry profile.
    pub fn new(http: HttpClient, limiter: RateLimiter) -> Self {
        Self::with_policy(http, limiter, RetryPolicy::external_site())
    }

    pub fn with_policy(http: HttpClient, limiter: RateLimiter, retry: RetryPolicy) -> Self {
        Self {
            http,
            limiter,
            retry,
        }
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let body = self
            .retry
            .run(|| self.limiter.execute(|| self.http.get(url, ACCEPT_HTML)))
            .await?;
        debug!("Fetched {} ({} bytes)", url, body.bytes.len());
        Ok(body.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::{is_rate_limit, is_transient};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_fetcher(max_retries: u32) -> PageFetcher {
        PageFetcher::with_policy(
            HttpClient::new(Duration::from_secs(5)).unwrap(),
            RateLimiter::from_millis("pages", 0),
            RetryPolicy::new(max_retries, Duration::from_millis(5)),
        )
    }

    #[tokio::test]
    async fn test_fetch_page_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cards"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html>cards</html>", "text/html"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let html = fast_fetcher(0)
            .fetch_page(&format!("{}/cards", server.uri()))
            .await
            .unwrap();
        assert_eq!(html, "<html>cards</html>");

        let requests = server.received_requests().await.unwrap();
        let headers = &requests[0].headers;
        let get = |name: &str| headers.get(name).unwrap().to_str().unwrap().to_string();
        assert_eq!(get("referer"), format!("{}/", server.uri()));
        assert_eq!(get("user-agent"), BROWSER_USER_AGENT);
        assert_eq!(get("accept-language"), ACCEPT_LANGUAGE);
        assert!(get("accept").starts_with("text/html"));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fast_fetcher(3)
            .fetch_page(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert!(!is_transient(&err));
    }

    #[tokio::test]
    async fn test_client_error_on_numeric_path_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cards/500"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fast_fetcher(3)
            .fetch_page(&format!("{}/cards/500", server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("/cards/500"));
    }

    #[test]
    fn test_status_errors_classified_by_status_not_url() {
        let status = |status: u16, url: &str| FetchError::Status {
            status,
            url: url.to_string(),
            retry_after: None,
        };

        assert!(!is_transient(&status(404, "https://shop.test/cards/502")));
        assert!(!is_rate_limit(&status(404, "https://cdn.test/set/429.jpg")));
        assert!(!is_transient(&status(404, "https://cdn.test/set/429.jpg")));
        assert!(!is_transient(&status(403, "http://network.example/")));
        assert!(is_transient(&status(502, "https://shop.test/cards")));
        assert!(is_rate_limit(&status(429, "https://shop.test/cards")));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = fast_fetcher(2)
            .fetch_page(&format!("{}/flaky", server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .mount(&server)
            .await;

        let err = fast_fetcher(0)
            .fetch_page(&format!("{}/busy", server.uri()))
            .await
            .unwrap_err();

        assert!(is_rate_limit(&err));
        assert_eq!(err.retry_after_header(), Some("0"));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = fast_fetcher(0).fetch_page("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}

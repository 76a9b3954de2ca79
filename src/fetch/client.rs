//! HTTP fetcher with manual redirects, User-Agent fallback and retry.
//!
//! One [`HttpFetcher`] is built per extraction request and shared by reference
//! across every listing and document fetch, so connection pooling applies to
//! the whole batch.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, Response};
use reqwest::header::{ACCEPT, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::{
    ACCEPT_HTML, ACCEPT_JSON, ACCEPT_PDF, CONNECT_TIMEOUT_SECS, DOCUMENT_TIMEOUT_SECS,
    LISTING_TIMEOUT_SECS, MAX_BODY_BYTES, MAX_REDIRECTS, PDF_TIMEOUT_SECS,
};
use super::error::FetchError;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use crate::user_agent::{self, BROWSER_USER_AGENT};

/// Per-call-site request timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTimeouts {
    /// TCP/TLS connect timeout applied to every request.
    pub connect: Duration,
    /// Listing pages and BoardDocs navigation calls.
    pub listing: Duration,
    /// Policy detail pages and BoardDocs policy items.
    pub document: Duration,
    /// PDF downloads.
    pub pdf: Duration,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            listing: Duration::from_secs(LISTING_TIMEOUT_SECS),
            document: Duration::from_secs(DOCUMENT_TIMEOUT_SECS),
            pdf: Duration::from_secs(PDF_TIMEOUT_SECS),
        }
    }
}

/// Which call site a fetch belongs to; selects the timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Listing page or navigation call.
    Listing,
    /// Individual policy document page.
    Document,
    /// PDF download.
    Pdf,
}

/// A successfully fetched body plus the URL it was finally served from.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after following redirects.
    pub url: Url,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Decodes the body as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP fetcher shared by every platform source.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeouts: FetchTimeouts,
    retry_policy: RetryPolicy,
    max_body_bytes: u64,
}

impl HttpFetcher {
    /// Builds a fetcher with the given timeouts and the default retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when the reqwest client cannot be built.
    pub fn new(timeouts: FetchTimeouts) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .redirect(Policy::none())
            .user_agent(user_agent::default_fetch_user_agent())
            .gzip(true)
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;

        Ok(Self {
            client,
            timeouts,
            retry_policy: RetryPolicy::default(),
            max_body_bytes: MAX_BODY_BYTES,
        })
    }

    /// Replaces the response body cap.
    #[must_use]
    pub fn with_max_body_bytes(mut self, max_body_bytes: u64) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Returns the configured timeouts.
    #[must_use]
    pub fn timeouts(&self) -> FetchTimeouts {
        self.timeouts
    }

    /// Fetches an HTML page and decodes it as text.
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch).
    pub async fn fetch_html(&self, url: &str, kind: FetchKind) -> Result<FetchedPage, FetchError> {
        self.fetch(url, ACCEPT_HTML, kind).await
    }

    /// Fetches a JSON endpoint.
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch).
    pub async fn fetch_json_text(&self, url: &str) -> Result<String, FetchError> {
        Ok(self.fetch(url, ACCEPT_JSON, FetchKind::Listing).await?.text())
    }

    /// Downloads PDF bytes.
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch).
    pub async fn fetch_pdf(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        Ok(self.fetch(url, ACCEPT_PDF, FetchKind::Pdf).await?.body)
    }

    /// Fetches `url` with retry and User-Agent fallback.
    ///
    /// Each attempt first uses the minimal User-Agent; a 403 is retried once
    /// within the same attempt using [`BROWSER_USER_AGENT`]. Failed attempts,
    /// including a 403 that survives the fallback, are retried per the
    /// [`RetryPolicy`] with linear backoff.
    ///
    /// # Errors
    ///
    /// Returns the last [`FetchError`] once retries are exhausted or the failure
    /// is permanent.
    #[instrument(skip(self, accept), fields(url = %url, kind = ?kind))]
    pub async fn fetch(
        &self,
        url: &str,
        accept: &str,
        kind: FetchKind,
    ) -> Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::invalid_url(url));
        }
        let timeout = self.timeout_for(kind);

        let mut attempt = 1;
        loop {
            let error = match self.fetch_attempt(&parsed, accept, timeout).await {
                Ok(page) => return Ok(page),
                Err(error) => error,
            };

            match self.retry_policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next_attempt;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(attempt, reason = %reason, error = %error, "fetch failed");
                    return Err(error);
                }
            }
        }
    }

    fn timeout_for(&self, kind: FetchKind) -> Duration {
        match kind {
            FetchKind::Listing => self.timeouts.listing,
            FetchKind::Document => self.timeouts.document,
            FetchKind::Pdf => self.timeouts.pdf,
        }
    }

    async fn fetch_attempt(
        &self,
        url: &Url,
        accept: &str,
        timeout: Duration,
    ) -> Result<FetchedPage, FetchError> {
        match self.fetch_following_redirects(url, accept, timeout, None).await {
            Err(error) if error.is_forbidden() => {
                debug!(url = %url, "403 with default user-agent; retrying with browser user-agent");
                self.fetch_following_redirects(url, accept, timeout, Some(BROWSER_USER_AGENT))
                    .await
            }
            other => other,
        }
    }

    async fn fetch_following_redirects(
        &self,
        url: &Url,
        accept: &str,
        timeout: Duration,
        user_agent: Option<&str>,
    ) -> Result<FetchedPage, FetchError> {
        let mut current = url.clone();
        let mut redirects = 0;

        loop {
            let mut request = self
                .client
                .get(current.clone())
                .header(ACCEPT, accept)
                .timeout(timeout);
            if let Some(ua) = user_agent {
                request = request.header(USER_AGENT, ua);
            }

            let response = request
                .send()
                .await
                .map_err(|e| FetchError::network(current.as_str(), e))?;
            let status = response.status();

            if status.is_redirection() {
                let Some(location) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                else {
                    return Err(FetchError::http_status(current.as_str(), status.as_u16()));
                };
                if redirects == MAX_REDIRECTS {
                    return Err(FetchError::too_many_redirects(url.as_str(), MAX_REDIRECTS));
                }
                let next = current
                    .join(location)
                    .map_err(|_| FetchError::invalid_url(location))?;
                debug!(from = %current, to = %next, "following redirect");
                current = next;
                redirects += 1;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::http_status(current.as_str(), status.as_u16()));
            }

            let body = self.read_body(response, current.as_str()).await?;
            return Ok(FetchedPage { url: current, body });
        }
    }

    async fn read_body(&self, response: Response, url: &str) -> Result<Vec<u8>, FetchError> {
        let limit = self.max_body_bytes;
        if response.content_length().is_some_and(|length| length > limit) {
            return Err(FetchError::body_too_large(url, limit));
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::network(url, e))?;
            if body.len() as u64 + chunk.len() as u64 > limit {
                return Err(FetchError::body_too_large(url, limit));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts_per_call_site() {
        let timeouts = FetchTimeouts::default();
        assert_eq!(timeouts.listing, Duration::from_secs(30));
        assert_eq!(timeouts.document, Duration::from_secs(45));
        assert_eq!(timeouts.pdf, Duration::from_secs(60));
    }

    #[test]
    fn test_timeout_for_selects_by_kind() {
        let fetcher = HttpFetcher::new(FetchTimeouts::default()).unwrap();
        assert_eq!(fetcher.timeout_for(FetchKind::Pdf), Duration::from_secs(60));
        assert_eq!(
            fetcher.timeout_for(FetchKind::Document),
            Duration::from_secs(45)
        );
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_and_non_http_urls() {
        let fetcher = HttpFetcher::new(FetchTimeouts::default()).unwrap();
        let err = fetcher
            .fetch_html("not a url", FetchKind::Listing)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));

        let err = fetcher
            .fetch_html("ftp://example.com/policies", FetchKind::Listing)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn test_fetched_page_text_is_lossy() {
        let page = FetchedPage {
            url: Url::parse("https://example.com").unwrap(),
            body: vec![b'o', b'k', 0xff],
        };
        assert!(page.text().starts_with("ok"));
    }
}

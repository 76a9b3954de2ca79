//! Error types for the fetch module.
//!
//! Every variant carries the URL that failed so item-level failures can be
//! reported verbatim in an extraction result.

use thiserror::Error;

/// Errors that can occur while fetching a listing page or document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx, non-redirect response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Redirect chain exceeded the configured bound.
    #[error("too many redirects ({count}) fetching {url}")]
    TooManyRedirects {
        /// The URL originally requested.
        url: String,
        /// Number of redirects followed before giving up.
        count: usize,
    },

    /// The provided URL is malformed, or a redirect pointed somewhere unusable.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Response body exceeded the size cap.
    #[error("response body from {url} exceeds {limit} bytes\n  Suggestion: the link likely points at a bulk archive, not a policy document")]
    BodyTooLarge {
        /// The URL whose body was rejected.
        url: String,
        /// The cap in bytes.
        limit: u64,
    },

    /// HTTP client could not be constructed.
    #[error("HTTP client construction failed: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a redirect-bound error.
    pub fn too_many_redirects(url: impl Into<String>, count: usize) -> Self {
        Self::TooManyRedirects {
            url: url.into(),
            count,
        }
    }

    /// Creates a body-size error.
    pub fn body_too_large(url: impl Into<String>, limit: u64) -> Self {
        Self::BodyTooLarge {
            url: url.into(),
            limit,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns the HTTP status code when this is a status error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true when the server answered 403 Forbidden.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }
}

// No `From<reqwest::Error>`: every variant needs the URL, which the source
// error does not reliably carry.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display_and_accessor() {
        let error = FetchError::http_status("https://example.com/policy", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("https://example.com/policy"));
        assert_eq!(error.status(), Some(404));
        assert!(!error.is_forbidden());
    }

    #[test]
    fn test_forbidden_detection() {
        assert!(FetchError::http_status("https://example.com", 403).is_forbidden());
        assert!(!FetchError::timeout("https://example.com").is_forbidden());
    }

    #[test]
    fn test_too_many_redirects_display() {
        let error = FetchError::too_many_redirects("https://example.com/loop", 8);
        assert_eq!(
            error.to_string(),
            "too many redirects (8) fetching https://example.com/loop"
        );
    }

    #[test]
    fn test_body_too_large_display() {
        let error = FetchError::body_too_large("https://example.com/all.zip", 1024);
        let msg = error.to_string();
        assert!(msg.contains("exceeds 1024 bytes"), "got: {msg}");
        assert!(msg.contains("Suggestion:"));
    }

    #[test]
    fn test_timeout_has_no_status() {
        let error = FetchError::timeout("https://example.com/slow.pdf");
        assert!(error.to_string().contains("timeout"));
        assert_eq!(error.status(), None);
    }
}

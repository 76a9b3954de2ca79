//! Constants for the fetch module (timeouts, redirect bound, body cap, accept headers).

/// Maximum redirects followed before a fetch fails.
pub const MAX_REDIRECTS: usize = 8;

/// Largest response body accepted, checked against `Content-Length` and while reading.
pub const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Default connect timeout in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 15;

/// Default whole-request timeout for listing pages and BoardDocs API calls.
pub const LISTING_TIMEOUT_SECS: u64 = 30;

/// Default whole-request timeout for individual policy detail pages.
pub const DOCUMENT_TIMEOUT_SECS: u64 = 45;

/// Default whole-request timeout for PDF downloads.
pub const PDF_TIMEOUT_SECS: u64 = 60;

/// Accept header for HTML pages.
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Accept header for JSON endpoints.
pub const ACCEPT_JSON: &str = "application/json, text/javascript, */*;q=0.1";

/// Accept header for PDF downloads.
pub const ACCEPT_PDF: &str = "application/pdf,application/octet-stream;q=0.9,*/*;q=0.8";

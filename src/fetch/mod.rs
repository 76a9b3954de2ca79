//! HTTP fetching for listing pages, policy documents and PDFs.
//!
//! # Features
//!
//! - Manual redirect following with a bounded hop count
//! - Per-call-site request timeouts (listing, document, PDF)
//! - 403 fallback to a browser User-Agent within each attempt
//! - Linear-backoff retry for transient failures
//! - Typed status errors so callers can tell 403 from 404 from 5xx
//!
//! # Example
//!
//! ```no_run
//! use policy_scraper_core::fetch::{FetchKind, FetchTimeouts, HttpFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new(FetchTimeouts::default())?;
//! let page = fetcher
//!     .fetch_html("https://example.org/policies", FetchKind::Listing)
//!     .await?;
//! println!("{} bytes from {}", page.body.len(), page.url);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod retry;

pub use client::{FetchKind, FetchTimeouts, FetchedPage, HttpFetcher};
pub use error::FetchError;
pub use retry::{DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error};

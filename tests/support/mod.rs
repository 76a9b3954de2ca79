#![allow(dead_code)]

pub mod socket_guard;

use policy_scraper_core::fetch::RetryPolicy;
use policy_scraper_core::{FetchTimeouts, HttpFetcher};

/// Fetcher that retries without sleeping.
pub fn test_fetcher() -> HttpFetcher {
    HttpFetcher::new(FetchTimeouts::default())
        .expect("client should build")
        .with_retry_policy(RetryPolicy::immediate(3))
}

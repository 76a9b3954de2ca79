//! Shared User-Agent strings for fetcher traffic.
//!
//! The first attempt of every request identifies the tool with a minimal
//! User-Agent. Some district sites gate non-browser clients with 403, in which
//! case the fetcher retries once with [`BROWSER_USER_AGENT`].

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/policy-scraper";

/// Browser User-Agent used as fallback when servers return 403.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Minimal User-Agent sent on the first attempt of every request.
#[must_use]
pub(crate) fn default_fetch_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("policy-scraper/{version} (+{PROJECT_UA_URL})")
}

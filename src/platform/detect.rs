use tracing::debug;
use url::Url;

use super::Platform;
use crate::source::utils::canonical_host;
use crate::source::{find_listing_table, looks_like_accordion_listing};

const BOARDDOCS_HOST: &str = "boarddocs.com";

/// Classifies a listing from its URL alone.
///
/// Only BoardDocs is recognizable this way: a `boarddocs.com` host (or
/// subdomain) or a path segment ending in `.nsf`.
#[must_use]
pub fn detect_from_url(url: &Url) -> Option<Platform> {
    let host = url.host_str().map(canonical_host).unwrap_or_default();
    let vendor_host = host == BOARDDOCS_HOST || host.ends_with(".boarddocs.com");
    let nsf_path = url.path_segments().is_some_and(|mut segments| {
        segments.any(|segment| segment.to_ascii_lowercase().ends_with(".nsf"))
    });
    (vendor_host || nsf_path).then_some(Platform::BoardDocs)
}

/// Classifies a fetched listing page.
///
/// Accordion markup is checked before tables, because accordion pages often
/// carry layout tables too. Anything non-blank that matches neither is
/// treated as table-link. Returns `None` for a blank body.
#[must_use]
pub fn detect_from_html(html: &str, listing_url: &Url) -> Option<Platform> {
    if html.trim().is_empty() {
        return None;
    }
    if looks_like_accordion_listing(html, listing_url) {
        debug!(url = %listing_url, "accordion listing detected");
        return Some(Platform::AccordionPdf);
    }
    if find_listing_table(html).is_some() {
        debug!(url = %listing_url, "policy listing table detected");
    } else {
        debug!(url = %listing_url, "no platform markers, defaulting to table-link");
    }
    Some(Platform::TableLink)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_url_heuristic_recognizes_boarddocs() {
        assert_eq!(
            detect_from_url(&url("https://go.boarddocs.com/ar/district/Board.nsf/Public")),
            Some(Platform::BoardDocs)
        );
        assert_eq!(
            detect_from_url(&url("https://intranet.example.org/apps/Policy.NSF/vpublic")),
            Some(Platform::BoardDocs)
        );
        assert_eq!(detect_from_url(&url("https://district.example/policies")), None);
        assert_eq!(detect_from_url(&url("https://notboarddocs.com/x")), None);
    }

    #[test]
    fn test_accordion_checked_before_table() {
        let html = r#"<table><tr><th>Name of Policy</th></tr></table>
            <details><summary>Series 1000</summary><a href="/p/1.01.pdf">1.01 Mission</a></details>"#;
        assert_eq!(
            detect_from_html(html, &url("https://district.example/")),
            Some(Platform::AccordionPdf)
        );
    }

    #[test]
    fn test_table_and_default_both_map_to_table_link() {
        let base = url("https://district.example/");
        let table = r#"<table><tr><th>Name of Policy</th></tr><tr><td><a href="/a">1.01 A</a></td></tr></table>"#;
        assert_eq!(detect_from_html(table, &base), Some(Platform::TableLink));
        assert_eq!(detect_from_html("<p>Welcome</p>", &base), Some(Platform::TableLink));
    }

    #[test]
    fn test_blank_listing_is_undetermined() {
        assert_eq!(detect_from_html("  \n ", &url("https://district.example/")), None);
    }
}

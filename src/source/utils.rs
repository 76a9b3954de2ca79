//! Shared utilities for source modules: host normalization, URL keys, text
//! cleanup and the policy code/title split.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Leading policy code followed by an optional separator and the title.
///
/// Matches `1.01 Dress Code`, `BP 5131 - Conduct`, `2.10A Attendance` and
/// `1000. Concepts`. A letter suffix is only taken when it ends a word.
static CODE_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"^\s*((?:[A-Z]{1,4}[\s-]?)?\d+(?:[.\-]\d+)*(?:[A-Za-z]\b)?)\s*(?:[-–—:.]\s*)?(.*)$",
    )
});

/// Visible text that starts like a policy number (`2.10`, `4000`, `1.01A`).
static POLICY_NUMBER_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^\s*\d+(?:\.\d+)*[A-Za-z]?\b"));

/// Normalizes a host string: trim, strip leading "www.", trailing '.', and lowercases.
#[must_use]
pub fn canonical_host(host: &str) -> String {
    host.trim()
        .trim_start_matches("www.")
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Returns true if the two host strings refer to the same host after normalization.
#[must_use]
pub fn hosts_match(lhs: &str, rhs: &str) -> bool {
    canonical_host(lhs) == canonical_host(rhs)
}

/// Resolves a possibly relative href against a base URL.
///
/// Fragment-only, `javascript:` and `mailto:` hrefs resolve to nothing.
#[must_use]
pub fn absolutize_url(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:") || lowered.starts_with("mailto:") {
        return None;
    }
    let resolved = base_url.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

/// Deduplication key for a document URL.
///
/// Lowercases scheme and host, drops the fragment, percent-decodes the path and
/// strips a trailing slash, so `/Policy%202.10.pdf` and `/Policy 2.10.pdf` and
/// `/policies/` vs `/policies` collapse to one key.
#[must_use]
pub fn normalized_url_key(url: &Url) -> String {
    let host = url.host_str().map(canonical_host).unwrap_or_default();
    let decoded = urlencoding::decode(url.path())
        .map_or_else(|_| url.path().to_string(), std::borrow::Cow::into_owned);
    let path = decoded.trim_end_matches('/');
    let mut key = format!("{}://{host}{path}", url.scheme().to_ascii_lowercase());
    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        key.push('?');
        key.push_str(query);
    }
    key
}

/// True when the URL path ends in a PDF extension.
#[must_use]
pub fn is_pdf_url(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}

/// Collapses runs of whitespace (including NBSP) to single spaces and trims.
#[must_use]
pub fn normalize_space(text: &str) -> String {
    strip_icon_glyphs(text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Removes private-use-area characters that icon fonts render as glyphs.
#[must_use]
pub fn strip_icon_glyphs(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(*c as u32, 0xE000..=0xF8FF | 0xF0000..=0xFFFFD | 0x100000..=0x10FFFD))
        .filter(|c| *c != '\u{200b}' && *c != '\u{feff}')
        .collect()
}

/// Splits `"1.01 Dress Code"` into `("1.01", "Dress Code")`.
///
/// Text without a leading code comes back as `("", text)`.
#[must_use]
pub fn split_code_title(text: &str) -> (String, String) {
    let text = normalize_space(text);
    match CODE_TITLE_RE.captures(&text) {
        Some(caps) => {
            let code = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
            let title = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
            (code, title)
        }
        None => (String::new(), text),
    }
}

/// True when visible link text starts like a policy number.
#[must_use]
pub fn starts_with_policy_number(text: &str) -> bool {
    POLICY_NUMBER_PREFIX_RE.is_match(text)
}

/// Chapter part of a dotted policy number (`"1.01"` → `"1"`).
#[must_use]
pub fn chapter_of(code: &str) -> String {
    match code.split_once('.') {
        Some((chapter, _)) if chapter.chars().all(|c| c.is_ascii_digit()) => chapter.to_string(),
        _ => String::new(),
    }
}

/// Removes consecutive duplicates in place, comparing trimmed text.
pub fn dedup_adjacent(values: &mut Vec<String>) {
    values.dedup_by(|next, prev| next.trim() == prev.trim());
}

/// Returns the first non-empty trimmed candidate.
#[must_use]
pub fn first_non_empty<'a>(candidates: impl IntoIterator<Item = &'a str>) -> String {
    candidates
        .into_iter()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_split_code_title_variants() {
        assert_eq!(
            split_code_title("1.01 Dress Code"),
            ("1.01".to_string(), "Dress Code".to_string())
        );
        assert_eq!(
            split_code_title("  2.10A   Attendance "),
            ("2.10A".to_string(), "Attendance".to_string())
        );
        assert_eq!(
            split_code_title("2.10Attendance"),
            ("2.10".to_string(), "Attendance".to_string())
        );
        assert_eq!(
            split_code_title("BP 5131 - Student Conduct"),
            ("BP 5131".to_string(), "Student Conduct".to_string())
        );
        assert_eq!(
            split_code_title("1000. Concepts and Roles"),
            ("1000".to_string(), "Concepts and Roles".to_string())
        );
    }

    #[test]
    fn test_split_code_title_without_code() {
        assert_eq!(
            split_code_title("Table of Contents"),
            (String::new(), "Table of Contents".to_string())
        );
    }

    #[test]
    fn test_normalized_url_key_collapses_encodings() {
        let a = Url::parse("https://WWW.District.org/docs/Policy%202.10.pdf#page=2").unwrap();
        let b = Url::parse("https://district.org/docs/Policy 2.10.pdf").unwrap();
        assert_eq!(normalized_url_key(&a), normalized_url_key(&b));

        let c = Url::parse("https://district.org/policies/").unwrap();
        let d = Url::parse("https://district.org/policies").unwrap();
        assert_eq!(normalized_url_key(&c), normalized_url_key(&d));
    }

    #[test]
    fn test_absolutize_url_rejects_non_navigational_hrefs() {
        let base = Url::parse("https://district.org/policies/index.html").unwrap();
        assert_eq!(
            absolutize_url("../page/12", &base).unwrap().as_str(),
            "https://district.org/page/12"
        );
        assert!(absolutize_url("#top", &base).is_none());
        assert!(absolutize_url("javascript:void(0)", &base).is_none());
        assert!(absolutize_url("mailto:board@district.org", &base).is_none());
    }

    #[test]
    fn test_normalize_space_strips_icons_and_nbsp() {
        assert_eq!(normalize_space("\u{f0c1}  Dress\u{a0}\n Code "), "Dress Code");
        assert_eq!(normalize_space("\u{e900}"), "");
    }

    #[test]
    fn test_policy_number_prefix_and_chapter() {
        assert!(starts_with_policy_number("2.10 Attendance"));
        assert!(starts_with_policy_number("4000 Series Overview"));
        assert!(!starts_with_policy_number("Download"));
        assert_eq!(chapter_of("1.01"), "1");
        assert_eq!(chapter_of("BP 5131"), "");
    }

    #[test]
    fn test_dedup_adjacent_keeps_non_adjacent_repeats() {
        let mut values = vec![
            "Purpose".to_string(),
            "Purpose ".to_string(),
            "Body".to_string(),
            "Purpose".to_string(),
        ];
        dedup_adjacent(&mut values);
        assert_eq!(values, ["Purpose", "Body", "Purpose"]);
    }
}

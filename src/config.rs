//! Request options and source-URL normalization.

use url::Url;

use crate::fetch::FetchTimeouts;
use crate::platform::PlatformHint;
use crate::source::ExtractError;

/// Minimum number of documents fetched at once.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum number of documents fetched at once.
pub const MAX_CONCURRENCY: usize = 12;

/// Concurrency used when the caller does not override it.
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Caller-tunable options for one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Platform selection; `Auto` runs detection.
    pub platform: PlatformHint,
    /// BoardDocs: extract every book instead of only the policy manual.
    pub include_all_books: bool,
    /// Documents in flight at once, already clamped.
    pub concurrency: usize,
    /// Request timeouts.
    pub timeouts: FetchTimeouts,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            platform: PlatformHint::Auto,
            include_all_books: false,
            concurrency: DEFAULT_CONCURRENCY,
            timeouts: FetchTimeouts::default(),
        }
    }
}

impl ExtractOptions {
    /// Sets the concurrency, clamping it into the supported range.
    #[must_use]
    pub fn with_concurrency(mut self, requested: Option<usize>) -> Self {
        self.concurrency = clamp_concurrency_override(requested);
        self
    }
}

/// Clamps a concurrency override to `[MIN_CONCURRENCY, MAX_CONCURRENCY]`;
/// `None` selects [`DEFAULT_CONCURRENCY`].
#[must_use]
pub fn clamp_concurrency_override(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_CONCURRENCY)
        .clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

/// Parses a caller-supplied platform hint.
///
/// # Errors
///
/// Returns [`ExtractError::UnknownPlatform`] for unrecognized identifiers.
pub fn parse_platform_hint(raw: &str) -> Result<PlatformHint, ExtractError> {
    raw.parse::<PlatformHint>()
        .map_err(|message| ExtractError::UnknownPlatform { message })
}

/// Normalizes a user-supplied source URL.
///
/// Schemeless input gets `https://`. Only http(s) URLs with a host are
/// accepted.
///
/// # Errors
///
/// Returns [`ExtractError::MissingUrl`] for blank input and
/// [`ExtractError::InvalidUrl`] when the URL cannot be parsed or is not a web
/// address.
pub fn normalize_source_url(raw: &str) -> Result<Url, ExtractError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ExtractError::MissingUrl);
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).map_err(|e| ExtractError::invalid_url(trimmed, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ExtractError::invalid_url(
            trimmed,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ExtractError::invalid_url(trimmed, "URL has no host"));
    }
    Ok(url)
}

/// A validated extraction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    /// Normalized listing URL.
    pub url: Url,
    /// Request options.
    pub options: ExtractOptions,
}

impl ExtractRequest {
    /// Validates the URL and bundles it with the options.
    ///
    /// # Errors
    ///
    /// See [`normalize_source_url`].
    pub fn new(raw_url: &str, options: ExtractOptions) -> Result<Self, ExtractError> {
        Ok(Self {
            url: normalize_source_url(raw_url)?,
            options,
        })
    }
}

//! Error types for extraction requests.
//!
//! Request-level errors follow the What/Why/Fix layout used across the project:
//! the message names the failing input, the reason, and a suggestion where one
//! exists. Item-level failures reuse the same type but are only ever rendered
//! into a failure reason string.

use thiserror::Error;

use crate::fetch::FetchError;

/// Errors that can occur while extracting policies from a listing.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No source URL was supplied.
    #[error("missing source URL\n  Suggestion: Pass the district's policy listing URL")]
    MissingUrl,

    /// The source URL could not be parsed.
    #[error("invalid source URL '{input}': {reason}\n  Suggestion: {suggestion}")]
    InvalidUrl {
        /// The raw input.
        input: String,
        /// Why it was rejected.
        reason: String,
        /// How to fix it.
        suggestion: String,
    },

    /// The caller's platform hint is not recognized.
    #[error("{message}")]
    UnknownPlatform {
        /// Parse failure message.
        message: String,
    },

    /// Auto-detection could not classify the listing.
    #[error(
        "could not determine the publishing platform for '{url}': {reason}\n  Suggestion: Pass an explicit platform hint"
    )]
    UndeterminedPlatform {
        /// Listing URL.
        url: String,
        /// Why detection failed.
        reason: String,
    },

    /// A listing-level or document-level fetch failed after retries.
    #[error("failed to fetch {what}: {source}")]
    Fetch {
        /// What was being fetched ("listing", "policy books", ...).
        what: String,
        /// The underlying transport error.
        #[source]
        source: FetchError,
    },

    /// The listing parsed but produced no document references.
    #[error("no policy links found on '{url}': {reason}")]
    NoReferences {
        /// Listing URL.
        url: String,
        /// What was missing.
        reason: String,
    },

    /// A fetched payload could not be parsed.
    #[error("could not parse {what}: {reason}")]
    Parse {
        /// What was being parsed.
        what: String,
        /// Why parsing failed.
        reason: String,
    },

    /// PDF text conversion failed.
    #[error("PDF text extraction failed for {url}: {reason}")]
    Pdf {
        /// PDF URL.
        url: String,
        /// Why conversion failed.
        reason: String,
    },

    /// The document yielded neither a title nor any wording.
    #[error("no title or wording recovered from {url}")]
    EmptyDocument {
        /// Document URL.
        url: String,
    },

    /// Every discovered reference failed.
    #[error(
        "no rows extracted: all {discovered} discovered policies failed (first failure: {first_reason})"
    )]
    NoRowsExtracted {
        /// References discovered on the listing.
        discovered: usize,
        /// Reason recorded for the first failed reference.
        first_reason: String,
    },

    /// HTTP client could not be constructed.
    #[error("HTTP client setup failed: {source}")]
    ClientBuild {
        /// Underlying fetch error.
        #[source]
        source: FetchError,
    },
}

impl ExtractError {
    /// Creates an `InvalidUrl` error.
    #[must_use]
    pub fn invalid_url(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.to_string(),
            reason: reason.into(),
            suggestion: "Use a full http(s) URL such as https://district.example/policies"
                .to_string(),
        }
    }

    /// Creates an `UndeterminedPlatform` error.
    #[must_use]
    pub fn undetermined(url: &str, reason: impl Into<String>) -> Self {
        Self::UndeterminedPlatform {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Wraps a transport failure with what was being fetched.
    #[must_use]
    pub fn fetch(what: impl Into<String>, source: FetchError) -> Self {
        Self::Fetch {
            what: what.into(),
            source,
        }
    }

    /// Creates a `NoReferences` error.
    #[must_use]
    pub fn no_references(url: &str, reason: impl Into<String>) -> Self {
        Self::NoReferences {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `Parse` error.
    #[must_use]
    pub fn parse(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Pdf` error.
    #[must_use]
    pub fn pdf(url: &str, reason: impl Into<String>) -> Self {
        Self::Pdf {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// HTTP status of the underlying fetch failure, if any.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Fetch { source, .. } | Self::ClientBuild { source } => source.status(),
            _ => None,
        }
    }
}

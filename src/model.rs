//! Request-scoped data model: document references, policy records and the
//! aggregated extraction result.

use std::fmt;

use serde::Serialize;

use crate::platform::Platform;

/// Where a document lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceTarget {
    /// Absolute URL of a detail page or PDF.
    Url(String),
    /// Opaque platform item identifier (BoardDocs unique id).
    ItemId(String),
}

impl fmt::Display for ReferenceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::ItemId(id) => write!(f, "item:{id}"),
        }
    }
}

/// Platform context carried from the listing to the extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceHints {
    /// BoardDocs book name.
    pub book: Option<String>,
    /// Section heading inherited from the navigation tree.
    pub section: Option<String>,
    /// BoardDocs status partition label.
    pub status: Option<String>,
    /// Accordion series label.
    pub series: Option<String>,
}

/// A pointer to one policy document discovered on a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingReference {
    /// URL or item id.
    pub target: ReferenceTarget,
    /// Deduplication key.
    pub canonical_key: String,
    /// Title to use when the document does not state one.
    pub fallback_title: String,
    /// Policy code to use when the document does not state one.
    pub fallback_code: String,
    /// Platform-specific context.
    pub hints: ReferenceHints,
}

impl ListingReference {
    /// Creates a reference with empty fallbacks and hints.
    #[must_use]
    pub fn new(target: ReferenceTarget, canonical_key: impl Into<String>) -> Self {
        Self {
            target,
            canonical_key: canonical_key.into(),
            fallback_title: String::new(),
            fallback_code: String::new(),
            hints: ReferenceHints::default(),
        }
    }

    /// Sets the fallback code and title.
    #[must_use]
    pub fn with_fallbacks(mut self, code: impl Into<String>, title: impl Into<String>) -> Self {
        self.fallback_code = code.into();
        self.fallback_title = title.into();
        self
    }

    /// Sets the platform hints.
    #[must_use]
    pub fn with_hints(mut self, hints: ReferenceHints) -> Self {
        self.hints = hints;
        self
    }
}

impl fmt::Display for ListingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.target.fmt(f)
    }
}

/// Platform-specific metadata attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "platform", rename_all = "kebab-case")]
pub enum PolicyMetadata {
    /// BoardDocs book and item id.
    #[serde(rename = "boarddocs")]
    BoardDocs {
        /// Book the policy belongs to.
        book: String,
        /// Unique item id.
        item_id: String,
    },
    /// Table-linked metadata table columns.
    TableLink {
        /// "Statutory Authority" column.
        statutory_authority: String,
        /// "Law(s) Implemented" column.
        laws_implemented: String,
        /// "History" column.
        history: String,
        /// "Notes" column.
        notes: String,
    },
    /// Accordion-PDF anchored blocks.
    AccordionPdf {
        /// "REVISION HISTORY:" block.
        revision_history: String,
        /// "Legal References:" block.
        legal_references: String,
        /// "Cross References:" block.
        cross_references: String,
    },
}

/// One extracted policy.
///
/// Dates are kept as the source wrote them; formats vary too much between
/// districts to normalize safely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyRecord {
    /// Section, chapter or series.
    pub section: String,
    /// Policy code or number.
    pub code: String,
    /// Policy title.
    pub title: String,
    /// Status label (BoardDocs only).
    pub status: String,
    /// Adoption date as written.
    pub adopted_date: String,
    /// Last revision date as written.
    pub revised_date: String,
    /// Policy body.
    pub wording: String,
    /// Page or PDF the record was extracted from.
    pub source_url: String,
    /// Platform-specific fields.
    pub metadata: PolicyMetadata,
}

impl PolicyRecord {
    /// True when the record has neither a title nor a body worth keeping.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.wording.trim().is_empty()
    }
}

/// A discovered reference that did not produce a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    /// The reference that failed.
    pub reference: ListingReference,
    /// Human-readable failure reason.
    pub reason: String,
}

/// Counts for a caller-facing summary line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    /// Rows produced.
    pub rows: usize,
    /// References discovered on the listing.
    pub discovered: usize,
    /// References that failed.
    pub failed: usize,
}

impl fmt::Display for ExtractionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "extracted {} of {} discovered policies ({} failed)",
            self.rows, self.discovered, self.failed
        )
    }
}

/// Outcome of one extraction request.
///
/// Serializes to JSON for callers that persist or forward the result.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    /// Normalized source URL supplied by the caller.
    pub base_url: String,
    /// Listing URL actually crawled (after redirects).
    pub listing_url: String,
    /// Platform the listing was handled as.
    pub platform: Platform,
    /// Successfully extracted records, in listing order.
    pub rows: Vec<PolicyRecord>,
    /// Number of references discovered on the listing.
    pub discovered_count: usize,
    /// References that failed, with reasons.
    pub failed_items: Vec<FailedItem>,
}

impl ExtractionResult {
    /// Counts for a summary line.
    #[must_use]
    pub fn summary(&self) -> ExtractionSummary {
        ExtractionSummary {
            rows: self.rows.len(),
            discovered: self.discovered_count,
            failed: self.failed_items.len(),
        }
    }

    /// Sorts rows by section, code and title for stable output.
    pub fn sort_rows(&mut self) {
        self.rows.sort_by(|a, b| {
            (&a.section, &a.code, &a.title).cmp(&(&b.section, &b.code, &b.title))
        });
    }

    /// Renders the rows as CSV using this platform's column schema.
    #[must_use]
    pub fn to_csv(&self) -> String {
        crate::export::to_csv(self.platform, &self.rows)
    }

    /// Suggested download filename for the CSV.
    #[must_use]
    pub fn filename(&self, date: chrono::NaiveDate) -> String {
        crate::export::export_filename(&self.base_url, self.platform, date)
    }
}

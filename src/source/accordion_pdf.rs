//! Accordion-PDF platform: collapsible "Series N" panels linking to one PDF per
//! policy, hosted on the district site or in cloud storage.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::error::ExtractError;
use super::html::{compile_static_selector, element_text};
use super::pdf_fields::parse_policy_text;
use super::utils::{
    absolutize_url, compile_static_regex, first_non_empty, is_pdf_url, normalized_url_key,
    split_code_title, starts_with_policy_number,
};
use super::{Discovery, Listing, PolicySource};
use crate::fetch::HttpFetcher;
use crate::model::{
    ListingReference, PolicyMetadata, PolicyRecord, ReferenceHints, ReferenceTarget,
};
use crate::pdf::PdfTextEngine;
use crate::platform::Platform;

/// `Series N` section heading, capturing the number and the remainder.
static SERIES_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?i)^\s*series\s+(\d+)\b\s*[-–—:.]?\s*(.*)$"));

/// Cloud file id in a `/file/d/<id>/...` path.
static DRIVE_FILE_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"/file/d/([A-Za-z0-9_-]{10,})"));

/// Cloud storage hosts whose file links are followed.
const CLOUD_HOSTS: &[&str] = &["drive.google.com", "docs.google.com"];

/// Class fragments that identify accordion markup.
const ACCORDION_CLASS_HINTS: &[&str] = &["accordion", "collapse", "toggle", "panel", "tab-"];

/// One accordion panel and its candidate documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccordionSection {
    /// Heading text as shown.
    pub heading: String,
    /// Series label with the `Series N` prefix removed.
    pub series: String,
    /// `(href, link text)` pairs in panel order, unresolved.
    pub links: Vec<(String, String)>,
}

/// Source for accordion listings of policy PDFs.
#[derive(Debug, Clone)]
pub struct AccordionPdfSource {
    fetcher: HttpFetcher,
}

impl AccordionPdfSource {
    /// Creates a source using `fetcher` for every request.
    #[must_use]
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl PolicySource for AccordionPdfSource {
    fn platform(&self) -> Platform {
        Platform::AccordionPdf
    }

    #[instrument(skip(self, listing), fields(url = %listing.url))]
    async fn discover(&self, listing: &Listing) -> Result<Discovery, ExtractError> {
        let page = listing.page_or_fetch(&self.fetcher).await?;
        let references = parse_listing(&page.text(), &page.url)?;
        debug!(count = references.len(), "accordion references discovered");
        Ok(Discovery {
            listing_url: page.url,
            references,
        })
    }

    #[instrument(skip(self, reference), fields(item = %reference))]
    async fn extract_one(&self, reference: &ListingReference) -> Result<PolicyRecord, ExtractError> {
        let ReferenceTarget::Url(url) = &reference.target else {
            return Err(ExtractError::parse(
                "accordion reference",
                format!("expected a PDF URL, got {}", reference.target),
            ));
        };
        let bytes = self
            .fetcher
            .fetch_pdf(url)
            .await
            .map_err(|e| ExtractError::fetch("policy PDF", e))?;
        let text = PdfTextEngine::global()
            .await
            .extract_text(bytes)
            .await
            .map_err(|e| ExtractError::pdf(url, e.to_string()))?;
        build_record(&text, reference, url)
    }
}

/// Series label for a heading: the text after `Series N`, or `Series N`
/// itself when nothing follows.
#[must_use]
pub fn series_label(heading: &str) -> Option<String> {
    let caps = SERIES_HEADING_RE.captures(heading)?;
    let number = caps.get(1)?.as_str();
    let rest = caps.get(2).map_or("", |m| m.as_str()).trim();
    Some(if rest.is_empty() {
        format!("Series {number}")
    } else {
        rest.to_string()
    })
}

/// Walks the listing in document order, grouping links under the most recent
/// `Series N` heading.
///
/// Returns nothing unless the page carries accordion markup (`<details>`, an
/// accordion/collapse class, or `aria-expanded` toggles).
#[must_use]
pub fn accordion_sections(html: &str) -> Vec<AccordionSection> {
    static NODES: LazyLock<Selector> = LazyLock::new(|| {
        compile_static_selector(
            "h1, h2, h3, h4, h5, h6, summary, button, a, [role=tab], [class*=accordion-title], \
             [class*=accordion-header], [class*=panel-title], [class*=toggle]",
        )
    });

    let document = Html::parse_document(html);
    if !has_accordion_markup(&document) {
        return Vec::new();
    }

    let mut sections: Vec<AccordionSection> = Vec::new();
    // Links after a non-series heading belong to no section.
    let mut open = false;
    for element in document.select(&NODES) {
        let text = element_text(element);
        let is_anchor = element.value().name() == "a";
        let href = element.value().attr("href").map(str::trim);
        let is_toggle_link = href.is_none_or(|h| h.is_empty() || h.starts_with('#'));

        if !is_anchor || is_toggle_link {
            if let Some(series) = series_label(&text) {
                if sections.last().is_none_or(|s| s.heading != text) {
                    sections.push(AccordionSection {
                        heading: text,
                        series,
                        links: Vec::new(),
                    });
                }
                open = true;
            } else if !is_anchor && !text.is_empty() {
                open = false;
            }
            continue;
        }
        if let (true, Some(section), Some(href)) = (open, sections.last_mut(), href) {
            section.links.push((href.to_string(), text));
        }
    }
    sections
}

fn has_accordion_markup(document: &Html) -> bool {
    static MARKUP: LazyLock<Selector> =
        LazyLock::new(|| compile_static_selector("details, [aria-expanded], [data-toggle], [data-bs-toggle], [class]"));
    document.select(&MARKUP).any(|element| {
        let value = element.value();
        if value.name() == "details"
            || value.attr("aria-expanded").is_some()
            || value.attr("data-toggle").is_some()
            || value.attr("data-bs-toggle").is_some()
        {
            return true;
        }
        value.attr("class").is_some_and(|class| {
            let class = class.to_ascii_lowercase();
            ACCORDION_CLASS_HINTS.iter().any(|hint| class.contains(hint))
        })
    })
}

/// A candidate document link and its dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    /// URL to download.
    pub download_url: String,
    /// Cloud file id or normalized URL.
    pub canonical_key: String,
}

/// Classifies a resolved link as a policy document.
///
/// PDF links always qualify; cloud-storage file links qualify only when their
/// text starts like a policy number.
#[must_use]
pub fn document_link(url: &Url, link_text: &str) -> Option<DocumentLink> {
    if let Some(file_id) = cloud_file_id(url) {
        if !starts_with_policy_number(link_text) {
            return None;
        }
        return Some(DocumentLink {
            download_url: format!("https://drive.google.com/uc?export=download&id={file_id}"),
            canonical_key: format!("gdrive:{file_id}"),
        });
    }
    is_pdf_url(url).then(|| DocumentLink {
        download_url: url.to_string(),
        canonical_key: normalized_url_key(url),
    })
}

/// File id of a cloud file-view or direct-download link.
#[must_use]
pub fn cloud_file_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    if !CLOUD_HOSTS.contains(&host.as_str()) {
        return None;
    }
    if let Some(caps) = DRIVE_FILE_PATH_RE.captures(url.path()) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    let path = url.path().trim_end_matches('/');
    if path.ends_with("/uc") || path.ends_with("/open") {
        return url
            .query_pairs()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.into_owned())
            .filter(|id| !id.is_empty());
    }
    None
}

/// True when the listing looks like an accordion of policy documents.
#[must_use]
pub fn looks_like_accordion_listing(html: &str, listing_url: &Url) -> bool {
    accordion_sections(html).iter().any(|section| {
        section.links.iter().any(|(href, text)| {
            absolutize_url(href, listing_url).is_some_and(|url| document_link(&url, text).is_some())
        })
    })
}

/// Parses the listing into PDF references.
///
/// # Errors
///
/// Returns [`ExtractError::NoReferences`] when no series section yields a
/// document link.
pub fn parse_listing(html: &str, listing_url: &Url) -> Result<Vec<ListingReference>, ExtractError> {
    let sections = accordion_sections(html);
    if sections.is_empty() {
        return Err(ExtractError::no_references(
            listing_url.as_str(),
            "no accordion sections with 'Series N' headings",
        ));
    }

    let mut seen = HashSet::new();
    let mut references = Vec::new();
    for section in &sections {
        for (href, text) in &section.links {
            let Some(url) = absolutize_url(href, listing_url) else {
                continue;
            };
            let Some(link) = document_link(&url, text) else {
                continue;
            };
            if !seen.insert(link.canonical_key.clone()) {
                continue;
            }
            let (code, title) = split_code_title(text);
            references.push(
                ListingReference::new(ReferenceTarget::Url(link.download_url), link.canonical_key)
                    .with_fallbacks(code, title)
                    .with_hints(ReferenceHints {
                        section: Some(section.heading.clone()),
                        series: Some(section.series.clone()),
                        ..ReferenceHints::default()
                    }),
            );
        }
    }

    if references.is_empty() {
        return Err(ExtractError::no_references(
            listing_url.as_str(),
            format!("{} series section(s) but no PDF or cloud file links", sections.len()),
        ));
    }
    Ok(references)
}

fn build_record(
    text: &str,
    reference: &ListingReference,
    source_url: &str,
) -> Result<PolicyRecord, ExtractError> {
    let fields = parse_policy_text(text);
    let record = PolicyRecord {
        section: first_non_empty([
            fields.series.as_str(),
            reference.hints.series.as_deref().unwrap_or_default(),
        ]),
        code: first_non_empty([
            fields.board_policy_number.as_str(),
            reference.fallback_code.as_str(),
        ]),
        title: first_non_empty([fields.title.as_str(), reference.fallback_title.as_str()]),
        status: String::new(),
        adopted_date: fields.adopted_date,
        revised_date: fields.revised_date,
        wording: fields.wording,
        source_url: source_url.to_string(),
        metadata: PolicyMetadata::AccordionPdf {
            revision_history: fields.revision_history,
            legal_references: fields.legal_references,
            cross_references: fields.cross_references,
        },
    };
    if record.is_blank() {
        return Err(ExtractError::EmptyDocument {
            url: source_url.to_string(),
        });
    }
    Ok(record)
}

//! BoardDocs-style vendor backend.
//!
//! Discovery is a small protocol against the district's `.nsf` application:
//!
//! 1. `BD-GetPolicyBooks` lists the policy books (JSON).
//! 2. One or more books are selected (see [`select_books`]).
//! 3. `BD-GetPolicies?book=..&filter=..` returns the navigation tree (HTML)
//!    once per status partition: active, other, retired.
//! 4. Navigation items are flattened and deduplicated by their unique id.
//!
//! Each item is then fetched from `BD-GetPolicyItem?id=..`.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::ExtractError;
use super::html::{compile_static_selector, element_text, is_heading_tag};
use super::utils::{first_non_empty, normalize_space, split_code_title};
use super::{Discovery, Listing, PolicySource};
use crate::fetch::{FetchKind, HttpFetcher};
use crate::model::{
    ListingReference, PolicyMetadata, PolicyRecord, ReferenceHints, ReferenceTarget,
};
use crate::platform::Platform;

/// Book name selected by default.
const DEFAULT_BOOK: &str = "Policy Manual";

/// Status partitions queried per book: `(filter value, label)`.
const STATUS_PARTITIONS: [(&str, &str); 3] = [
    ("active", "Active"),
    ("other", "Under Consideration"),
    ("retired", "Retired"),
];

/// Selector for the policy body container, most specific first.
const CONTENT_CONTAINERS: &str =
    "#policy-content, .policy-content, #view-policy-item-content, .policy-body, #policy-body";

/// A policy book as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyBook {
    /// Identifier passed back in navigation requests.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Source for BoardDocs-style districts.
#[derive(Debug, Clone)]
pub struct BoardDocsSource {
    fetcher: HttpFetcher,
    include_all_books: bool,
}

impl BoardDocsSource {
    /// Creates a source; `include_all_books` disables book selection.
    #[must_use]
    pub fn new(fetcher: HttpFetcher, include_all_books: bool) -> Self {
        Self {
            fetcher,
            include_all_books,
        }
    }

    async fn fetch_navigation(
        &self,
        nsf_base: &Url,
        book: &PolicyBook,
        filter: &str,
    ) -> Result<String, ExtractError> {
        let url = endpoint(nsf_base, "BD-GetPolicies", &[("book", &book.id), ("filter", filter)])?;
        let page = self
            .fetcher
            .fetch_html(url.as_str(), FetchKind::Listing)
            .await
            .map_err(|e| ExtractError::fetch(format!("navigation for book '{}'", book.name), e))?;
        Ok(page.text())
    }
}

#[async_trait]
impl PolicySource for BoardDocsSource {
    fn platform(&self) -> Platform {
        Platform::BoardDocs
    }

    #[instrument(skip(self, listing), fields(url = %listing.url))]
    async fn discover(&self, listing: &Listing) -> Result<Discovery, ExtractError> {
        // Prefer the post-redirect URL when detection already fetched the page.
        let nsf_base = match listing.prefetched.as_ref().map(|page| nsf_base(&page.url)) {
            Some(Ok(base)) => base,
            _ => nsf_base(&listing.url)?,
        };

        let books_url = endpoint(&nsf_base, "BD-GetPolicyBooks", &[])?;
        let books_json = self
            .fetcher
            .fetch_json_text(books_url.as_str())
            .await
            .map_err(|e| ExtractError::fetch("policy books", e))?;
        let books = parse_books(&books_json)
            .map_err(|e| ExtractError::parse("policy books", e.to_string()))?;
        if books.is_empty() {
            return Err(ExtractError::no_references(
                listing.url.as_str(),
                "the district lists no policy books",
            ));
        }
        let selected = select_books(&books, self.include_all_books);
        info!(
            books = books.len(),
            selected = ?selected.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(),
            "policy books selected"
        );

        let mut seen = HashSet::new();
        let mut references = Vec::new();
        let mut last_error = None;
        let mut partitions_ok = 0usize;

        for book in &selected {
            for (filter, label) in STATUS_PARTITIONS {
                let html = match self.fetch_navigation(&nsf_base, book, filter).await {
                    Ok(html) => html,
                    Err(error) => {
                        warn!(book = %book.name, filter, error = %error, "navigation partition failed");
                        last_error = Some(error);
                        continue;
                    }
                };
                partitions_ok += 1;
                for item in parse_navigation(&html, &book.name, label) {
                    if seen.insert(item.unique_id.clone()) {
                        references.push(item.into_reference(&nsf_base));
                    }
                }
            }
        }

        if let (0, Some(error)) = (partitions_ok, last_error) {
            return Err(error);
        }
        if references.is_empty() {
            return Err(ExtractError::no_references(
                listing.url.as_str(),
                "navigation trees contained no policy items",
            ));
        }
        debug!(count = references.len(), "boarddocs items discovered");
        Ok(Discovery {
            listing_url: nsf_base,
            references,
        })
    }

    #[instrument(skip(self, reference), fields(item = %reference))]
    async fn extract_one(&self, reference: &ListingReference) -> Result<PolicyRecord, ExtractError> {
        let ReferenceTarget::ItemId(unique_id) = &reference.target else {
            return Err(ExtractError::parse(
                "boarddocs reference",
                format!("expected an item id, got {}", reference.target),
            ));
        };
        let nsf_base = nsf_base_from_key(&reference.canonical_key)?;
        let url = endpoint(&nsf_base, "BD-GetPolicyItem", &[("id", unique_id)])?;
        let page = self
            .fetcher
            .fetch_html(url.as_str(), FetchKind::Document)
            .await
            .map_err(|e| ExtractError::fetch("policy item", e))?;
        let public_url = format!("{nsf_base}goto?open&id={}", urlencoding::encode(unique_id));
        build_record(&page.text(), reference, unique_id, &public_url)
    }
}

/// The district application base: the listing path up to and including the
/// `.nsf` segment, with a trailing slash.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidUrl`] when the URL has no `.nsf` segment.
pub fn nsf_base(listing_url: &Url) -> Result<Url, ExtractError> {
    let segments: Vec<&str> = listing_url
        .path_segments()
        .map(Iterator::collect)
        .unwrap_or_default();
    let Some(end) = segments
        .iter()
        .position(|segment| segment.to_ascii_lowercase().ends_with(".nsf"))
    else {
        return Err(ExtractError::invalid_url(
            listing_url.as_str(),
            "BoardDocs URLs must include the district's .nsf application path",
        ));
    };
    let mut base = listing_url.clone();
    base.set_query(None);
    base.set_fragment(None);
    base.set_path(&format!("/{}/", segments[..=end].join("/")));
    Ok(base)
}

fn endpoint(base: &Url, name: &str, query: &[(&str, &str)]) -> Result<Url, ExtractError> {
    let mut url = base
        .join(name)
        .map_err(|e| ExtractError::invalid_url(base.as_str(), e.to_string()))?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Canonical keys are `<nsf base>#<unique id>` so items carry their origin.
fn item_key(nsf_base: &Url, unique_id: &str) -> String {
    format!("{nsf_base}#{unique_id}")
}

fn nsf_base_from_key(key: &str) -> Result<Url, ExtractError> {
    let base = key.rsplit_once('#').map_or(key, |(base, _)| base);
    Url::parse(base).map_err(|e| ExtractError::invalid_url(key, e.to_string()))
}

/// Parses the books payload.
///
/// Accepts an array of names, an array of objects with name/id fields, or
/// either wrapped in a `books` key.
///
/// # Errors
///
/// Returns the JSON error when the payload is not JSON.
pub fn parse_books(json: &str) -> Result<Vec<PolicyBook>, serde_json::Error> {
    let value: Value = serde_json::from_str(json)?;
    let entries = value
        .get("books")
        .and_then(Value::as_array)
        .or_else(|| value.as_array())
        .cloned()
        .unwrap_or_default();

    Ok(entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(name) => Some(PolicyBook {
                id: name.clone(),
                name: name.clone(),
            }),
            Value::Object(map) => {
                let field = |keys: &[&str]| {
                    keys.iter()
                        .find_map(|key| map.get(*key).and_then(Value::as_str))
                        .map(str::to_string)
                };
                let name = field(&["name", "title", "Name", "Title"])?;
                let id = field(&["unique", "id", "Unique", "ID", "book"]).unwrap_or_else(|| name.clone());
                Some(PolicyBook { id, name })
            }
            _ => None,
        })
        .filter(|book| !book.name.trim().is_empty())
        .collect())
}

/// Picks the books to scrape.
///
/// `include_all` selects every book. Otherwise the book named exactly
/// "Policy Manual" (case-insensitive) wins; failing that, books whose name
/// mentions "policy" or "bylaw"; failing that, every book.
#[must_use]
pub fn select_books(books: &[PolicyBook], include_all: bool) -> Vec<PolicyBook> {
    if include_all {
        return books.to_vec();
    }
    let exact: Vec<PolicyBook> = books
        .iter()
        .filter(|book| book.name.trim().eq_ignore_ascii_case(DEFAULT_BOOK))
        .cloned()
        .collect();
    if !exact.is_empty() {
        return exact;
    }
    let matching: Vec<PolicyBook> = books
        .iter()
        .filter(|book| {
            let name = book.name.to_lowercase();
            name.contains("policy") || name.contains("policies") || name.contains("bylaw")
        })
        .cloned()
        .collect();
    if matching.is_empty() {
        books.to_vec()
    } else {
        matching
    }
}

/// One navigation link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    /// Unique item id.
    pub unique_id: String,
    /// Code split from the link text.
    pub code: String,
    /// Title split from the link text.
    pub title: String,
    /// Enclosing section heading.
    pub section: String,
    /// Status partition label.
    pub status: String,
    /// Book name.
    pub book: String,
}

impl NavItem {
    fn into_reference(self, nsf_base: &Url) -> ListingReference {
        let key = item_key(nsf_base, &self.unique_id);
        ListingReference::new(ReferenceTarget::ItemId(self.unique_id), key)
            .with_fallbacks(self.code, self.title)
            .with_hints(ReferenceHints {
                book: Some(self.book),
                section: (!self.section.is_empty()).then_some(self.section),
                status: Some(self.status),
                series: None,
            })
    }
}

/// Walks a navigation tree in document order.
///
/// Headings, `<summary>` elements and `data-section` attributes set the current
/// section; links carrying a unique id become items under it.
#[must_use]
pub fn parse_navigation(html: &str, book: &str, status: &str) -> Vec<NavItem> {
    static NODES: LazyLock<Selector> = LazyLock::new(|| {
        compile_static_selector("h1, h2, h3, h4, h5, h6, summary, [data-section], a")
    });

    let document = Html::parse_fragment(html);
    let mut section = String::new();
    let mut items = Vec::new();

    for element in document.select(&NODES) {
        let name = element.value().name();
        if name == "a" {
            let Some(unique_id) = nav_unique_id(element) else {
                continue;
            };
            let (code, title) = split_code_title(&element_text(element));
            items.push(NavItem {
                unique_id,
                code,
                title,
                section: section.clone(),
                status: status.to_string(),
                book: book.to_string(),
            });
            continue;
        }
        if let Some(label) = element.value().attr("data-section") {
            section = normalize_space(label);
        } else if is_heading_tag(name) || name == "summary" {
            section = element_text(element);
        }
    }
    items
}

fn nav_unique_id(link: ElementRef<'_>) -> Option<String> {
    let attrs = link.value();
    if let Some(id) = ["unique", "data-unique", "data-id", "data-key"]
        .iter()
        .find_map(|key| attrs.attr(key))
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        return Some(id.to_string());
    }
    let href = attrs.attr("href")?;
    let base = Url::parse("https://nav.invalid/").ok()?;
    let resolved = base.join(href).ok()?;
    resolved
        .query_pairs()
        .find(|(key, _)| key.eq_ignore_ascii_case("id") || key.eq_ignore_ascii_case("unique"))
        .map(|(_, value)| value.trim().to_string())
        .filter(|id| !id.is_empty())
}

/// Label/value fields and body text of a policy item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFields {
    /// Normalized label → value.
    pub labels: HashMap<String, String>,
    /// Body paragraphs joined with blank lines.
    pub wording: String,
}

impl ItemFields {
    fn get(&self, aliases: &[&str]) -> &str {
        aliases
            .iter()
            .find_map(|alias| self.labels.get(*alias))
            .map_or("", String::as_str)
    }
}

/// Parses a policy item payload.
#[must_use]
pub fn parse_policy_item(html: &str) -> ItemFields {
    static CONTAINER: LazyLock<Selector> =
        LazyLock::new(|| compile_static_selector(CONTENT_CONTAINERS));
    static BODY: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("body"));
    static ROWS: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("tr"));
    static CELLS: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("th, td"));
    static TERMS: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("dt"));

    let document = Html::parse_document(html);
    let container = document.select(&CONTAINER).next();
    let inside_container = |element: ElementRef<'_>| {
        container.is_some_and(|c| element.ancestors().any(|a| a.id() == c.id()))
    };

    let mut labels = HashMap::new();
    for row in document.select(&ROWS) {
        if inside_container(row) {
            continue;
        }
        let cells: Vec<String> = row.select(&CELLS).map(element_text).collect();
        match cells.as_slice() {
            [label, value, ..] if label.chars().count() <= 40 => {
                labels
                    .entry(normalize_label(label))
                    .or_insert_with(|| value.clone());
            }
            _ => {}
        }
    }
    for term in document.select(&TERMS) {
        if inside_container(term) {
            continue;
        }
        let value = term
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|sibling| sibling.value().name() == "dd")
            .map(element_text)
            .unwrap_or_default();
        labels
            .entry(normalize_label(&element_text(term)))
            .or_insert(value);
    }

    let body_root = container.or_else(|| document.select(&BODY).next());
    let wording = body_root.map(block_text).unwrap_or_default();
    ItemFields { labels, wording }
}

fn normalize_label(label: &str) -> String {
    normalize_space(label)
        .trim_end_matches(':')
        .trim()
        .to_lowercase()
}

/// Block-level text under `root`, one entry per block, joined with blank lines.
///
/// Leaf `div`s count as blocks; text nested in an already-emitted block is not
/// repeated; icon-only and decorative elements are skipped.
fn block_text(root: ElementRef<'_>) -> String {
    static BLOCKS: LazyLock<Selector> = LazyLock::new(|| {
        compile_static_selector("p, h1, h2, h3, h4, h5, h6, li, blockquote, pre, div")
    });
    const NESTING: &[&str] = &[
        "p", "li", "blockquote", "pre", "h1", "h2", "h3", "h4", "h5", "h6",
    ];
    const BLOCK_CHILDREN: &[&str] = &[
        "p", "div", "ul", "ol", "li", "table", "blockquote", "pre", "h1", "h2", "h3", "h4",
        "h5", "h6",
    ];

    let mut blocks: Vec<String> = Vec::new();
    for element in root.select(&BLOCKS) {
        let name = element.value().name();
        if name == "div"
            && element
                .children()
                .filter_map(ElementRef::wrap)
                .any(|child| BLOCK_CHILDREN.contains(&child.value().name()))
        {
            continue;
        }
        let nested = element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take_while(|ancestor| ancestor.id() != root.id())
            .any(|ancestor| NESTING.contains(&ancestor.value().name()));
        if nested || is_decoration(element) {
            continue;
        }
        let text = element_text(element);
        if text.is_empty() {
            continue;
        }
        blocks.push(text);
    }
    blocks.join("\n\n")
}

fn is_decoration(element: ElementRef<'_>) -> bool {
    let attrs = element.value();
    attrs.attr("aria-hidden") == Some("true")
        || attrs
            .attr("class")
            .is_some_and(|class| class.split_whitespace().any(|c| c.starts_with("icon") || c.starts_with("fa-")))
}

fn build_record(
    html: &str,
    reference: &ListingReference,
    unique_id: &str,
    source_url: &str,
) -> Result<PolicyRecord, ExtractError> {
    let fields = parse_policy_item(html);
    let hints = &reference.hints;

    let record = PolicyRecord {
        section: first_non_empty([
            fields.get(&["section", "category", "chapter"]),
            hints.section.as_deref().unwrap_or_default(),
        ]),
        code: first_non_empty([
            fields.get(&["code", "policy code", "policy number", "number", "policy #"]),
            reference.fallback_code.as_str(),
        ]),
        title: first_non_empty([
            fields.get(&["title", "policy title", "name"]),
            reference.fallback_title.as_str(),
        ]),
        status: first_non_empty([
            fields.get(&["status"]),
            hints.status.as_deref().unwrap_or_default(),
        ]),
        adopted_date: fields
            .get(&["adopted", "date adopted", "adopted date", "adoption date", "original adopted date"])
            .to_string(),
        revised_date: fields
            .get(&["last revised", "revised", "date revised", "revised date", "last revised date", "last modified"])
            .to_string(),
        wording: fields.wording.clone(),
        source_url: source_url.to_string(),
        metadata: PolicyMetadata::BoardDocs {
            book: hints.book.clone().unwrap_or_default(),
            item_id: unique_id.to_string(),
        },
    };
    if record.is_blank() {
        return Err(ExtractError::EmptyDocument {
            url: source_url.to_string(),
        });
    }
    Ok(record)
}

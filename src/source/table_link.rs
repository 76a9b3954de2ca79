//! Table-linked platform: a listing table with a "Name of Policy" column whose
//! rows link to one detail page per policy.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::content_tree::{
    ContentNode, collect_content_nodes, content_nodes_from_html, content_root,
    extract_state_payload, find_payload_table, html_page_name, page_name,
};
use super::error::ExtractError;
use super::html::{TableCell, compile_static_selector, header_texts, table_rows};
use super::utils::{
    absolutize_url, chapter_of, compile_static_regex, dedup_adjacent, first_non_empty,
    hosts_match, is_pdf_url, normalized_url_key, split_code_title,
};
use super::{Discovery, Listing, PolicySource};
use crate::fetch::{FetchKind, HttpFetcher};
use crate::model::{ListingReference, PolicyMetadata, PolicyRecord, ReferenceTarget};
use crate::platform::Platform;

/// Header text identifying the listing table.
pub const LISTING_HEADER_MARKER: &str = "name of policy";

/// Path segments that mark a policy detail page.
const DETAIL_SEGMENTS: &[&str] = &["page", "pages", "policy", "policies"];

/// `<chapter>.<number> <title>` heading.
static CHAPTER_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^(\d+)\.(\d+[A-Za-z]?)\s+(.+)$"));

/// Source for listing tables that link to per-policy detail pages.
#[derive(Debug, Clone)]
pub struct TableLinkSource {
    fetcher: HttpFetcher,
}

impl TableLinkSource {
    /// Creates a source using `fetcher` for every request.
    #[must_use]
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl PolicySource for TableLinkSource {
    fn platform(&self) -> Platform {
        Platform::TableLink
    }

    #[instrument(skip(self, listing), fields(url = %listing.url))]
    async fn discover(&self, listing: &Listing) -> Result<Discovery, ExtractError> {
        let page = listing.page_or_fetch(&self.fetcher).await?;
        let references = parse_listing(&page.text(), &page.url)?;
        debug!(count = references.len(), "table-link references discovered");
        Ok(Discovery {
            listing_url: page.url,
            references,
        })
    }

    #[instrument(skip(self, reference), fields(item = %reference))]
    async fn extract_one(&self, reference: &ListingReference) -> Result<PolicyRecord, ExtractError> {
        let ReferenceTarget::Url(url) = &reference.target else {
            return Err(ExtractError::parse(
                "table-link reference",
                format!("expected a detail page URL, got {}", reference.target),
            ));
        };
        let page = self
            .fetcher
            .fetch_html(url, FetchKind::Document)
            .await
            .map_err(|e| ExtractError::fetch("policy detail page", e))?;
        parse_detail_page(&page.text(), reference, page.url.as_str())
    }
}

/// Finds the listing table in raw HTML, then in the embedded payload.
#[must_use]
pub fn find_listing_table(html: &str) -> Option<Vec<Vec<TableCell>>> {
    find_html_listing_table(html).or_else(|| {
        extract_state_payload(html)
            .and_then(|payload| find_payload_table(&payload, LISTING_HEADER_MARKER))
    })
}

fn find_html_listing_table(html: &str) -> Option<Vec<Vec<TableCell>>> {
    static TABLE: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("table"));
    let document = Html::parse_document(html);
    document
        .select(&TABLE)
        .map(table_rows)
        .find(|rows| is_listing_header(rows.first()))
}

fn is_listing_header(row: Option<&Vec<TableCell>>) -> bool {
    row.is_some_and(|row| {
        header_texts(row)
            .iter()
            .any(|text| text.contains(LISTING_HEADER_MARKER))
    })
}

/// Parses the listing into detail-page references.
///
/// # Errors
///
/// Returns [`ExtractError::NoReferences`] when no listing table exists or the
/// table yields no usable links.
pub fn parse_listing(html: &str, listing_url: &Url) -> Result<Vec<ListingReference>, ExtractError> {
    let rows = find_listing_table(html).ok_or_else(|| {
        ExtractError::no_references(
            listing_url.as_str(),
            "no table with a 'Name of Policy' column",
        )
    })?;

    let references = references_from_rows(&rows, listing_url);
    if references.is_empty() {
        return Err(ExtractError::no_references(
            listing_url.as_str(),
            format!("listing table has {} data row(s) but no detail links", rows.len() - 1),
        ));
    }
    Ok(references)
}

fn references_from_rows(rows: &[Vec<TableCell>], listing_url: &Url) -> Vec<ListingReference> {
    let listing_host = listing_url.host_str().unwrap_or_default();
    let mut seen = HashSet::new();
    let mut references = Vec::new();

    for row in rows.iter().skip(1) {
        if row
            .iter()
            .any(|cell| cell.text.eq_ignore_ascii_case("table of contents"))
        {
            continue;
        }
        let Some(first) = row.first() else { continue };
        let Some(href) = first.href.as_deref() else {
            continue;
        };
        let Some(url) = absolutize_url(href, listing_url) else {
            continue;
        };
        if !is_detail_link(&url, listing_host) {
            debug!(url = %url, "skipping non-detail link");
            continue;
        }
        let key = normalized_url_key(&url);
        if !seen.insert(key.clone()) {
            continue;
        }
        let label = first
            .link_text
            .as_deref()
            .filter(|text| !text.is_empty())
            .unwrap_or(first.text.as_str());
        let (code, title) = split_code_title(label);
        references.push(
            ListingReference::new(ReferenceTarget::Url(url.to_string()), key)
                .with_fallbacks(code, title),
        );
    }
    references
}

/// Same host, not a PDF, and a detail marker segment in the path.
fn is_detail_link(url: &Url, listing_host: &str) -> bool {
    let same_host = url
        .host_str()
        .is_some_and(|host| hosts_match(host, listing_host));
    let has_marker = url.path_segments().is_some_and(|mut segments| {
        segments.any(|segment| DETAIL_SEGMENTS.contains(&segment.to_ascii_lowercase().as_str()))
    });
    same_host && !is_pdf_url(url) && has_marker
}

/// Chapter, number and title parsed from a `<chapter>.<number> <title>` heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterHeading {
    /// Chapter (`"1"`).
    pub chapter: String,
    /// Full policy number (`"1.01"`).
    pub number: String,
    /// Title (`"Dress Code"`).
    pub title: String,
}

/// Parses `"1.01 Dress Code"`.
#[must_use]
pub fn parse_chapter_heading(text: &str) -> Option<ChapterHeading> {
    let caps = CHAPTER_HEADING_RE.captures(text.trim())?;
    let chapter = caps.get(1)?.as_str();
    Some(ChapterHeading {
        chapter: chapter.to_string(),
        number: format!("{chapter}.{}", caps.get(2)?.as_str()),
        title: caps.get(3)?.as_str().trim().to_string(),
    })
}

/// The four metadata columns of a detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataColumns {
    /// "Statutory Authority".
    pub statutory_authority: String,
    /// "Law(s) Implemented".
    pub laws_implemented: String,
    /// "History".
    pub history: String,
    /// "Notes".
    pub notes: String,
}

/// True for a header row with "statutory authority" plus one of
/// "law(s) implemented", "history" or "notes".
#[must_use]
pub fn is_metadata_header(row: &[TableCell]) -> bool {
    let headers = header_texts(row);
    let has = |needle: &str| headers.iter().any(|h| h.contains(needle));
    has("statutory authority") && (has("implemented") || has("history") || has("notes"))
}

/// Parses a metadata table column by column.
///
/// Columns are matched by header text; a field whose header is missing takes
/// the column at its conventional position if no other field claimed it.
/// Repeated cell values within a column are kept once.
#[must_use]
pub fn parse_metadata_table(rows: &[Vec<TableCell>]) -> MetadataColumns {
    let Some(header) = rows.first() else {
        return MetadataColumns::default();
    };
    let headers = header_texts(header);
    let matchers: [fn(&str) -> bool; 4] = [
        |h| h.contains("statutory authority"),
        |h| h.contains("law") && h.contains("implement"),
        |h| h.contains("history"),
        |h| h.contains("note"),
    ];

    let mut columns: [Option<usize>; 4] = [None; 4];
    for (field, matcher) in matchers.iter().enumerate() {
        columns[field] = headers.iter().position(|h| matcher(h));
    }
    let matched = columns;
    for (field, column) in matched.iter().enumerate() {
        if column.is_none() && field < headers.len() && !columns.contains(&Some(field)) {
            columns[field] = Some(field);
        }
    }

    let data_rows = &rows[1..];
    let values = columns.map(|column| {
        column
            .map(|c| column_values(data_rows, c))
            .unwrap_or_default()
    });
    let [statutory_authority, laws_implemented, history, notes] = values;
    MetadataColumns {
        statutory_authority,
        laws_implemented,
        history,
        notes,
    }
}

fn column_values(rows: &[Vec<TableCell>], column: usize) -> String {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| row.get(column))
        .map(|cell| cell.text.trim())
        .filter(|text| !text.is_empty() && seen.insert(text.to_string()))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Builds a record from a detail page.
///
/// # Errors
///
/// Returns [`ExtractError::Parse`] when the page has no content and
/// [`ExtractError::EmptyDocument`] when neither a title nor wording survive.
pub fn parse_detail_page(
    html: &str,
    reference: &ListingReference,
    source_url: &str,
) -> Result<PolicyRecord, ExtractError> {
    let (nodes, name) = match extract_state_payload(html) {
        Some(payload) => (
            collect_content_nodes(content_root(&payload)),
            page_name(&payload),
        ),
        None => (content_nodes_from_html(html), html_page_name(html)),
    };
    if nodes.is_empty() {
        return Err(ExtractError::parse(
            format!("detail page {source_url}"),
            "no content nodes",
        ));
    }

    let heading_index = nodes
        .iter()
        .position(|node| matches!(node, ContentNode::Heading(_)));
    let heading_text = heading_index.map(|i| nodes[i].text()).unwrap_or_default();
    let identity = parse_chapter_heading(&heading_text)
        .or_else(|| name.as_deref().and_then(parse_chapter_heading));

    let (chapter, number, title) = match identity {
        Some(parsed) => (parsed.chapter, parsed.number, parsed.title),
        None => {
            let number = reference.fallback_code.clone();
            let title = first_non_empty([
                name.as_deref().unwrap_or_default(),
                reference.fallback_title.as_str(),
                heading_text.as_str(),
            ]);
            (chapter_of(&number), number, title)
        }
    };

    let metadata_index = nodes.iter().position(|node| match node {
        ContentNode::Table(rows) => rows.first().is_some_and(|header| is_metadata_header(header)),
        _ => false,
    });
    let metadata = match metadata_index.map(|i| &nodes[i]) {
        Some(ContentNode::Table(rows)) => parse_metadata_table(rows),
        _ => MetadataColumns::default(),
    };

    let body_end = metadata_index.unwrap_or(nodes.len());
    let mut body: Vec<String> = nodes[..body_end]
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != heading_index)
        .map(|(_, node)| node.text())
        .filter(|text| !text.trim().is_empty() && text.trim() != heading_text.trim())
        .collect();
    dedup_adjacent(&mut body);

    let record = PolicyRecord {
        section: chapter,
        code: number,
        title,
        status: String::new(),
        adopted_date: String::new(),
        revised_date: String::new(),
        wording: body.join("\n\n"),
        source_url: source_url.to_string(),
        metadata: PolicyMetadata::TableLink {
            statutory_authority: metadata.statutory_authority,
            laws_implemented: metadata.laws_implemented,
            history: metadata.history,
            notes: metadata.notes,
        },
    };
    if record.is_blank() {
        return Err(ExtractError::EmptyDocument {
            url: source_url.to_string(),
        });
    }
    Ok(record)
}

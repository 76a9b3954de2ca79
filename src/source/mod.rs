//! Platform sources: listing discovery and per-document extraction.
//!
//! Each supported platform implements [`PolicySource`]. The pipeline picks one
//! source per request, asks it to [`discover`](PolicySource::discover) the
//! listing's document references, then fans [`extract_one`](PolicySource::extract_one)
//! out over them through the scheduler.
//!
//! Parsing is synchronous and works on owned strings; `scraper::Html` never
//! lives across an `.await`, which keeps every source future `Send`.

mod accordion_pdf;
mod boarddocs;
mod content_tree;
mod error;
mod html;
mod pdf_fields;
mod table_link;
pub mod utils;

pub use accordion_pdf::{
    AccordionPdfSource, AccordionSection, accordion_sections, looks_like_accordion_listing,
};
pub use boarddocs::{BoardDocsSource, PolicyBook, parse_books, select_books};
pub use content_tree::{ContentNode, collect_content_nodes, extract_state_payload};
pub use error::ExtractError;
pub use html::TableCell;
pub use pdf_fields::{PdfPolicyFields, parse_policy_text};
pub use table_link::{TableLinkSource, find_listing_table, parse_detail_page, parse_listing};

use async_trait::async_trait;
use url::Url;

use crate::fetch::{FetchKind, FetchedPage, HttpFetcher};
use crate::model::{ListingReference, PolicyRecord};
use crate::platform::Platform;

/// A listing URL plus the page body if detection already fetched it.
#[derive(Debug, Clone)]
pub struct Listing {
    /// Normalized listing URL as supplied by the caller.
    pub url: Url,
    /// Page fetched during platform detection, reused to avoid a second request.
    pub prefetched: Option<FetchedPage>,
}

impl Listing {
    /// Listing that has not been fetched yet.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            prefetched: None,
        }
    }

    /// Returns the prefetched page or fetches the listing now.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Fetch`] when the listing cannot be fetched.
    pub async fn page_or_fetch(&self, fetcher: &HttpFetcher) -> Result<FetchedPage, ExtractError> {
        if let Some(page) = &self.prefetched {
            return Ok(page.clone());
        }
        fetcher
            .fetch_html(self.url.as_str(), FetchKind::Listing)
            .await
            .map_err(|e| ExtractError::fetch("listing page", e))
    }
}

/// References found on a listing and the URL they were resolved against.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// Listing URL after redirects.
    pub listing_url: Url,
    /// Deduplicated document references, in listing order.
    pub references: Vec<ListingReference>,
}

/// Trait that every platform source implements.
///
/// # Object Safety
///
/// Uses `async_trait` so the pipeline can hold a `Box<dyn PolicySource>`.
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// The platform this source handles.
    fn platform(&self) -> Platform;

    /// Discovers document references on the listing.
    ///
    /// Zero references is an error, never an empty success.
    async fn discover(&self, listing: &Listing) -> Result<Discovery, ExtractError>;

    /// Fetches and parses one document.
    async fn extract_one(&self, reference: &ListingReference) -> Result<PolicyRecord, ExtractError>;
}

/// Builds the source for `platform`.
#[must_use]
pub fn source_for(
    platform: Platform,
    fetcher: HttpFetcher,
    include_all_books: bool,
) -> Box<dyn PolicySource> {
    match platform {
        Platform::BoardDocs => Box::new(BoardDocsSource::new(fetcher, include_all_books)),
        Platform::TableLink => Box::new(TableLinkSource::new(fetcher)),
        Platform::AccordionPdf => Box::new(AccordionPdfSource::new(fetcher)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetch::FetchTimeouts;

    #[test]
    fn test_source_for_matches_platform() {
        let fetcher = HttpFetcher::new(FetchTimeouts::default()).unwrap();
        for platform in [Platform::BoardDocs, Platform::TableLink, Platform::AccordionPdf] {
            assert_eq!(source_for(platform, fetcher.clone(), false).platform(), platform);
        }
    }

    #[tokio::test]
    async fn test_listing_reuses_prefetched_page() {
        let fetcher = HttpFetcher::new(FetchTimeouts::default()).unwrap();
        // Nothing listens here; the body must come from the prefetched page.
        let url = Url::parse("http://127.0.0.1:9/policies").unwrap();
        let listing = Listing {
            url: url.clone(),
            prefetched: Some(FetchedPage {
                url,
                body: b"<table></table>".to_vec(),
            }),
        };
        let page = listing.page_or_fetch(&fetcher).await.unwrap();
        assert_eq!(page.text(), "<table></table>");
    }
}

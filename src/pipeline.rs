//! End-to-end extraction: detect, discover, fan out, aggregate.

use tracing::{debug, info, instrument, warn};

use crate::config::ExtractRequest;
use crate::fetch::{FetchKind, HttpFetcher};
use crate::model::{ExtractionResult, FailedItem, ListingReference};
use crate::platform::{Platform, PlatformHint, detect_from_html, detect_from_url};
use crate::scheduler::run_all;
use crate::source::{ExtractError, Listing, PolicySource, source_for};

/// Runs one extraction request with a fresh HTTP fetcher.
///
/// # Errors
///
/// Returns an [`ExtractError`] for configuration problems, listing-level
/// failures, or when no discovered document yields a row. Individual document
/// failures are reported in [`ExtractionResult::failed_items`].
pub async fn extract(request: &ExtractRequest) -> Result<ExtractionResult, ExtractError> {
    let fetcher = HttpFetcher::new(request.options.timeouts)
        .map_err(|source| ExtractError::ClientBuild { source })?;
    extract_with(&fetcher, request).await
}

/// Runs one extraction request with the given fetcher.
///
/// # Errors
///
/// See [`extract`].
#[instrument(skip(fetcher, request), fields(url = %request.url, hint = %request.options.platform))]
pub async fn extract_with(
    fetcher: &HttpFetcher,
    request: &ExtractRequest,
) -> Result<ExtractionResult, ExtractError> {
    let (platform, listing) = resolve_platform(fetcher, request).await?;
    info!(%platform, "platform selected");

    let source = source_for(platform, fetcher.clone(), request.options.include_all_books);
    let discovery = source.discover(&listing).await?;
    let discovered_count = discovery.references.len();
    info!(
        discovered = discovered_count,
        concurrency = request.options.concurrency,
        "extracting policies"
    );

    let source: &dyn PolicySource = source.as_ref();
    let outcome = run_all(
        discovery.references,
        request.options.concurrency,
        |reference: ListingReference| async move { source.extract_one(&reference).await },
    )
    .await;

    let (rows, failures) = outcome.into_parts();
    let failed_items: Vec<FailedItem> = failures
        .into_iter()
        .map(|failure| FailedItem {
            reference: failure.item,
            reason: failure.reason,
        })
        .collect();

    if rows.is_empty() {
        let first_reason = failed_items
            .first()
            .map(|item| item.reason.clone())
            .unwrap_or_default();
        return Err(ExtractError::NoRowsExtracted {
            discovered: discovered_count,
            first_reason,
        });
    }

    let result = ExtractionResult {
        base_url: request.url.to_string(),
        listing_url: discovery.listing_url.to_string(),
        platform,
        rows,
        discovered_count,
        failed_items,
    };
    let summary = result.summary();
    if summary.failed > 0 {
        warn!(%summary, "extraction finished with failures");
    } else {
        info!(%summary, "extraction finished");
    }
    Ok(result)
}

/// Chooses the platform, fetching the listing at most once.
///
/// A fetched listing is handed on to the source so discovery does not
/// request it again.
async fn resolve_platform(
    fetcher: &HttpFetcher,
    request: &ExtractRequest,
) -> Result<(Platform, Listing), ExtractError> {
    let url = request.url.clone();
    if let PlatformHint::Fixed(platform) = request.options.platform {
        return Ok((platform, Listing::new(url)));
    }
    if let Some(platform) = detect_from_url(&url) {
        debug!(%platform, "platform detected from URL");
        return Ok((platform, Listing::new(url)));
    }

    let page = fetcher
        .fetch_html(url.as_str(), FetchKind::Listing)
        .await
        .map_err(|e| ExtractError::fetch("listing page", e))?;
    // A redirect may land on a vendor host.
    let platform = detect_from_url(&page.url)
        .or_else(|| detect_from_html(&page.text(), &page.url))
        .ok_or_else(|| ExtractError::undetermined(url.as_str(), "listing page is empty"))?;
    debug!(%platform, final_url = %page.url, "platform detected from listing");
    Ok((
        platform,
        Listing {
            url,
            prefetched: Some(page),
        },
    ))
}

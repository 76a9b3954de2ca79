//! Policy Scraper Core Library
//!
//! Extracts school-district board policies from heterogeneous publishing
//! platforms into uniform, CSV-ready records.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - HTTP fetcher with manual redirects, retry and User-Agent fallback
//! - [`platform`] - Platform identifiers and listing classification
//! - [`source`] - Per-platform listing discovery and document extraction
//! - [`scheduler`] - Bounded-concurrency fan-out with per-item failure capture
//! - [`pipeline`] - End-to-end extraction of one listing
//! - [`export`] - Per-platform CSV rendering
//!
//! # Example
//!
//! ```no_run
//! use policy_scraper_core::{ExtractOptions, ExtractRequest, extract};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let request = ExtractRequest::new("district.example/policies", ExtractOptions::default())?;
//! let result = extract(&request).await?;
//! println!("{}", result.summary());
//! let csv = result.to_csv();
//! # let _ = csv;
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod export;
pub mod fetch;
pub mod model;
pub mod pdf;
pub mod pipeline;
pub mod platform;
pub mod scheduler;
pub mod source;
mod user_agent;

// Re-export commonly used types
pub use config::{DEFAULT_CONCURRENCY, ExtractOptions, ExtractRequest};
pub use export::{CSV_CONTENT_TYPE, to_csv};
pub use fetch::{FetchError, FetchKind, FetchTimeouts, HttpFetcher};
pub use model::{
    ExtractionResult, ExtractionSummary, FailedItem, ListingReference, PolicyMetadata,
    PolicyRecord, ReferenceHints, ReferenceTarget,
};
pub use pipeline::{extract, extract_with};
pub use platform::{Platform, PlatformHint};
pub use source::{ExtractError, PolicySource};
pub use user_agent::BROWSER_USER_AGENT;

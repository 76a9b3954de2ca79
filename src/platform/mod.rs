//! Supported publishing platforms and the caller-facing platform hint.

mod detect;

pub use detect::{detect_from_html, detect_from_url};

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// The three extraction strategies this crate implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    /// BoardDocs-style vendor backend (books, navigation tree, policy items).
    #[serde(rename = "boarddocs")]
    BoardDocs,
    /// A listing table whose rows link to detail pages.
    TableLink,
    /// Accordion panels grouped by "Series N" linking to PDFs.
    AccordionPdf,
}

impl Platform {
    /// Stable identifier used in hints and export filenames.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BoardDocs => "boarddocs",
            Self::TableLink => "table-link",
            Self::AccordionPdf => "accordion-pdf",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied platform selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlatformHint {
    /// Detect from the URL, then from the listing HTML.
    #[default]
    Auto,
    /// Skip detection and use this platform.
    Fixed(Platform),
}

impl FromStr for PlatformHint {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "boarddocs" => Ok(Self::Fixed(Platform::BoardDocs)),
            "table-link" | "table" => Ok(Self::Fixed(Platform::TableLink)),
            "accordion-pdf" | "accordion" => Ok(Self::Fixed(Platform::AccordionPdf)),
            other => Err(format!(
                "unknown platform '{other}' (expected auto, boarddocs, table-link or accordion-pdf)"
            )),
        }
    }
}

impl fmt::Display for PlatformHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fixed(platform) => platform.fmt(f),
        }
    }
}

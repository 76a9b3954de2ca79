//! `scraper` helpers shared by the listing parsers and extractors.
//!
//! `scraper::Html` is not `Send`; everything here is synchronous and returns
//! owned data so callers never hold a parsed document across an `.await`.

use scraper::{ElementRef, Selector};

use super::utils::normalize_space;

/// A table cell's visible text and its first hyperlink.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableCell {
    /// Normalized visible text.
    pub text: String,
    /// `href` of the first link in the cell, unresolved.
    pub href: Option<String>,
    /// Visible text of that link.
    pub link_text: Option<String>,
}

impl TableCell {
    /// Cell with text only.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            href: None,
            link_text: None,
        }
    }
}

/// Compiles a CSS selector at static init; panics on invalid selector.
pub fn compile_static_selector(selector: &str) -> Selector {
    Selector::parse(selector).unwrap_or_else(|e| panic!("invalid static selector '{selector}': {e}"))
}

/// Visible text of an element, whitespace-normalized.
#[must_use]
pub fn element_text(element: ElementRef<'_>) -> String {
    normalize_space(&element.text().collect::<String>())
}

/// True for `h1`..`h6`.
#[must_use]
pub fn is_heading_tag(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// True when any ancestor element has one of the given tag names.
#[must_use]
pub fn has_ancestor_named(element: ElementRef<'_>, names: &[&str]) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| names.contains(&ancestor.value().name()))
}

/// Rows of a `<table>` as cells, header row included.
///
/// Rows belonging to nested tables are skipped.
#[must_use]
pub fn table_rows(table: ElementRef<'_>) -> Vec<Vec<TableCell>> {
    static ROW: std::sync::LazyLock<Selector> =
        std::sync::LazyLock::new(|| compile_static_selector("tr"));
    static CELL: std::sync::LazyLock<Selector> =
        std::sync::LazyLock::new(|| compile_static_selector("th, td"));
    static LINK: std::sync::LazyLock<Selector> =
        std::sync::LazyLock::new(|| compile_static_selector("a[href]"));

    table
        .select(&ROW)
        .filter(|row| nearest_table(*row).is_some_and(|t| t.id() == table.id()))
        .map(|row| {
            row.select(&CELL)
                .filter(|cell| cell.parent().and_then(ElementRef::wrap).is_some_and(|p| p.id() == row.id()))
                .map(|cell| {
                    let link = cell.select(&LINK).next();
                    TableCell {
                        text: element_text(cell),
                        href: link.and_then(|a| a.value().attr("href")).map(str::to_string),
                        link_text: link.map(element_text),
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect()
}

fn nearest_table(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "table")
}

/// Lowercased header texts of a row.
#[must_use]
pub fn header_texts(row: &[TableCell]) -> Vec<String> {
    row.iter().map(|cell| cell.text.to_lowercase()).collect()
}

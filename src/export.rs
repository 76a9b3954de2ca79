//! CSV rendering of extracted records.
//!
//! Every platform has a fixed column order. Output starts with a UTF-8 BOM,
//! rows end in CRLF, and fields are quoted only when they contain a comma,
//! quote, CR or LF.

use chrono::NaiveDate;

use crate::model::{PolicyMetadata, PolicyRecord};
use crate::platform::Platform;

/// Content type for the CSV payload.
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// UTF-8 byte-order mark that makes spreadsheet apps pick the right encoding.
pub const UTF8_BOM: &str = "\u{feff}";

const BOARDDOCS_COLUMNS: &[&str] = &[
    "Book",
    "Section",
    "Policy Code",
    "Policy Title",
    "Status",
    "Adopted",
    "Last Revised",
    "Policy Wording",
    "Source URL",
];

const TABLE_LINK_COLUMNS: &[&str] = &[
    "Chapter",
    "Policy Number",
    "Policy Title",
    "Statutory Authority",
    "Law(s) Implemented",
    "History",
    "Notes",
    "Policy Wording",
    "Source URL",
];

const ACCORDION_PDF_COLUMNS: &[&str] = &[
    "Series",
    "Board Policy Number",
    "Title",
    "Adopted",
    "Last Revised",
    "Revision History",
    "Legal References",
    "Cross References",
    "Policy Wording",
    "Source URL",
];

/// Column headers for a platform, in output order.
#[must_use]
pub fn csv_header(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::BoardDocs => BOARDDOCS_COLUMNS,
        Platform::TableLink => TABLE_LINK_COLUMNS,
        Platform::AccordionPdf => ACCORDION_PDF_COLUMNS,
    }
}

/// Field values for one record in the platform's column order.
///
/// Metadata belonging to another platform renders as empty columns.
#[must_use]
pub fn csv_fields(platform: Platform, record: &PolicyRecord) -> Vec<&str> {
    match platform {
        Platform::BoardDocs => {
            let book = match &record.metadata {
                PolicyMetadata::BoardDocs { book, .. } => book.as_str(),
                _ => "",
            };
            vec![
                book,
                record.section.as_str(),
                record.code.as_str(),
                record.title.as_str(),
                record.status.as_str(),
                record.adopted_date.as_str(),
                record.revised_date.as_str(),
                record.wording.as_str(),
                record.source_url.as_str(),
            ]
        }
        Platform::TableLink => {
            let (authority, laws, history, notes) = match &record.metadata {
                PolicyMetadata::TableLink {
                    statutory_authority,
                    laws_implemented,
                    history,
                    notes,
                } => (
                    statutory_authority.as_str(),
                    laws_implemented.as_str(),
                    history.as_str(),
                    notes.as_str(),
                ),
                _ => ("", "", "", ""),
            };
            vec![
                record.section.as_str(),
                record.code.as_str(),
                record.title.as_str(),
                authority,
                laws,
                history,
                notes,
                record.wording.as_str(),
                record.source_url.as_str(),
            ]
        }
        Platform::AccordionPdf => {
            let (revisions, legal, cross) = match &record.metadata {
                PolicyMetadata::AccordionPdf {
                    revision_history,
                    legal_references,
                    cross_references,
                } => (
                    revision_history.as_str(),
                    legal_references.as_str(),
                    cross_references.as_str(),
                ),
                _ => ("", "", ""),
            };
            vec![
                record.section.as_str(),
                record.code.as_str(),
                record.title.as_str(),
                record.adopted_date.as_str(),
                record.revised_date.as_str(),
                revisions,
                legal,
                cross,
                record.wording.as_str(),
                record.source_url.as_str(),
            ]
        }
    }
}

/// Quotes a field when it contains a comma, quote, CR or LF.
#[must_use]
pub fn escape_csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    let row: Vec<String> = fields.into_iter().map(escape_csv_field).collect();
    out.push_str(&row.join(","));
    out.push_str("\r\n");
}

/// Renders records as CSV text with a BOM and header row.
#[must_use]
pub fn to_csv(platform: Platform, records: &[PolicyRecord]) -> String {
    let mut out = String::from(UTF8_BOM);
    push_row(&mut out, csv_header(platform).iter().copied());
    for record in records {
        push_row(&mut out, csv_fields(platform, record));
    }
    out
}

/// Suggested filename: `<slug(host+path)>-<platform>-<YYYY-MM-DD>.csv`.
#[must_use]
pub fn export_filename(base_url: &str, platform: Platform, date: NaiveDate) -> String {
    let without_scheme = base_url
        .split_once("://")
        .map_or(base_url, |(_, rest)| rest);
    let without_query = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let slug = slugify(without_query.trim_start_matches("www."));
    let slug = if slug.is_empty() { "policies".to_string() } else { slug };
    format!("{slug}-{}-{}.csv", platform.as_str(), date.format("%Y-%m-%d"))
}

/// Lowercase ASCII alphanumerics separated by single hyphens.
fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn table_record(wording: &str) -> PolicyRecord {
        PolicyRecord {
            section: "1".to_string(),
            code: "1.01".to_string(),
            title: "Dress Code".to_string(),
            status: String::new(),
            adopted_date: String::new(),
            revised_date: String::new(),
            wording: wording.to_string(),
            source_url: "https://district.example/p/1.01".to_string(),
            metadata: PolicyMetadata::TableLink {
                statutory_authority: "1001.41".to_string(),
                laws_implemented: "1001.43".to_string(),
                history: "Adopted 2019".to_string(),
                notes: String::new(),
            },
        }
    }

    #[test]
    fn test_escape_csv_field() {
        assert_eq!(escape_csv_field("plain"), "plain");
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv_field("line\nbreak"), "\"line\nbreak\"");
        assert_eq!(escape_csv_field("cr\rhere"), "\"cr\rhere\"");
    }

    #[test]
    fn test_to_csv_layout() {
        let csv = to_csv(Platform::TableLink, &[table_record("Body")]);
        assert!(csv.starts_with(UTF8_BOM));
        let lines: Vec<&str> = csv.trim_start_matches(UTF8_BOM).split("\r\n").collect();
        assert_eq!(
            lines[0],
            "Chapter,Policy Number,Policy Title,Statutory Authority,Law(s) Implemented,History,Notes,Policy Wording,Source URL"
        );
        assert_eq!(
            lines[1],
            "1,1.01,Dress Code,1001.41,1001.43,Adopted 2019,,Body,https://district.example/p/1.01"
        );
        assert_eq!(lines[2], "");
    }

    #[test]
    fn test_every_row_matches_header_width() {
        for platform in [Platform::BoardDocs, Platform::TableLink, Platform::AccordionPdf] {
            let record = table_record("x");
            assert_eq!(csv_fields(platform, &record).len(), csv_header(platform).len());
        }
    }

    #[test]
    fn test_standard_reader_recovers_tricky_values() {
        let tricky = "Students, staff and \"visitors\"\nmust comply.\r\nSee 2.10.";
        let csv = to_csv(Platform::TableLink, &[table_record(tricky)]);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(csv.trim_start_matches(UTF8_BOM).as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(row.get(7).unwrap(), tricky);
        assert_eq!(row.get(2).unwrap(), "Dress Code");
    }

    #[test]
    fn test_export_filename() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(
            export_filename("https://www.District.example/board/policies/?tab=1", Platform::TableLink, date),
            "district-example-board-policies-table-link-2026-03-09.csv"
        );
        assert_eq!(
            export_filename("https://go.boarddocs.com/ar/abc/Board.nsf/Public", Platform::BoardDocs, date),
            "go-boarddocs-com-ar-abc-board-nsf-public-boarddocs-2026-03-09.csv"
        );
    }
}

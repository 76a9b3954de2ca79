//! Field segmentation for policy text extracted from PDFs.
//!
//! Extracted text is a flat run of lines with no structure beyond what the
//! author typed. Fields are recovered by label anchors ("BOARD POLICY",
//! "SERIES:", "ADOPTED:", ...). Every line an anchor or its block consumes is
//! marked, and whatever remains becomes the wording, regrouped into
//! paragraphs. Each heuristic is a separate predicate so it can be tested on
//! literal text.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use super::utils::{compile_static_regex, split_code_title};

/// Fields recovered from one policy PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfPolicyFields {
    /// Policy number from the BOARD POLICY line.
    pub board_policy_number: String,
    /// Title from the BOARD POLICY line (or the line after it).
    pub title: String,
    /// Value of `SERIES:`.
    pub series: String,
    /// Value of `ADOPTED:`.
    pub adopted_date: String,
    /// Last date mentioned in the revision history.
    pub revised_date: String,
    /// Revision history entries joined with `"; "`.
    pub revision_history: String,
    /// Legal references joined with `"; "`.
    pub legal_references: String,
    /// Cross references joined with `"; "`.
    pub cross_references: String,
    /// Remaining text as paragraphs separated by blank lines.
    pub wording: String,
}

/// Label anchors recognized at the start of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// `BOARD POLICY` (number and title follow).
    BoardPolicy,
    /// `SERIES:`
    Series,
    /// `ADOPTED:`
    Adopted,
    /// `REVISED:` outside a revision-history block.
    Revised,
    /// `REVISION HISTORY:`
    RevisionHistory,
    /// `Legal References:`
    LegalReferences,
    /// `Cross References:`
    CrossReferences,
}

impl Label {
    fn is_block(self) -> bool {
        matches!(
            self,
            Self::Revised | Self::RevisionHistory | Self::LegalReferences | Self::CrossReferences
        )
    }
}

static BOARD_POLICY_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"^BOARD\s+POLICY\b\s*(?:(?i:no\.?|number|#)\s*)?[:.\-–—]?\s*(.*)$")
});

/// Inline labels; a line starting with one may carry several.
static INLINE_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"(?i)\b(series|(?:date\s+)?adopted|revised|revision\s+history|legal\s+references?|cross\s+references?)\s*:",
    )
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"(?i)\b(?:\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4}|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}|\d{4}-\d{2}-\d{2})\b",
    )
});

static REVISION_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?i)^(?:formerly|revised|amended|reviewed|reaffirmed|updated)\b\s*:?")
});

static REFERENCE_HINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"(?i)(§|\bA\.?C\.?A\.?\b|\bU\.?S\.?C\.?\b|\bC\.?F\.?R\.?\b|\bcode\b|\bact\b|\bstat(?:ute)?s?\b|\blaw\b|\brules?\b|\bregulations?\b|\bpolicy\b|\bann\.|\b\d+-\d+-\d+)",
    )
});

static PAGE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?i)^(?:page\s+\d+(?:\s+of\s+\d+)?|-\s*\d+\s*-|\d+\s+of\s+\d+|\d{1,3})$")
});

static OUTLINE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"^(?:[IVXLC]+[.)]|[A-Z][.)]|\d+(?:\.\d+)*[.)]|\(\w{1,4}\))\s")
});

static POLICY_NUMBER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^\d+(?:\.\d+)+[A-Za-z]?\s"));

/// Normalizes line endings, page breaks and in-line whitespace; collapses runs
/// of blank lines to one.
#[must_use]
pub fn normalize_lines(raw: &str) -> Vec<String> {
    let unified = raw
        .replace("\r\n", "\n")
        .replace(['\r', '\u{c}'], "\n");
    let mut lines: Vec<String> = Vec::new();
    for line in unified.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() && lines.last().is_none_or(String::is_empty) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

/// Matches a label anchor at the start of the line, returning every
/// `(label, value)` segment the line carries.
#[must_use]
pub fn label_segments(line: &str) -> Option<Vec<(Label, String)>> {
    if let Some(caps) = BOARD_POLICY_RE.captures(line) {
        let rest = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
        return Some(vec![(Label::BoardPolicy, rest)]);
    }
    let first = INLINE_LABEL_RE.find(line)?;
    if first.start() != 0 {
        return None;
    }
    let matches: Vec<_> = INLINE_LABEL_RE.captures_iter(line).collect();
    let mut segments = Vec::with_capacity(matches.len());
    for (index, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = matches
            .get(index + 1)
            .and_then(|next| next.get(0))
            .map_or(line.len(), |m| m.start());
        let value = line[whole.end()..end].trim().to_string();
        segments.push((label_for(name.as_str()), value));
    }
    Some(segments)
}

fn label_for(name: &str) -> Label {
    let name = name.to_ascii_lowercase();
    if name.starts_with("series") {
        Label::Series
    } else if name.contains("adopted") {
        Label::Adopted
    } else if name.starts_with("revision") {
        Label::RevisionHistory
    } else if name.starts_with("revised") {
        Label::Revised
    } else if name.starts_with("legal") {
        Label::LegalReferences
    } else {
        Label::CrossReferences
    }
}

/// True for a line that continues a revision-history block.
#[must_use]
pub fn is_revision_continuation(line: &str) -> bool {
    REVISION_MARKER_RE.is_match(line) || DATE_RE.find(line).is_some_and(|m| m.start() == 0)
}

/// True for a line that continues a legal or cross reference block.
#[must_use]
pub fn is_reference_continuation(line: &str, previous: &str) -> bool {
    let previous = previous.trim_end();
    REFERENCE_HINT_RE.is_match(line)
        || POLICY_NUMBER_LINE_RE.is_match(line)
        || previous.ends_with([',', ';', '&', '-'])
        || previous.ends_with(" and")
}

/// True for page markers such as `Page 2 of 5`, `- 3 -` or a bare number.
#[must_use]
pub fn is_page_marker(line: &str) -> bool {
    PAGE_MARKER_RE.is_match(line.trim())
}

/// True when the line starts an outline item (`I.`, `A.`, `3.`, `1.2)`, `(a)`).
#[must_use]
pub fn starts_outline_item(line: &str) -> bool {
    OUTLINE_MARKER_RE.is_match(line)
}

/// True for a short line in capitals, such as a section heading.
#[must_use]
pub fn is_all_caps_heading(line: &str) -> bool {
    let letters = line.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 3 && line.len() <= 80 && !line.chars().any(char::is_lowercase)
}

/// Running headers and footers (letterhead).
///
/// Pages are split at form feeds and at page-marker lines. A short non-label
/// line counts as letterhead when it is the first or last line of at least two
/// pages; lines repeated inside a page body are left alone.
#[must_use]
pub fn letterhead_lines(raw: &str) -> HashSet<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for sheet in raw.split('\u{c}') {
        let lines = normalize_lines(sheet);
        for page in lines.split(|line| is_page_marker(line)) {
            let mut edges = page.iter().filter(|line| !line.is_empty());
            let first = edges.next();
            let last = edges.next_back();
            for edge in first.into_iter().chain(last) {
                if edge.len() <= 100 && label_segments(edge).is_none() {
                    *counts.entry(edge.clone()).or_default() += 1;
                }
            }
        }
    }
    counts
        .into_iter()
        .filter_map(|(line, count)| (count > 1).then_some(line))
        .collect()
}

/// Segments extracted PDF text into policy fields.
#[must_use]
pub fn parse_policy_text(raw: &str) -> PdfPolicyFields {
    let lines = normalize_lines(raw);
    let letterhead = letterhead_lines(raw);
    let is_boilerplate = |line: &str| is_page_marker(line) || letterhead.contains(line);

    let mut fields = PdfPolicyFields::default();
    let mut revisions: Vec<String> = Vec::new();
    let mut legal: Vec<String> = Vec::new();
    let mut cross: Vec<String> = Vec::new();
    let mut consumed = vec![false; lines.len()];

    let mut index = 0;
    while index < lines.len() {
        let line = lines[index].as_str();
        if line.is_empty() {
            index += 1;
            continue;
        }
        if is_boilerplate(line) {
            consumed[index] = true;
            index += 1;
            continue;
        }
        let Some(segments) = label_segments(line) else {
            index += 1;
            continue;
        };
        consumed[index] = true;
        index += 1;

        let mut block = None;
        for (label, value) in segments {
            match label {
                Label::BoardPolicy => {
                    if fields.board_policy_number.is_empty() && fields.title.is_empty() {
                        let (number, title) = split_code_title(&value);
                        fields.board_policy_number = number;
                        fields.title = title;
                        if fields.title.is_empty() {
                            if let Some(next) = lines.get(index).map(String::as_str).filter(|next| {
                                !next.is_empty()
                                    && !is_boilerplate(next)
                                    && label_segments(next).is_none()
                            }) {
                                fields.title = next.to_string();
                                consumed[index] = true;
                                index += 1;
                            }
                        }
                    }
                }
                Label::Series => set_once(&mut fields.series, value),
                Label::Adopted => set_once(&mut fields.adopted_date, value),
                Label::Revised => {
                    revisions.push(format!("Revised: {value}").trim_end_matches([' ', ':']).to_string());
                }
                Label::RevisionHistory => push_non_empty(&mut revisions, value),
                Label::LegalReferences => push_non_empty(&mut legal, value),
                Label::CrossReferences => push_non_empty(&mut cross, value),
            }
            if label.is_block() {
                block = Some(label);
            }
        }

        let Some(block) = block else { continue };
        let target = match block {
            Label::LegalReferences => &mut legal,
            Label::CrossReferences => &mut cross,
            _ => &mut revisions,
        };
        index = consume_block(&lines, index, block, target, &mut consumed, &is_boilerplate);
    }

    fields.revised_date = revisions
        .iter()
        .flat_map(|entry| DATE_RE.find_iter(entry).map(|m| m.as_str().to_string()))
        .last()
        .unwrap_or_default();
    fields.revision_history = revisions.join("; ");
    fields.legal_references = legal.join("; ");
    fields.cross_references = cross.join("; ");
    fields.wording = paragraphs(&lines, &consumed).join("\n\n");
    fields
}

/// Consumes continuation lines of a block starting at `start`; returns the
/// index of the first line not consumed.
fn consume_block(
    lines: &[String],
    start: usize,
    block: Label,
    target: &mut Vec<String>,
    consumed: &mut [bool],
    is_boilerplate: &dyn Fn(&str) -> bool,
) -> usize {
    let continues = |line: &str, previous: &str| match block {
        Label::LegalReferences | Label::CrossReferences => {
            is_reference_continuation(line, previous)
        }
        _ => is_revision_continuation(line),
    };

    let mut index = start;
    while index < lines.len() {
        let line = lines[index].as_str();
        if line.is_empty() {
            // Blank lines inside a block are skipped only if the block resumes.
            let next = lines[index..].iter().position(|l| !l.is_empty());
            let Some(offset) = next else { break };
            let resumed = lines[index + offset].as_str();
            let previous = target.last().map_or("", String::as_str);
            if ends_block(resumed, block) || !(is_boilerplate(resumed) || continues(resumed, previous))
            {
                break;
            }
            index += offset;
            continue;
        }
        if is_boilerplate(line) {
            consumed[index] = true;
            index += 1;
            continue;
        }
        if ends_block(line, block) {
            break;
        }
        let previous = target.last().map_or("", String::as_str);
        if label_segments(line).is_none() && !continues(line, previous) {
            break;
        }
        target.push(line.to_string());
        consumed[index] = true;
        index += 1;
    }
    index
}

/// Any label ends a block, except `REVISED:` inside a revision block.
fn ends_block(line: &str, block: Label) -> bool {
    let Some(segments) = label_segments(line) else {
        return false;
    };
    let revision_block = matches!(block, Label::Revised | Label::RevisionHistory);
    !(revision_block && segments.iter().all(|(label, _)| *label == Label::Revised))
}

fn set_once(slot: &mut String, value: String) {
    if slot.is_empty() {
        *slot = value;
    }
}

fn push_non_empty(target: &mut Vec<String>, value: String) {
    if !value.is_empty() {
        target.push(value);
    }
}

/// Regroups unconsumed lines into paragraphs.
///
/// Blank lines end a paragraph. Outline markers and all-caps headings start a
/// new one, and a heading also stands alone. Hyphenated line breaks are
/// rejoined.
fn paragraphs(lines: &[String], consumed: &[bool]) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut flush = |current: &mut String| {
        if !current.is_empty() {
            out.push(std::mem::take(current));
        }
    };

    for (line, _) in lines.iter().zip(consumed).filter(|(_, used)| !**used) {
        if line.is_empty() {
            flush(&mut current);
            continue;
        }
        let heading = is_all_caps_heading(line);
        if heading || starts_outline_item(line) {
            flush(&mut current);
        }
        append_line(&mut current, line);
        if heading {
            flush(&mut current);
        }
    }
    flush(&mut current);
    out
}

fn append_line(current: &mut String, line: &str) {
    if current.is_empty() {
        current.push_str(line);
        return;
    }
    let hyphenated = current.ends_with('-')
        && current
            .chars()
            .rev()
            .nth(1)
            .is_some_and(char::is_alphabetic)
        && line.chars().next().is_some_and(char::is_lowercase);
    if hyphenated {
        current.pop();
    } else {
        current.push(' ');
    }
    current.push_str(line);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_board_policy_and_adopted_lines_are_consumed() {
        let text = "BOARD POLICY: 2.10 Attendance\nADOPTED: 1/1/2020\n\nStudents are expected to attend every day.";
        let fields = parse_policy_text(text);
        assert_eq!(fields.board_policy_number, "2.10");
        assert_eq!(fields.title, "Attendance");
        assert_eq!(fields.adopted_date, "1/1/2020");
        assert_eq!(fields.wording, "Students are expected to attend every day.");
        assert!(!fields.wording.contains("BOARD POLICY"));
        assert!(!fields.wording.contains("ADOPTED"));
    }

    #[test]
    fn test_title_on_following_line() {
        let fields = parse_policy_text("BOARD POLICY NO. 4.05\nSTUDENT TRANSFERS\nBody text.");
        assert_eq!(fields.board_policy_number, "4.05");
        assert_eq!(fields.title, "STUDENT TRANSFERS");
        assert_eq!(fields.wording, "Body text.");
    }

    #[test]
    fn test_inline_labels_split_on_one_line() {
        let segments = label_segments("SERIES: 2000 ADOPTED: 5/12/2015").unwrap();
        assert_eq!(
            segments,
            [
                (Label::Series, "2000".to_string()),
                (Label::Adopted, "5/12/2015".to_string())
            ]
        );
        assert!(label_segments("The board adopted: nothing").is_none());
        assert!(label_segments("Board policy requires attendance.").is_none());
    }

    #[test]
    fn test_revision_history_block_and_revised_date() {
        let text = "\
BOARD POLICY: 3.01 Budget
REVISION HISTORY:
6/10/2015
FORMERLY: 3.1
REVISED: 8/1/2021

Page 2 of 3
The budget is adopted annually.";
        let fields = parse_policy_text(text);
        assert_eq!(fields.revision_history, "6/10/2015; FORMERLY: 3.1; REVISED: 8/1/2021");
        assert_eq!(fields.revised_date, "8/1/2021");
        assert_eq!(fields.wording, "The budget is adopted annually.");
    }

    #[test]
    fn test_reference_blocks_stop_at_next_label() {
        let text = "\
Legal References: A.C.A. § 6-18-501,
A.C.A. § 6-18-502
Cross References: 4.7 Absences
4.8 Make-up Work
Date Adopted: 1/1/2019";
        let fields = parse_policy_text(text);
        assert_eq!(fields.legal_references, "A.C.A. § 6-18-501,; A.C.A. § 6-18-502");
        assert_eq!(fields.cross_references, "4.7 Absences; 4.8 Make-up Work");
        assert_eq!(fields.adopted_date, "1/1/2019");
        assert!(fields.wording.is_empty());
    }

    #[test]
    fn test_letterhead_and_page_markers_are_dropped() {
        let text = "\
SPRINGDALE SCHOOL DISTRICT
The district shall maintain
records.

- 1 -
SPRINGDALE SCHOOL DISTRICT
Records are kept for five years.";
        let fields = parse_policy_text(text);
        assert_eq!(
            fields.wording,
            "The district shall maintain records.\n\nRecords are kept for five years."
        );
    }

    #[test]
    fn test_letterhead_at_form_feed_page_tops_is_dropped() {
        let text = "ROGERS PUBLIC SCHOOLS\nVisitors sign in.\u{c}ROGERS PUBLIC SCHOOLS\nBadges are worn.";
        let fields = parse_policy_text(text);
        assert_eq!(fields.wording, "Visitors sign in. Badges are worn.");
        assert!(letterhead_lines(text).contains("ROGERS PUBLIC SCHOOLS"));
    }

    #[test]
    fn test_repeated_lead_in_inside_body_is_kept() {
        let text = "\
BOARD POLICY: 4.10 Discipline
Students shall:
attend class.

Staff shall: report incidents.

Students shall:
be respectful.";
        let fields = parse_policy_text(text);
        assert!(letterhead_lines(text).is_empty());
        assert_eq!(fields.wording.matches("Students shall:").count(), 2);
        assert!(fields.wording.contains("Students shall: attend class."));
        assert!(fields.wording.ends_with("Students shall: be respectful."));
    }

    #[test]
    fn test_forced_paragraph_breaks() {
        let text = "\
PURPOSE
I. The board sets goals.
A. Goals are reviewed
yearly.
1. Reports are public.
Each report is posted.";
        let fields = parse_policy_text(text);
        assert_eq!(
            fields.wording,
            "PURPOSE\n\nI. The board sets goals.\n\nA. Goals are reviewed yearly.\n\n1. Reports are public. Each report is posted."
        );
    }

    #[test]
    fn test_hyphenated_line_break_is_rejoined() {
        let fields = parse_policy_text("Students must pre-\nregister and re-\nenroll.");
        assert_eq!(fields.wording, "Students must preregister and reenroll.");
    }

    #[test]
    fn test_predicates() {
        assert!(is_page_marker("Page 3 of 7"));
        assert!(is_page_marker("12"));
        assert!(!is_page_marker("12 students"));
        assert!(starts_outline_item("IV. Scope"));
        assert!(starts_outline_item("(b) Exceptions"));
        assert!(!starts_outline_item("In addition"));
        assert!(is_all_caps_heading("STUDENT CONDUCT"));
        assert!(!is_all_caps_heading("Student conduct"));
        assert!(is_revision_continuation("March 3, 2022"));
        assert!(!is_revision_continuation("The board meets monthly."));
    }

    #[test]
    fn test_normalize_lines_collapses_blank_runs() {
        let lines = normalize_lines("a\r\n\r\n\r\n b \u{c}c\n\n");
        assert_eq!(lines, ["a", "", "b", "c"]);
    }
}

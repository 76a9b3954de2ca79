//! Content nodes for table-linked detail pages.
//!
//! Detail pages ship their content either as server-rendered HTML or as an
//! embedded client-state payload (`window.__INITIAL_STATE__ = "..."`) whose
//! shape varies by page. Both are reduced to the same flat list of
//! [`ContentNode`]s: the payload through a tag-driven walk over
//! `serde_json::Value`, the HTML through a document-order element scan.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

use super::html::{
    TableCell, compile_static_selector, element_text, has_ancestor_named, is_heading_tag,
    table_rows,
};
use super::utils::{compile_static_regex, normalize_space};

/// A typed fragment of a page's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    /// Heading text.
    Heading(String),
    /// Paragraph or list text.
    Paragraph(String),
    /// Table rows, header first.
    Table(Vec<Vec<TableCell>>),
}

impl ContentNode {
    /// Plain text of the node; tables render one row per line.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Heading(text) | Self::Paragraph(text) => text.clone(),
            Self::Table(rows) => rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| cell.text.as_str())
                        .filter(|text| !text.is_empty())
                        .collect::<Vec<_>>()
                        .join(" | ")
                })
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Assignment of a known client-state global.
static STATE_ASSIGNMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?:window\.)?(?:__INITIAL_STATE__|__PRELOADED_STATE__)\s*=\s*")
});

/// Double-quoted JS string literal at the start of the input.
static DOUBLE_QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"(?s)^"((?:[^"\\]|\\.)*)""#));

/// Single-quoted JS string literal at the start of the input.
static SINGLE_QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?s)^'((?:[^'\\]|\\.)*)'"));

/// Keys whose value is the content tree, most specific first.
const CONTENT_ROOT_POINTERS: &[&str] = &[
    "/page/content",
    "/page/body",
    "/page/blocks",
    "/content",
    "/body",
];

/// Keys that name the page.
const PAGE_NAME_POINTERS: &[&str] = &["/page/name", "/page/title", "/name", "/title"];

/// Keys tried, in order, when reading a node's text.
const TEXT_KEYS: &[&str] = &[
    "text", "value", "html", "content", "children", "items", "spans", "nodes",
];

/// Locates and decodes the embedded client-state payload.
///
/// The payload is usually a JSON document encoded as a JS string literal; it is
/// decoded as a string first, then parsed. A bare object literal is parsed
/// directly with a streaming deserializer so trailing script is ignored.
#[must_use]
pub fn extract_state_payload(html: &str) -> Option<Value> {
    STATE_ASSIGNMENT_RE.find_iter(html).find_map(|assignment| {
        let rest = html[assignment.end()..].trim_start();
        if rest.starts_with('{') || rest.starts_with('[') {
            return serde_json::Deserializer::from_str(rest)
                .into_iter::<Value>()
                .next()
                .and_then(Result::ok);
        }
        let (caps, quote) = if rest.starts_with('"') {
            (DOUBLE_QUOTED_RE.captures(rest)?, '"')
        } else if rest.starts_with('\'') {
            (SINGLE_QUOTED_RE.captures(rest)?, '\'')
        } else {
            return None;
        };
        let literal = js_literal_to_json_string(caps.get(1)?.as_str(), quote);
        let decoded: String = serde_json::from_str(&literal).ok()?;
        serde_json::from_str(&decoded).ok()
    })
}

/// Rewrites the body of a JS string literal as a JSON string literal.
///
/// Converts `\xHH` to `\u00HH`, drops the escape from `\'`, and escapes bare
/// double quotes that are legal inside single-quoted JS strings.
fn js_literal_to_json_string(body: &str, quote: char) -> String {
    let mut out = String::with_capacity(body.len() + 2);
    out.push('"');
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('x') => {
                    out.push_str("\\u00");
                    out.extend(chars.by_ref().take(2));
                }
                Some('\'') => out.push('\''),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push_str("\\\\"),
            },
            '"' if quote == '\'' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// The subtree holding the page content, or the payload root.
#[must_use]
pub fn content_root(payload: &Value) -> &Value {
    CONTENT_ROOT_POINTERS
        .iter()
        .find_map(|pointer| payload.pointer(pointer))
        .unwrap_or(payload)
}

/// The page's own name, if the payload carries one.
#[must_use]
pub fn page_name(payload: &Value) -> Option<String> {
    PAGE_NAME_POINTERS
        .iter()
        .filter_map(|pointer| payload.pointer(pointer))
        .filter_map(Value::as_str)
        .map(normalize_space)
        .find(|name| !name.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Heading,
    Paragraph,
    List,
    Table,
}

fn node_kind(map: &Map<String, Value>) -> Option<NodeKind> {
    let tag = ["type", "nodeType", "__typename", "kind"]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))?;
    let tag: String = tag
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    match tag.as_str() {
        "heading" | "header" | "title" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            Some(NodeKind::Heading)
        }
        "paragraph" | "p" | "text" | "richtext" | "blockquote" | "quote" => {
            Some(NodeKind::Paragraph)
        }
        "list" | "bulletedlist" | "numberedlist" | "orderedlist" | "unorderedlist" | "ul"
        | "ol" => Some(NodeKind::List),
        "table" => Some(NodeKind::Table),
        _ => None,
    }
}

/// Collects content nodes in document order.
///
/// Objects whose type tag is recognized become nodes and are not descended
/// into; everything else is walked recursively.
#[must_use]
pub fn collect_content_nodes(root: &Value) -> Vec<ContentNode> {
    let mut nodes = Vec::new();
    walk(root, &mut nodes);
    nodes
}

fn walk(value: &Value, out: &mut Vec<ContentNode>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| walk(item, out)),
        Value::Object(map) => {
            if let Some(kind) = node_kind(map) {
                if let Some(node) = build_node(kind, map) {
                    out.push(node);
                }
                return;
            }
            map.values().for_each(|child| walk(child, out));
        }
        _ => {}
    }
}

fn build_node(kind: NodeKind, map: &Map<String, Value>) -> Option<ContentNode> {
    let node = match kind {
        NodeKind::Heading => ContentNode::Heading(object_text(map)),
        NodeKind::Paragraph => ContentNode::Paragraph(object_text(map)),
        NodeKind::List => {
            let items = ["items", "children", "content"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array));
            let text = match items {
                Some(items) => items
                    .iter()
                    .map(value_text)
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n"),
                None => object_text(map),
            };
            ContentNode::Paragraph(text)
        }
        NodeKind::Table => ContentNode::Table(json_table_rows(map)),
    };
    let empty = match &node {
        ContentNode::Heading(text) | ContentNode::Paragraph(text) => text.is_empty(),
        ContentNode::Table(rows) => rows.is_empty(),
    };
    (!empty).then_some(node)
}

fn object_text(map: &Map<String, Value>) -> String {
    TEXT_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .map(value_text)
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) if text.contains('<') && text.contains('>') => html_fragment_text(text),
        Value::String(text) => normalize_space(text),
        Value::Array(items) => normalize_space(
            &items
                .iter()
                .map(value_text)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Value::Object(map) => object_text(map),
        _ => String::new(),
    }
}

fn html_fragment_text(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    normalize_space(&parsed.root_element().text().collect::<Vec<_>>().join(" "))
}

fn json_table_rows(map: &Map<String, Value>) -> Vec<Vec<TableCell>> {
    let Some(rows) = ["rows", "data", "children", "content"]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_array))
    else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| match row {
            Value::Array(cells) => Some(cells),
            Value::Object(row) => ["cells", "children", "content"]
                .iter()
                .find_map(|key| row.get(*key).and_then(Value::as_array)),
            _ => None,
        })
        .map(|cells| cells.iter().map(json_cell).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .collect()
}

fn json_cell(cell: &Value) -> TableCell {
    let link = find_link(cell);
    TableCell {
        text: value_text(cell),
        href: link.as_ref().map(|(href, _)| href.clone()),
        link_text: link.map(|(_, text)| text),
    }
}

/// First `(href, text)` link inside a JSON cell.
fn find_link(value: &Value) -> Option<(String, String)> {
    match value {
        Value::Object(map) => {
            let href = ["href", "url", "link"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str));
            if let Some(href) = href {
                return Some((href.to_string(), object_text(map)));
            }
            map.values().find_map(find_link)
        }
        Value::Array(items) => items.iter().find_map(find_link),
        Value::String(text) if text.contains("<a") => html_fragment_link(text),
        _ => None,
    }
}

fn html_fragment_link(fragment: &str) -> Option<(String, String)> {
    static LINK: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("a[href]"));
    let parsed = Html::parse_fragment(fragment);
    let link = parsed.select(&LINK).next()?;
    let href = link.value().attr("href")?.to_string();
    Some((href, element_text(link)))
}

/// First table node in the payload whose header row has a cell containing
/// `needle` (lowercase).
#[must_use]
pub fn find_payload_table(payload: &Value, needle: &str) -> Option<Vec<Vec<TableCell>>> {
    collect_content_nodes(payload)
        .into_iter()
        .find_map(|node| match node {
            ContentNode::Table(rows)
                if rows
                    .first()
                    .is_some_and(|header| header.iter().any(|c| c.text.to_lowercase().contains(needle))) =>
            {
                Some(rows)
            }
            _ => None,
        })
}

/// Builds content nodes from server-rendered HTML.
///
/// Navigation chrome is skipped; list items and table cells are not
/// re-emitted as paragraphs.
#[must_use]
pub fn content_nodes_from_html(html: &str) -> Vec<ContentNode> {
    static ROOTS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
        ["main", "article", "#content", ".content", "body"]
            .iter()
            .map(|s| compile_static_selector(s))
            .collect()
    });
    static BLOCKS: LazyLock<Selector> =
        LazyLock::new(|| compile_static_selector("h1, h2, h3, h4, h5, h6, p, li, table"));

    let document = Html::parse_document(html);
    let Some(root) = ROOTS
        .iter()
        .find_map(|selector| document.select(selector).next())
    else {
        return Vec::new();
    };

    let mut nodes = Vec::new();
    for element in root.select(&BLOCKS) {
        if has_ancestor_named(element, &["nav", "header", "footer", "script", "noscript"]) {
            continue;
        }
        let name = element.value().name();
        if name == "table" {
            if has_ancestor_named(element, &["table"]) {
                continue;
            }
            let rows = table_rows(element);
            if !rows.is_empty() {
                nodes.push(ContentNode::Table(rows));
            }
            continue;
        }
        if has_ancestor_named(element, &["table", "li"]) {
            continue;
        }
        let text = element_text(element);
        if text.is_empty() {
            continue;
        }
        if is_heading_tag(name) {
            nodes.push(ContentNode::Heading(text));
        } else {
            nodes.push(ContentNode::Paragraph(text));
        }
    }
    nodes
}

/// `<title>` or first `<h1>` of a document, used as the page name.
#[must_use]
pub fn html_page_name(html: &str) -> Option<String> {
    static TITLE: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("title, h1"));
    let document = Html::parse_document(html);
    document
        .select(&TITLE)
        .map(element_text)
        .find(|text| !text.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_extract_state_payload_decodes_string_literal() {
        let html = r#"<script>window.__INITIAL_STATE__ = "{\"page\":{\"name\":\"Dress \x26 Grooming\",\"content\":[]}}";</script>"#;
        let payload = extract_state_payload(html).unwrap();
        assert_eq!(page_name(&payload).as_deref(), Some("Dress & Grooming"));
    }

    #[test]
    fn test_extract_state_payload_single_quoted_literal() {
        let html = r#"<script>__PRELOADED_STATE__ = '{"page":{"title":"It\'s here"}}';</script>"#;
        let payload = extract_state_payload(html).unwrap();
        assert_eq!(page_name(&payload).as_deref(), Some("It's here"));
    }

    #[test]
    fn test_extract_state_payload_bare_object_ignores_trailing_script() {
        let html = r#"<script>window.__INITIAL_STATE__ = {"page":{"name":"Bare"}}; init();</script>"#;
        let payload = extract_state_payload(html).unwrap();
        assert_eq!(page_name(&payload).as_deref(), Some("Bare"));
    }

    #[test]
    fn test_extract_state_payload_absent() {
        assert!(extract_state_payload("<html><body>plain</body></html>").is_none());
    }

    #[test]
    fn test_collect_content_nodes_walks_any_shape() {
        let payload = json!({
            "page": {
                "content": {
                    "sections": [
                        {"type": "heading", "text": "1.01 Dress Code"},
                        {"wrapper": {"nodeType": "paragraph", "children": [
                            {"type": "span", "text": "Students shall"},
                            {"type": "span", "text": "dress appropriately."}
                        ]}},
                        {"type": "bulleted-list", "items": ["No hats", {"text": "No logos"}]},
                        {"__typename": "Table", "rows": [
                            {"cells": ["Statutory Authority", "History"]},
                            {"cells": ["A.C.A. 6-18-502", "<p>Adopted 2019</p>"]}
                        ]}
                    ]
                }
            }
        });
        let nodes = collect_content_nodes(content_root(&payload));
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0], ContentNode::Heading("1.01 Dress Code".to_string()));
        assert_eq!(
            nodes[1],
            ContentNode::Paragraph("Students shall dress appropriately.".to_string())
        );
        assert_eq!(nodes[2], ContentNode::Paragraph("No hats\nNo logos".to_string()));
        let ContentNode::Table(rows) = &nodes[3] else {
            panic!("expected table");
        };
        assert_eq!(rows[1][1].text, "Adopted 2019");
    }

    #[test]
    fn test_json_table_cell_links() {
        let payload = json!({"type": "table", "rows": [
            [{"text": "Name of Policy"}],
            [{"type": "link", "href": "/page/1", "text": "1.01 Dress Code"}]
        ]});
        let rows = find_payload_table(&payload, "name of policy").unwrap();
        assert_eq!(rows[1][0].href.as_deref(), Some("/page/1"));
        assert_eq!(rows[1][0].link_text.as_deref(), Some("1.01 Dress Code"));
    }

    #[test]
    fn test_content_nodes_from_html_skips_chrome_and_nested_blocks() {
        let html = r"<html><body>
            <nav><ul><li>Home</li></ul></nav>
            <main>
              <h1>1.01 Dress Code</h1>
              <p>Students shall dress appropriately.</p>
              <ul><li><p>No hats</p></li></ul>
              <table><tr><th>Statutory Authority</th></tr><tr><td><p>6-18-502</p></td></tr></table>
            </main></body></html>";
        let nodes = content_nodes_from_html(html);
        assert_eq!(
            nodes
                .iter()
                .map(ContentNode::text)
                .collect::<Vec<_>>(),
            [
                "1.01 Dress Code",
                "Students shall dress appropriately.",
                "No hats",
                "Statutory Authority\n6-18-502"
            ]
        );
    }
}

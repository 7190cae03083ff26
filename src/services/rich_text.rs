// Rich text parsing
// Converts the editor's constrained HTML subset into styled inline runs and
// paragraphs for document export

use lazy_static::lazy_static;
use quick_xml::escape::{resolve_html5_entity, resolve_predefined_entity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;

use super::error::ExportError;

lazy_static! {
    static ref PARAGRAPH_TAG: Regex = Regex::new(r"(?i)<p[\s>]").expect("Invalid paragraph regex");
    static ref ANY_TAG: Regex = Regex::new(r"<[^>]*>").expect("Invalid tag regex");
}

/// Elements that never have a closing tag in HTML.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

// ============================================================================
// Types
// ============================================================================

/// Formatting inherited down through nested tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl RunStyle {
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }

    fn with_tag(mut self, tag: &str) -> Self {
        match tag {
            "strong" | "b" => self.bold = true,
            "em" | "i" => self.italic = true,
            "u" => self.underline = true,
            _ => {}
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text { text: String, style: RunStyle },
    Link { text: String, href: String, style: RunStyle },
    LineBreak,
}

impl Inline {
    pub fn text(text: impl Into<String>, style: RunStyle) -> Self {
        Inline::Text {
            text: text.into(),
            style,
        }
    }
}

/// A top-level item of parsed rich text. Only top-level `<p>` elements become
/// paragraphs; everything else arrives as loose inline runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Vec<Inline>),
    Inline(Inline),
}

/// Result of removing a single wrapping `<p>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrippedHtml<'a> {
    pub html: &'a str,
    pub has_inner_paragraph: bool,
}

// ============================================================================
// HTML Tree
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum HtmlNode {
    Element {
        tag: String,
        href: Option<String>,
        children: Vec<HtmlNode>,
    },
    Text(String),
}

impl HtmlNode {
    fn text_content(&self, out: &mut String) {
        match self {
            HtmlNode::Text(text) => out.push_str(text),
            HtmlNode::Element { children, .. } => {
                for child in children {
                    child.text_content(out);
                }
            }
        }
    }
}

struct OpenElement {
    tag: String,
    href: Option<String>,
    children: Vec<HtmlNode>,
}

impl OpenElement {
    fn from_start(e: &BytesStart) -> Self {
        let tag = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
        let href = e
            .html_attributes()
            .flatten()
            .find(|attr| attr.key.as_ref().eq_ignore_ascii_case(b"href"))
            .map(|attr| decode_entities(&String::from_utf8_lossy(&attr.value)));

        Self {
            tag,
            href,
            children: Vec::new(),
        }
    }

    fn into_node(self) -> HtmlNode {
        HtmlNode::Element {
            tag: self.tag,
            href: self.href,
            children: self.children,
        }
    }
}

/// Longest HTML5 entity name is 31 characters.
const MAX_ENTITY_LEN: usize = 32;

fn resolve_reference(name: &str) -> Option<String> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse::<u32>().ok()?,
        };
        return char::from_u32(code)
            .filter(|c| *c != '\0')
            .map(String::from);
    }

    resolve_predefined_entity(name)
        .or_else(|| resolve_html5_entity(name))
        .map(str::to_string)
}

/// Decodes character references one at a time. Anything unrecognised,
/// including a bare `&`, is kept as written.
pub fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];

        let decoded = after
            .find(';')
            .filter(|&end| end > 0 && end <= MAX_ENTITY_LEN)
            .and_then(|end| resolve_reference(&after[..end]).map(|text| (text, end)));

        match decoded {
            Some((text, end)) => {
                out.push_str(&text);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn push_node(stack: &mut [OpenElement], root: &mut Vec<HtmlNode>, node: HtmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => root.push(node),
    }
}

/// Builds a lenient node tree: unclosed elements are closed at the end,
/// stray closing tags are ignored, void elements need no closing tag.
fn build_tree(html: &str) -> Result<Vec<HtmlNode>, ExportError> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut root = Vec::new();
    let mut stack: Vec<OpenElement> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let element = OpenElement::from_start(&e);
                if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                    push_node(&mut stack, &mut root, element.into_node());
                } else {
                    stack.push(element);
                }
            }
            Ok(Event::Empty(e)) => {
                let element = OpenElement::from_start(&e);
                push_node(&mut stack, &mut root, element.into_node());
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                if let Some(pos) = stack.iter().rposition(|el| el.tag == tag) {
                    while stack.len() > pos {
                        if let Some(element) = stack.pop() {
                            push_node(&mut stack, &mut root, element.into_node());
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = decode_entities(&String::from_utf8_lossy(&e));
                push_node(&mut stack, &mut root, HtmlNode::Text(text));
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                push_node(&mut stack, &mut root, HtmlNode::Text(text));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ExportError::RichText(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
        }
    }

    while let Some(element) = stack.pop() {
        push_node(&mut stack, &mut root, element.into_node());
    }

    Ok(root)
}

// ============================================================================
// Run Conversion
// ============================================================================

enum Parsed {
    Paragraph(Vec<Inline>),
    Runs(Vec<Inline>),
}

fn parse_node(node: &HtmlNode, inherited: RunStyle) -> Parsed {
    match node {
        HtmlNode::Text(raw) => {
            let text = raw.replace('\t', "    ");
            if text.trim().is_empty() {
                return Parsed::Runs(Vec::new());
            }
            Parsed::Runs(vec![Inline::text(text, inherited)])
        }
        HtmlNode::Element {
            tag,
            href,
            children,
        } => {
            let style = inherited.with_tag(tag);
            match tag.as_str() {
                "p" => Parsed::Paragraph(parse_children(children, style)),
                "br" => Parsed::Runs(vec![Inline::LineBreak]),
                "a" => {
                    let mut text = String::new();
                    node.text_content(&mut text);
                    Parsed::Runs(vec![Inline::Link {
                        text,
                        href: href.clone().unwrap_or_default(),
                        style,
                    }])
                }
                _ => Parsed::Runs(parse_children(children, style)),
            }
        }
    }
}

/// Nested paragraphs and unknown tags collapse into their children's runs.
fn parse_children(children: &[HtmlNode], style: RunStyle) -> Vec<Inline> {
    let mut runs = Vec::new();
    for child in children {
        match parse_node(child, style) {
            Parsed::Paragraph(inner) | Parsed::Runs(inner) => runs.extend(inner),
        }
    }
    runs
}

/// Parses rich text into top-level blocks.
pub fn parse_rich_text(html: &str) -> Result<Vec<Block>, ExportError> {
    let tree = build_tree(html)?;
    let mut blocks = Vec::new();

    for node in &tree {
        match parse_node(node, RunStyle::default()) {
            Parsed::Paragraph(runs) => blocks.push(Block::Paragraph(runs)),
            Parsed::Runs(runs) => blocks.extend(runs.into_iter().map(Block::Inline)),
        }
    }

    Ok(blocks)
}

/// Parses rich text that is known to hold no top-level paragraphs, returning
/// the runs in order.
pub fn parse_inline(html: &str) -> Result<Vec<Inline>, ExportError> {
    let mut runs = Vec::new();
    for block in parse_rich_text(html)? {
        match block {
            Block::Paragraph(inner) => runs.extend(inner),
            Block::Inline(run) => runs.push(run),
        }
    }
    Ok(runs)
}

/// Removes one wrapping `<p>...</p>` when the content holds no other
/// paragraph, so it can be inlined after a label.
pub fn strip_outer_paragraph(html: &str) -> StrippedHtml<'_> {
    let trimmed = html.trim();

    if trimmed.starts_with("<p>") && trimmed.ends_with("</p>") {
        let inner = &trimmed[3..trimmed.len() - 4];
        if PARAGRAPH_TAG.is_match(inner) {
            return StrippedHtml {
                html,
                has_inner_paragraph: true,
            };
        }
        return StrippedHtml {
            html: inner,
            has_inner_paragraph: false,
        };
    }

    StrippedHtml {
        html,
        has_inner_paragraph: PARAGRAPH_TAG.is_match(html),
    }
}

/// Text content of rich text with all markup removed.
pub fn plain_text(html: &str) -> String {
    match build_tree(html) {
        Ok(tree) => {
            let mut text = String::new();
            for node in &tree {
                node.text_content(&mut text);
            }
            text
        }
        Err(_) => ANY_TAG.replace_all(html, "").into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Inline {
        Inline::text(s, RunStyle::default())
    }

    #[test]
    fn test_plain_paragraph() {
        let blocks = parse_rich_text("<p>Hello world</p>").unwrap();
        assert_eq!(blocks, vec![Block::Paragraph(vec![text("Hello world")])]);
    }

    #[test]
    fn test_formatting_is_inherited() {
        let blocks = parse_rich_text("<p><strong>bold <em>both</em></strong></p>").unwrap();
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![
                Inline::text("bold ", RunStyle::bold()),
                Inline::text(
                    "both",
                    RunStyle {
                        bold: true,
                        italic: true,
                        underline: false
                    }
                ),
            ])]
        );
    }

    #[test]
    fn test_b_i_u_aliases() {
        let runs = parse_inline("<b>x</b><i>y</i><u>z</u>").unwrap();
        assert_eq!(
            runs,
            vec![
                Inline::text("x", RunStyle::bold()),
                Inline::text(
                    "y",
                    RunStyle {
                        italic: true,
                        ..RunStyle::default()
                    }
                ),
                Inline::text(
                    "z",
                    RunStyle {
                        underline: true,
                        ..RunStyle::default()
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_line_break_without_closing_tag() {
        let blocks = parse_rich_text("<p>one<br>two</p>").unwrap();
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![
                text("one"),
                Inline::LineBreak,
                text("two")
            ])]
        );
    }

    #[test]
    fn test_self_closing_line_break() {
        let runs = parse_inline("a<br/>b").unwrap();
        assert_eq!(runs, vec![text("a"), Inline::LineBreak, text("b")]);
    }

    #[test]
    fn test_link_keeps_text_and_href() {
        let runs = parse_inline(r#"see <a href="https://example.com" target="_blank"><b>here</b></a>"#)
            .unwrap();
        assert_eq!(
            runs,
            vec![
                text("see "),
                Inline::Link {
                    text: "here".to_string(),
                    href: "https://example.com".to_string(),
                    style: RunStyle::default(),
                },
            ]
        );
    }

    #[test]
    fn test_unknown_tags_pass_children_through() {
        let runs = parse_inline(r#"<span class="x"><strong>kept</strong></span>"#).unwrap();
        assert_eq!(runs, vec![Inline::text("kept", RunStyle::bold())]);
    }

    #[test]
    fn test_nested_paragraphs_collapse() {
        let blocks = parse_rich_text("<div><p>a</p><p>b</p></div>").unwrap();
        assert_eq!(
            blocks,
            vec![Block::Inline(text("a")), Block::Inline(text("b"))]
        );
    }

    #[test]
    fn test_whitespace_only_text_dropped_and_tabs_expanded() {
        let blocks = parse_rich_text("<p>a\tb</p>  \n<p>c</p>").unwrap();
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph(vec![text("a    b")]),
                Block::Paragraph(vec![text("c")]),
            ]
        );
    }

    #[test]
    fn test_entities_are_decoded() {
        let runs = parse_inline("Tom &amp; Jerry&nbsp;&#33;").unwrap();
        assert_eq!(runs, vec![text("Tom & Jerry\u{a0}!")]);
    }

    #[test]
    fn test_html_named_entities_are_decoded() {
        let runs = parse_inline("Tom&rsquo;s caf&eacute; &amp; bar&hellip;").unwrap();
        assert_eq!(runs, vec![text("Tom\u{2019}s caf\u{e9} & bar\u{2026}")]);
    }

    #[test]
    fn test_unknown_entity_does_not_block_the_rest() {
        let runs = parse_inline("&bogus; &lt;tag&gt; &#x41;&#66;").unwrap();
        assert_eq!(runs, vec![text("&bogus; <tag> AB")]);
    }

    #[test]
    fn test_decode_entities_edge_cases() {
        assert_eq!(decode_entities("a & b; c"), "a & b; c");
        assert_eq!(decode_entities("&;&#;&#x;&#0;"), "&;&#;&#x;&#0;");
        assert_eq!(decode_entities("tail &amp"), "tail &amp");
        assert_eq!(decode_entities("&eacute;&Eacute;"), "\u{e9}\u{c9}");
    }

    #[test]
    fn test_link_href_entities_are_decoded() {
        let runs = parse_inline(r#"<a href="https://x.test/?a=1&amp;b=2">x</a>"#).unwrap();
        assert!(matches!(
            &runs[0],
            Inline::Link { href, .. } if href == "https://x.test/?a=1&b=2"
        ));
    }

    #[test]
    fn test_unescaped_ampersand_kept_raw() {
        let runs = parse_inline("salt & pepper").unwrap();
        assert_eq!(runs, vec![text("salt & pepper")]);
    }

    #[test]
    fn test_unclosed_elements_are_closed() {
        let blocks = parse_rich_text("<p><b>open").unwrap();
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![Inline::text("open", RunStyle::bold())])]
        );
    }

    #[test]
    fn test_empty_paragraph() {
        let blocks = parse_rich_text("<p></p>").unwrap();
        assert_eq!(blocks, vec![Block::Paragraph(vec![])]);
    }

    #[test]
    fn test_strip_outer_paragraph_single() {
        let stripped = strip_outer_paragraph("  <p>What is <b>2+2</b>?</p> ");
        assert_eq!(stripped.html, "What is <b>2+2</b>?");
        assert!(!stripped.has_inner_paragraph);
    }

    #[test]
    fn test_strip_outer_paragraph_keeps_multi_paragraph() {
        let html = "<p>first</p><p>second</p>";
        let stripped = strip_outer_paragraph(html);
        assert_eq!(stripped.html, html);
        assert!(stripped.has_inner_paragraph);
    }

    #[test]
    fn test_strip_outer_paragraph_without_wrapper() {
        let stripped = strip_outer_paragraph("plain <i>text</i>");
        assert_eq!(stripped.html, "plain <i>text</i>");
        assert!(!stripped.has_inner_paragraph);

        let stripped = strip_outer_paragraph("intro<P class=\"x\">para</P>");
        assert!(stripped.has_inner_paragraph);
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(
            plain_text("<p>Read <b>this</b></p><p>carefully</p>"),
            "Read thiscarefully"
        );
        assert_eq!(plain_text(""), "");
    }
}

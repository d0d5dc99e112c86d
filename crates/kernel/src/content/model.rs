//! Structured post body.
//!
//! A closed set of block and inline variants. Each variant writes its own
//! HTML and is read back from the element that variant produces, so
//! [`Document::from_html`] and [`Document::to_html`] round-trip image
//! width, image alignment and anchor id/label exactly. Anything below that
//! granularity (unknown tags, classes, nested inline styling order) is
//! normalized away.

use serde::{Deserialize, Serialize};

use super::html::{self, Element, Node, escape_text, push_attr};

/// Narrowest an image may be, in percent of the column.
pub const MIN_IMAGE_WIDTH: u8 = 25;
/// Widest an image may be, in percent of the column.
pub const MAX_IMAGE_WIDTH: u8 = 100;

/// `data-type` value marking an anchor span.
pub const TOC_ANCHOR_TYPE: &str = "toc-anchor";

/// Horizontal placement of an image block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl ImageAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageAlign::Left => "left",
            ImageAlign::Center => "center",
            ImageAlign::Right => "right",
        }
    }

    /// Lenient parse; anything unrecognized is centered.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => ImageAlign::Left,
            "right" => ImageAlign::Right,
            _ => ImageAlign::Center,
        }
    }
}

/// Resizable, aligned image block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageNode {
    pub src: String,
    pub alt: String,
    width: u8,
    pub align: ImageAlign,
}

impl ImageNode {
    /// Full-width, centered image.
    pub fn new(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            alt: alt.into(),
            width: MAX_IMAGE_WIDTH,
            align: ImageAlign::default(),
        }
    }

    pub fn with_width(mut self, percent: f64) -> Self {
        self.set_width(percent);
        self
    }

    pub fn with_align(mut self, align: ImageAlign) -> Self {
        self.align = align;
        self
    }

    /// Width in percent, always within `MIN_IMAGE_WIDTH..=MAX_IMAGE_WIDTH`.
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Set the width, rounding and clamping. Non-finite input is ignored.
    pub fn set_width(&mut self, percent: f64) {
        if percent.is_finite() {
            self.width = clamp_width(percent);
        }
    }

    fn write_html(&self, out: &mut String) {
        out.push_str("<img");
        push_attr(out, "src", &self.src);
        push_attr(out, "alt", &self.alt);
        push_attr(out, "data-width", &self.width.to_string());
        push_attr(out, "data-align", self.align.as_str());
        push_attr(out, "style", &format!("width: {}%", self.width));
        out.push('>');
    }

    /// Read an `<img>` element. Returns None without a usable `src`.
    pub fn from_element(el: &Element) -> Option<Self> {
        let src = el.attr("src").map(str::trim).filter(|s| !s.is_empty())?;
        let mut node = ImageNode::new(src, el.attr("alt").unwrap_or_default());
        if let Some(width) = element_width(el) {
            node.set_width(width);
        }
        if let Some(align) = el.attr("data-align") {
            node.align = ImageAlign::parse(align);
        }
        Some(node)
    }
}

/// Width from `data-width`, a percent `width` attribute, or inline style.
fn element_width(el: &Element) -> Option<f64> {
    if let Some(w) = el.attr("data-width").and_then(parse_percent) {
        return Some(w);
    }
    if let Some(w) = el.attr("width").filter(|w| w.trim().ends_with('%'))
        && let Some(w) = parse_percent(w)
    {
        return Some(w);
    }
    el.attr("style").and_then(|style| {
        style.split(';').find_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            if prop.trim().eq_ignore_ascii_case("width") && value.trim().ends_with('%') {
                parse_percent(value)
            } else {
                None
            }
        })
    })
}

fn parse_percent(value: &str) -> Option<f64> {
    value
        .trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn clamp_width(percent: f64) -> u8 {
    let clamped = percent
        .round()
        .clamp(f64::from(MIN_IMAGE_WIDTH), f64::from(MAX_IMAGE_WIDTH));
    // In range after the clamp.
    clamped as u8
}

/// Invisible outline marker. Atomic: it has an id and a label, never content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocAnchor {
    pub id: String,
    pub label: String,
}

impl TocAnchor {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    fn write_html(&self, out: &mut String) {
        out.push_str("<span");
        push_attr(out, "data-type", TOC_ANCHOR_TYPE);
        push_attr(out, "id", &self.id);
        push_attr(out, "data-id", &self.id);
        push_attr(out, "data-label", &self.label);
        out.push_str("></span>");
    }

    /// Whether an element is an anchor marker.
    pub fn is_anchor_element(el: &Element) -> bool {
        el.name == "span"
            && (el.attr("data-type") == Some(TOC_ANCHOR_TYPE) || el.has_attr("data-toc-anchor"))
    }

    /// Read an anchor span. The label falls back to the span's text.
    pub fn from_element(el: &Element) -> Option<Self> {
        if !Self::is_anchor_element(el) {
            return None;
        }
        let id = el
            .attr("data-id")
            .or_else(|| el.attr("id"))
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        let label = match el.attr("data-label") {
            Some(label) => label.to_string(),
            None => html::collapse_whitespace(&el.text_content()).trim().to_string(),
        };
        Some(TocAnchor::new(id, label))
    }
}

/// Inline formatting. Marks on a text run are kept sorted in this order,
/// which is also the nesting order on output (link outermost).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "href", rename_all = "lowercase")]
pub enum Mark {
    Link(String),
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
}

impl Mark {
    fn open_tag(&self, out: &mut String) {
        match self {
            Mark::Link(href) => {
                out.push_str("<a");
                push_attr(out, "href", href);
                out.push('>');
            }
            other => {
                out.push('<');
                out.push_str(other.tag());
                out.push('>');
            }
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            Mark::Link(_) => "a",
            Mark::Bold => "strong",
            Mark::Italic => "em",
            Mark::Underline => "u",
            Mark::Strike => "s",
            Mark::Code => "code",
        }
    }

    /// Mark contributed by an inline element, if any.
    fn from_element(el: &Element) -> Option<Self> {
        Some(match el.name.as_str() {
            "strong" | "b" => Mark::Bold,
            "em" | "i" => Mark::Italic,
            "u" | "ins" => Mark::Underline,
            "s" | "del" | "strike" => Mark::Strike,
            "code" | "kbd" | "samp" => Mark::Code,
            "a" => Mark::Link(safe_href(el.attr("href")?)?),
            _ => return None,
        })
    }

    fn same_kind(&self, other: &Mark) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Accept http(s), mailto, fragment and relative links.
pub fn safe_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    let scheme_end = lower.find(':');
    let path_start = lower.find(['/', '?', '#']).unwrap_or(lower.len());
    match scheme_end {
        Some(end) if end < path_start => {
            let scheme = &lower[..end];
            matches!(scheme, "http" | "https" | "mailto").then(|| href.to_string())
        }
        _ => Some(href.to_string()),
    }
}

/// Inline content of a paragraph or heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inline {
    Text { text: String, marks: Vec<Mark> },
    TocAnchor(TocAnchor),
    HardBreak,
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn marked(text: impl Into<String>, mut marks: Vec<Mark>) -> Self {
        marks.sort();
        marks.dedup();
        Inline::Text {
            text: text.into(),
            marks,
        }
    }

    /// Length in cursor positions: characters for text, one for atoms.
    pub fn len(&self) -> usize {
        match self {
            Inline::Text { text, .. } => text.chars().count(),
            Inline::TocAnchor(_) | Inline::HardBreak => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Inline::Text { text, marks } => {
                for mark in marks {
                    mark.open_tag(out);
                }
                out.push_str(&escape_text(text));
                for mark in marks.iter().rev() {
                    out.push_str("</");
                    out.push_str(mark.tag());
                    out.push('>');
                }
            }
            Inline::TocAnchor(anchor) => anchor.write_html(out),
            Inline::HardBreak => out.push_str("<br>"),
        }
    }
}

/// Merge adjacent text runs with equal marks and drop empty runs.
pub fn normalize_inlines(inlines: &mut Vec<Inline>) {
    let mut merged: Vec<Inline> = Vec::with_capacity(inlines.len());
    for inline in inlines.drain(..) {
        if let Inline::Text { text, .. } = &inline
            && text.is_empty()
        {
            continue;
        }
        if let (
            Some(Inline::Text {
                text: prev,
                marks: prev_marks,
            }),
            Inline::Text { text, marks },
        ) = (merged.last_mut(), &inline)
            && prev_marks == marks
        {
            prev.push_str(text);
            continue;
        }
        merged.push(inline);
    }
    *inlines = merged;
}

/// Block content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    Paragraph {
        inlines: Vec<Inline>,
    },
    Heading {
        level: u8,
        /// Existing `id` attribute, kept so outline links stay stable.
        id: Option<String>,
        inlines: Vec<Inline>,
    },
    List {
        ordered: bool,
        items: Vec<Vec<Block>>,
    },
    Blockquote {
        blocks: Vec<Block>,
    },
    Image(ImageNode),
}

impl Block {
    pub fn paragraph(inlines: Vec<Inline>) -> Self {
        Block::Paragraph { inlines }
    }

    /// Heading clamped to level 1 or 2.
    pub fn heading(level: u8, inlines: Vec<Inline>) -> Self {
        Block::Heading {
            level: level.clamp(1, 2),
            id: None,
            inlines,
        }
    }

    /// Inline content for text blocks.
    pub fn inlines(&self) -> Option<&Vec<Inline>> {
        match self {
            Block::Paragraph { inlines } | Block::Heading { inlines, .. } => Some(inlines),
            _ => None,
        }
    }

    pub fn inlines_mut(&mut self) -> Option<&mut Vec<Inline>> {
        match self {
            Block::Paragraph { inlines } | Block::Heading { inlines, .. } => Some(inlines),
            _ => None,
        }
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Block::Paragraph { inlines } => {
                out.push_str("<p>");
                write_inlines(inlines, out);
                out.push_str("</p>");
            }
            Block::Heading { level, id, inlines } => {
                let level = (*level).clamp(1, 2);
                out.push_str(&format!("<h{level}"));
                if let Some(id) = id {
                    push_attr(out, "id", id);
                }
                out.push('>');
                write_inlines(inlines, out);
                out.push_str(&format!("</h{level}>"));
            }
            Block::List { ordered, items } => {
                let tag = if *ordered { "ol" } else { "ul" };
                out.push_str(&format!("<{tag}>"));
                for item in items {
                    out.push_str("<li>");
                    for block in item {
                        block.write_html(out);
                    }
                    out.push_str("</li>");
                }
                out.push_str(&format!("</{tag}>"));
            }
            Block::Blockquote { blocks } => {
                out.push_str("<blockquote>");
                for block in blocks {
                    block.write_html(out);
                }
                out.push_str("</blockquote>");
            }
            Block::Image(image) => image.write_html(out),
        }
    }
}

fn write_inlines(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        inline.write_html(out);
    }
}

/// A post body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Parse stored HTML.
    pub fn from_html(html: &str) -> Self {
        Self {
            blocks: blocks_from_nodes(&html::parse_fragment(html)),
        }
    }

    /// Serialize to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            block.write_html(&mut out);
        }
        out
    }

    /// Visit every inline run in document order, including nested blocks.
    pub fn for_each_inlines_mut(&mut self, f: &mut impl FnMut(&mut Vec<Inline>)) {
        visit_inlines_mut(&mut self.blocks, f);
    }

    /// All anchors in document order.
    pub fn toc_anchors(&self) -> Vec<&TocAnchor> {
        let mut out = Vec::new();
        collect_anchors(&self.blocks, &mut out);
        out
    }
}

fn visit_inlines_mut(blocks: &mut [Block], f: &mut impl FnMut(&mut Vec<Inline>)) {
    for block in blocks {
        match block {
            Block::Paragraph { inlines } | Block::Heading { inlines, .. } => f(inlines),
            Block::List { items, .. } => {
                for item in items {
                    visit_inlines_mut(item, f);
                }
            }
            Block::Blockquote { blocks } => visit_inlines_mut(blocks, f),
            Block::Image(_) => {}
        }
    }
}

fn collect_anchors<'a>(blocks: &'a [Block], out: &mut Vec<&'a TocAnchor>) {
    for block in blocks {
        match block {
            Block::Paragraph { inlines } | Block::Heading { inlines, .. } => {
                out.extend(inlines.iter().filter_map(|i| match i {
                    Inline::TocAnchor(a) => Some(a),
                    _ => None,
                }));
            }
            Block::List { items, .. } => {
                for item in items {
                    collect_anchors(item, out);
                }
            }
            Block::Blockquote { blocks } => collect_anchors(blocks, out),
            Block::Image(_) => {}
        }
    }
}

/// Inline-level content collected while reading a text block. Images found
/// inline are hoisted into their own blocks.
enum Segment {
    Inline(Inline),
    Image(ImageNode),
}

fn blocks_from_nodes(nodes: &[Node]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut pending: Vec<Segment> = Vec::new();

    for node in nodes {
        let el = match node {
            Node::Text(text) => {
                if !text.trim().is_empty() || !pending.is_empty() {
                    collect_segments(std::slice::from_ref(node), &[], &mut pending);
                }
                continue;
            }
            Node::Element(el) => el,
        };

        match el.name.as_str() {
            "p" | "pre" => {
                flush_paragraph(&mut pending, &mut blocks);
                let marks = if el.name == "pre" { vec![Mark::Code] } else { vec![] };
                let mut segments = Vec::new();
                collect_segments(&el.children, &marks, &mut segments);
                push_text_block(segments, &mut blocks, Block::paragraph, true);
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                flush_paragraph(&mut pending, &mut blocks);
                let level = if el.name == "h1" { 1 } else { 2 };
                let id = el
                    .attr("id")
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from);
                let mut segments = Vec::new();
                collect_segments(&el.children, &[], &mut segments);
                push_text_block(
                    segments,
                    &mut blocks,
                    move |inlines| Block::Heading {
                        level,
                        id: id.clone(),
                        inlines,
                    },
                    false,
                );
            }
            "ul" | "ol" => {
                flush_paragraph(&mut pending, &mut blocks);
                let items = el
                    .children
                    .iter()
                    .filter_map(|child| match child {
                        Node::Element(li) if li.name == "li" => Some(blocks_from_nodes(&li.children)),
                        Node::Element(_) => Some(blocks_from_nodes(std::slice::from_ref(child))),
                        Node::Text(t) if !t.trim().is_empty() => {
                            Some(blocks_from_nodes(std::slice::from_ref(child)))
                        }
                        Node::Text(_) => None,
                    })
                    .collect();
                blocks.push(Block::List {
                    ordered: el.name == "ol",
                    items,
                });
            }
            "blockquote" => {
                flush_paragraph(&mut pending, &mut blocks);
                blocks.push(Block::Blockquote {
                    blocks: blocks_from_nodes(&el.children),
                });
            }
            "img" => {
                flush_paragraph(&mut pending, &mut blocks);
                if let Some(image) = ImageNode::from_element(el) {
                    blocks.push(Block::Image(image));
                }
            }
            "figure" => {
                flush_paragraph(&mut pending, &mut blocks);
                if let Some(image) = find_image(&el.children) {
                    blocks.push(Block::Image(image));
                }
            }
            "hr" | "script" | "style" | "template" | "iframe" | "object" => {
                flush_paragraph(&mut pending, &mut blocks);
            }
            "div" | "section" | "article" | "main" | "header" | "footer" | "aside" | "nav"
            | "body" | "html" | "table" | "tbody" | "thead" | "tr" | "td" | "th" | "li"
            | "dl" | "dt" | "dd" => {
                flush_paragraph(&mut pending, &mut blocks);
                blocks.extend(blocks_from_nodes(&el.children));
            }
            _ => collect_segments(std::slice::from_ref(node), &[], &mut pending),
        }
    }

    flush_paragraph(&mut pending, &mut blocks);
    blocks
}

fn find_image(nodes: &[Node]) -> Option<ImageNode> {
    nodes.iter().find_map(|node| match node {
        Node::Element(el) if el.name == "img" => ImageNode::from_element(el),
        Node::Element(el) => find_image(&el.children),
        Node::Text(_) => None,
    })
}

/// Turn loose inline content into a paragraph.
fn flush_paragraph(pending: &mut Vec<Segment>, blocks: &mut Vec<Block>) {
    if pending.is_empty() {
        return;
    }
    let segments = std::mem::take(pending);
    push_text_block(segments, blocks, Block::paragraph, false);
}

/// Emit a text block, splitting it around hoisted images.
///
/// `keep_empty` keeps a block with no content (an intentionally empty
/// paragraph).
fn push_text_block(
    segments: Vec<Segment>,
    blocks: &mut Vec<Block>,
    make: impl Fn(Vec<Inline>) -> Block,
    keep_empty: bool,
) {
    let mut run: Vec<Inline> = Vec::new();
    let mut emitted = false;

    let finish = |run: &mut Vec<Inline>, blocks: &mut Vec<Block>, force: bool| {
        trim_run(run);
        if !run.is_empty() || force {
            blocks.push(make(std::mem::take(run)));
        }
    };

    for segment in segments {
        match segment {
            Segment::Inline(inline) => run.push(inline),
            Segment::Image(image) => {
                finish(&mut run, &mut *blocks, false);
                blocks.push(Block::Image(image));
                emitted = true;
            }
        }
    }
    finish(&mut run, blocks, keep_empty && !emitted);
}

/// Normalize a run and strip leading/trailing whitespace.
fn trim_run(run: &mut Vec<Inline>) {
    normalize_inlines(run);
    if let Some(Inline::Text { text, .. }) = run.first_mut() {
        *text = text.trim_start_matches(' ').to_string();
    }
    if let Some(Inline::Text { text, .. }) = run.last_mut() {
        *text = text.trim_end_matches(' ').to_string();
    }
    normalize_inlines(run);
}

fn collect_segments(nodes: &[Node], marks: &[Mark], out: &mut Vec<Segment>) {
    for node in nodes {
        match node {
            Node::Text(text) => {
                let text = html::collapse_whitespace(text);
                if !text.is_empty() {
                    out.push(Segment::Inline(Inline::marked(text, marks.to_vec())));
                }
            }
            Node::Element(el) => match el.name.as_str() {
                "br" => out.push(Segment::Inline(Inline::HardBreak)),
                "img" => {
                    if let Some(image) = ImageNode::from_element(el) {
                        out.push(Segment::Image(image));
                    }
                }
                "script" | "style" | "template" => {}
                _ if TocAnchor::is_anchor_element(el) => {
                    if let Some(anchor) = TocAnchor::from_element(el) {
                        out.push(Segment::Inline(Inline::TocAnchor(anchor)));
                    }
                }
                _ => {
                    let mut inner = marks.to_vec();
                    if let Some(mark) = Mark::from_element(el) {
                        // Nested links: the innermost href wins.
                        inner.retain(|m| !m.same_kind(&mark));
                        inner.push(mark);
                    }
                    collect_segments(&el.children, &inner, out);
                }
            },
        }
    }
}

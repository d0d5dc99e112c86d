//! Table-of-contents derivation.
//!
//! The outline is never stored. It is recomputed from a post's HTML and its
//! hidden-label list whenever a post is rendered or edited. Document order
//! is the only ordering.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::content::html::{self, Element, Node};
use crate::content::model::TocAnchor;
use crate::content::slug::slugify;

/// Outline level given to anchor entries.
pub const ANCHOR_LEVEL: u8 = 2;

/// Deepest heading level that appears in the outline.
pub const MAX_HEADING_LEVEL: u8 = 3;

/// One outline entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    pub id: String,
    pub text: String,
    pub level: u8,
}

/// HTML with heading ids filled in, and the outline that links to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedContent {
    pub html: String,
    pub outline: Vec<OutlineEntry>,
}

/// A rendered outline target and its distance from the viewport top.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VisibleTarget {
    pub id: String,
    /// Pixels from the top of the viewport; negative when above it.
    pub top: f64,
}

enum CandidateKind {
    Heading(u8),
    Anchor,
}

struct Candidate {
    kind: CandidateKind,
    id: String,
    text: String,
}

/// Lowercase, with whitespace runs collapsed and trimmed.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Id for a heading without one: `{slug}-{index}`, or `section-{index}`
/// when the text has nothing to slug.
pub fn generated_id(text: &str, index: usize) -> String {
    let slug = slugify(text);
    if slug.is_empty() {
        format!("section-{index}")
    } else {
        format!("{slug}-{index}")
    }
}

fn heading_level(el: &Element) -> Option<u8> {
    let level = el.name.strip_prefix('h')?.parse::<u8>().ok()?;
    (1..=MAX_HEADING_LEVEL).contains(&level).then_some(level)
}

fn heading_text(el: &Element) -> String {
    html::collapse_whitespace(&el.text_content())
        .trim()
        .to_string()
}

/// Hands out heading ids in document order.
///
/// `index` counts every outline-level heading, so generated ids don't
/// depend on the hidden set. A generated id that matches an id already in
/// the document gets a `-2`, `-3`, ... suffix.
struct HeadingIds {
    taken: HashSet<String>,
    index: usize,
}

impl HeadingIds {
    fn new(nodes: &[Node]) -> Self {
        let mut taken = HashSet::new();
        explicit_ids(nodes, &mut taken);
        Self { taken, index: 0 }
    }

    fn next(&mut self, el: &Element, text: &str) -> String {
        let id = match explicit_id(el) {
            Some(id) => id.to_string(),
            None => {
                let base = generated_id(text, self.index);
                let mut id = base.clone();
                let mut n = 2;
                while self.taken.contains(&id) {
                    id = format!("{base}-{n}");
                    n += 1;
                }
                self.taken.insert(id.clone());
                id
            }
        };
        self.index += 1;
        id
    }
}

fn explicit_id(el: &Element) -> Option<&str> {
    el.attr("id").map(str::trim).filter(|s| !s.is_empty())
}

fn explicit_ids(nodes: &[Node], out: &mut HashSet<String>) {
    for node in nodes {
        let Node::Element(el) = node else { continue };
        if let Some(id) = explicit_id(el) {
            out.insert(id.to_string());
        }
        if let Some(anchor) = TocAnchor::from_element(el) {
            out.insert(anchor.id);
        }
        explicit_ids(&el.children, out);
    }
}

/// Walk headings and anchors in document order.
fn collect(nodes: &[Node], ids: &mut HeadingIds, out: &mut Vec<Candidate>) {
    for node in nodes {
        let Node::Element(el) = node else { continue };

        if let Some(level) = heading_level(el) {
            let text = heading_text(el);
            let id = ids.next(el, &text);
            out.push(Candidate {
                kind: CandidateKind::Heading(level),
                id,
                text,
            });
        } else if let Some(anchor) = TocAnchor::from_element(el) {
            out.push(Candidate {
                kind: CandidateKind::Anchor,
                id: anchor.id,
                text: anchor.label.trim().to_string(),
            });
            continue;
        }

        collect(&el.children, ids, out);
    }
}

/// Derive the outline for `html`.
///
/// Headings whose normalized text is in `hidden` are skipped, as are plain
/// headings repeating an earlier heading's text. Anchors are always listed.
pub fn derive_outline(html: &str, hidden: &[String]) -> Vec<OutlineEntry> {
    outline_from_nodes(&html::parse_fragment(html), hidden)
}

fn outline_from_nodes(nodes: &[Node], hidden: &[String]) -> Vec<OutlineEntry> {
    let hidden: HashSet<String> = hidden.iter().map(|h| normalize_label(h)).collect();
    let mut seen: HashSet<String> = HashSet::new();

    let mut candidates = Vec::new();
    collect(nodes, &mut HeadingIds::new(nodes), &mut candidates);

    candidates
        .into_iter()
        .filter_map(|c| {
            if c.text.is_empty() {
                return None;
            }
            let level = match c.kind {
                CandidateKind::Anchor => ANCHOR_LEVEL,
                CandidateKind::Heading(level) => {
                    let key = normalize_label(&c.text);
                    if hidden.contains(&key) || !seen.insert(key) {
                        return None;
                    }
                    level
                }
            };
            Some(OutlineEntry {
                id: c.id,
                text: c.text,
                level,
            })
        })
        .collect()
}

/// Fill in missing heading ids and derive the matching outline.
pub fn annotate_headings(html: &str, hidden: &[String]) -> AnnotatedContent {
    let mut nodes = html::parse_fragment(html);
    let mut ids = HeadingIds::new(&nodes);
    assign_ids(&mut nodes, &mut ids);
    let outline = outline_from_nodes(&nodes, hidden);
    AnnotatedContent {
        html: html::render_nodes(&nodes),
        outline,
    }
}

fn assign_ids(nodes: &mut [Node], ids: &mut HeadingIds) {
    for node in nodes {
        let Node::Element(el) = node else { continue };
        if heading_level(el).is_some() {
            let id = ids.next(el, &heading_text(el));
            if explicit_id(el).is_none() {
                el.set_attr("id", id);
            }
        } else if TocAnchor::is_anchor_element(el) {
            continue;
        }
        assign_ids(&mut el.children, ids);
    }
}

/// Pick the active entry: the visible target nearest the viewport top,
/// earliest in the outline on ties.
pub fn active_entry<'a>(
    outline: &'a [OutlineEntry],
    visible: &[VisibleTarget],
) -> Option<&'a OutlineEntry> {
    outline
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            visible
                .iter()
                .filter(|v| v.id == entry.id && v.top.is_finite())
                .map(|v| v.top.abs())
                .min_by(f64::total_cmp)
                .map(|distance| (i, distance, entry))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(_, _, entry)| entry)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn entry(id: &str, text: &str, level: u8) -> OutlineEntry {
        OutlineEntry {
            id: id.to_string(),
            text: text.to_string(),
            level,
        }
    }

    const SAMPLE: &str = r#"<h1>Getting   Started</h1><p>Intro <span data-type="toc-anchor" data-id="toc-1-why" data-label="Why it works"></span></p><h2 id="custom">Details</h2><h3>Getting started</h3><h4>Too deep</h4><h2>!!!</h2>"#;

    #[test]
    fn outline_in_document_order() {
        let outline = derive_outline(SAMPLE, &[]);
        assert_eq!(
            outline,
            vec![
                entry("getting-started-0", "Getting Started", 1),
                entry("toc-1-why", "Why it works", ANCHOR_LEVEL),
                entry("custom", "Details", 2),
                entry("section-3", "!!!", 2),
            ]
        );
    }

    #[test]
    fn derivation_is_idempotent() {
        let hidden = vec!["details".to_string()];
        assert_eq!(derive_outline(SAMPLE, &hidden), derive_outline(SAMPLE, &hidden));
    }

    #[test]
    fn hidden_match_ignores_case_and_whitespace() {
        let html = "<h2>getting started</h2><h2>Next</h2>";
        let outline = derive_outline(html, &["Getting  Started".to_string()]);
        assert_eq!(outline, vec![entry("next-1", "Next", 2)]);
    }

    #[test]
    fn anchors_are_never_hidden_or_deduplicated() {
        let html = r#"<h2>Setup</h2><p><span data-type="toc-anchor" data-id="a" data-label="Setup"></span></p>"#;
        let outline = derive_outline(html, &["setup".to_string()]);
        assert_eq!(outline, vec![entry("a", "Setup", ANCHOR_LEVEL)]);

        let outline = derive_outline(html, &[]);
        assert_eq!(outline.len(), 2);
    }

    #[test]
    fn hiding_does_not_shift_generated_ids() {
        let html = "<h2>One</h2><h2>Two</h2>";
        let outline = derive_outline(html, &["one".to_string()]);
        assert_eq!(outline, vec![entry("two-1", "Two", 2)]);
    }

    #[test]
    fn annotate_injects_ids_the_outline_links_to() {
        let annotated = annotate_headings(SAMPLE, &[]);
        assert!(annotated.html.contains(r#"<h1 id="getting-started-0">"#));
        assert!(annotated.html.contains(r#"<h2 id="custom">"#));
        assert!(annotated.html.contains(r#"<h2 id="section-3">"#));
        assert!(annotated.html.contains("<h4>Too deep</h4>"));
        assert_eq!(annotated.outline, derive_outline(SAMPLE, &[]));
        assert_eq!(derive_outline(&annotated.html, &[]), annotated.outline);
    }

    #[test]
    fn generated_ids_avoid_explicit_ones() {
        let html = r#"<h2 id="intro-1">A</h2><h2>Intro</h2><p><span data-type="toc-anchor" data-id="next-2" data-label="Jump"></span></p><h2>Next</h2>"#;
        let outline = derive_outline(html, &[]);
        let ids: Vec<&str> = outline.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["intro-1", "intro-1-2", "next-2", "next-2-2"]);

        let annotated = annotate_headings(html, &[]);
        assert!(annotated.html.contains(r#"<h2 id="intro-1-2">Intro</h2>"#));
        assert!(annotated.html.contains(r#"<h2 id="next-2-2">Next</h2>"#));
        assert_eq!(annotated.outline, outline);
        assert_eq!(derive_outline(&annotated.html, &[]), outline);
    }

    #[test]
    fn active_entry_prefers_nearest_then_document_order() {
        let outline = vec![entry("a", "A", 2), entry("b", "B", 2), entry("c", "C", 2)];
        let visible = vec![
            VisibleTarget { id: "c".into(), top: 40.0 },
            VisibleTarget { id: "b".into(), top: -40.0 },
            VisibleTarget { id: "zzz".into(), top: 0.0 },
        ];
        assert_eq!(active_entry(&outline, &visible).map(|e| e.id.as_str()), Some("b"));

        let visible = vec![VisibleTarget { id: "c".into(), top: 10.0 }];
        assert_eq!(active_entry(&outline, &visible).map(|e| e.id.as_str()), Some("c"));
        assert_eq!(active_entry(&outline, &[]), None);
    }

    #[test]
    fn normalize_label_collapses() {
        assert_eq!(normalize_label("  Getting \n  Started "), "getting started");
    }
}

//! Rich content editor state.
//!
//! The editor owns a [`Document`] and a cursor. Every operation is a
//! synchronous transaction: it runs against a copy of the document and is
//! committed only if it succeeds, after which the HTML is re-serialized and
//! the change listener is called.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Block, Document, ImageAlign, ImageNode, Inline, TocAnchor, normalize_inlines};
use super::resize::ResizeSession;
use super::slug::slugify;
use crate::error::{ContentError, ContentResult};
use crate::file::UploadFile;
use crate::models::MediaItem;
use crate::toc::{self, OutlineEntry};

/// Host-supplied upload hook used when an image is picked from disk.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Store the file and return its public URL.
    async fn upload(&self, file: UploadFile) -> ContentResult<String>;
}

/// Insertion point: a top-level block and a position inside its inline
/// content (characters; anchors and line breaks count as one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub block: usize,
    pub offset: usize,
}

type ChangeListener = Box<dyn FnMut(&str) + Send>;

/// Editor over one post body.
pub struct Editor {
    doc: Document,
    cursor: Cursor,
    html: String,
    on_change: Option<ChangeListener>,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("cursor", &self.cursor)
            .field("html", &self.html)
            .finish_non_exhaustive()
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(Document::default())
    }
}

impl Editor {
    pub fn new(doc: Document) -> Self {
        let html = doc.to_html();
        Self {
            doc,
            cursor: Cursor::default(),
            html,
            on_change: None,
        }
    }

    /// Load stored content.
    pub fn from_html(html: &str) -> Self {
        Self::new(Document::from_html(html))
    }

    /// Current serialized content.
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Register the listener called with the new HTML after every change.
    pub fn set_on_change(&mut self, listener: impl FnMut(&str) + Send + 'static) {
        self.on_change = Some(Box::new(listener));
    }

    /// Move the cursor, clamped to the document.
    pub fn set_cursor(&mut self, block: usize, offset: usize) {
        let block = block.min(self.doc.blocks.len().saturating_sub(1));
        let len = self
            .doc
            .blocks
            .get(block)
            .and_then(Block::inlines)
            .map_or(0, |inlines| inlines_len(inlines));
        self.cursor = Cursor {
            block,
            offset: offset.min(len),
        };
    }

    fn transact<R>(
        &mut self,
        f: impl FnOnce(&mut Document, &mut Cursor) -> ContentResult<R>,
    ) -> ContentResult<R> {
        let mut doc = self.doc.clone();
        let mut cursor = self.cursor;
        let result = f(&mut doc, &mut cursor)?;

        self.doc = doc;
        self.cursor = cursor;
        self.html = self.doc.to_html();
        if let Some(listener) = self.on_change.as_mut() {
            listener(&self.html);
        }
        Ok(result)
    }

    /// Type text at the cursor.
    pub fn insert_text(&mut self, text: &str) -> ContentResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        let count = text.chars().count();
        self.transact(|doc, cursor| {
            let inlines = text_block_at_cursor(doc, cursor)?;
            let at = split_at(inlines, cursor.offset);
            let marks = match at.checked_sub(1).and_then(|i| inlines.get(i)) {
                Some(Inline::Text { marks, .. }) => marks.clone(),
                _ => Vec::new(),
            };
            inlines.insert(at, Inline::marked(text, marks));
            normalize_inlines(inlines);
            cursor.offset += count;
            Ok(())
        })
    }

    /// Insert an image block at the cursor. Returns its index.
    ///
    /// Inside a paragraph or heading the block is split and the image goes
    /// between the halves. At the start of a non-empty text block the image
    /// goes before it; anywhere else it follows the cursor block.
    pub fn insert_image(&mut self, image: ImageNode) -> ContentResult<usize> {
        self.transact(|doc, cursor| {
            let len = doc
                .blocks
                .get(cursor.block)
                .and_then(Block::inlines)
                .map(|inlines| inlines_len(inlines));
            let index = match len {
                Some(len) if cursor.offset == 0 && len > 0 => cursor.block,
                Some(len) if cursor.offset < len => {
                    split_block(doc, *cursor)?;
                    cursor.block + 1
                }
                _ => (cursor.block + 1).min(doc.blocks.len()),
            };
            doc.blocks.insert(index, Block::Image(image));
            *cursor = Cursor {
                block: index,
                offset: 0,
            };
            Ok(index)
        })
    }

    /// Insert an existing library item immediately.
    pub fn insert_media_image(&mut self, item: &MediaItem) -> ContentResult<usize> {
        if !item.is_image() {
            return Err(ContentError::Validation(format!(
                "{} is not an image",
                item.original_name
            )));
        }
        self.insert_image(ImageNode::new(&item.url, alt_from_name(&item.original_name)))
    }

    /// Upload a new file and insert it once the URL is known.
    pub async fn insert_uploaded_image(
        &mut self,
        file: UploadFile,
        uploader: &dyn ImageUploader,
    ) -> ContentResult<usize> {
        let alt = alt_from_name(&file.name);
        let url = uploader.upload(file).await?;
        self.insert_image(ImageNode::new(url, alt))
    }

    /// Image block at a top-level index.
    pub fn image_at(&self, block: usize) -> Option<&ImageNode> {
        match self.doc.blocks.get(block) {
            Some(Block::Image(image)) => Some(image),
            _ => None,
        }
    }

    pub fn set_image_width(&mut self, block: usize, percent: f64) -> ContentResult<()> {
        self.transact(|doc, _| {
            image_mut(doc, block)?.set_width(percent);
            Ok(())
        })
    }

    pub fn set_image_align(&mut self, block: usize, align: ImageAlign) -> ContentResult<()> {
        self.transact(|doc, _| {
            image_mut(doc, block)?.align = align;
            Ok(())
        })
    }

    /// Start a drag-resize on an image block.
    ///
    /// `surface_width` is the rendered width of the editing surface and
    /// `start_x` the pointer position when the drag began.
    pub fn begin_resize(
        &mut self,
        block: usize,
        surface_width: f64,
        start_x: f64,
    ) -> ContentResult<ResizeSession> {
        let width = self
            .image_at(block)
            .ok_or(ContentError::NotFound)?
            .width();
        Ok(ResizeSession::new(block, width, surface_width, start_x))
    }

    /// Insert an anchor at the cursor without replacing any text.
    ///
    /// The id is `toc-{unix_millis}-{slugified label}`. Returns the id.
    pub fn insert_toc_anchor(&mut self, label: &str, now: DateTime<Utc>) -> ContentResult<String> {
        let label = label.trim();
        if label.is_empty() {
            return Err(ContentError::Validation(
                "anchor label is required".to_string(),
            ));
        }

        let existing: Vec<String> = self.doc.toc_anchors().iter().map(|a| a.id.clone()).collect();
        let slug = slugify(label);
        let mut millis = now.timestamp_millis();
        let id = loop {
            let candidate = if slug.is_empty() {
                format!("toc-{millis}")
            } else {
                format!("toc-{millis}-{slug}")
            };
            if !existing.contains(&candidate) {
                break candidate;
            }
            millis += 1;
        };

        let anchor = TocAnchor::new(id.clone(), label);
        self.transact(|doc, cursor| {
            let inlines = text_block_at_cursor(doc, cursor)?;
            let at = split_at(inlines, cursor.offset);
            inlines.insert(at, Inline::TocAnchor(anchor));
            normalize_inlines(inlines);
            cursor.offset += 1;
            Ok(())
        })?;
        Ok(id)
    }

    /// Change an anchor's label. The id is kept.
    pub fn update_toc_anchor_label(&mut self, id: &str, label: &str) -> ContentResult<()> {
        let label = label.trim();
        if label.is_empty() {
            return Err(ContentError::Validation(
                "anchor label is required".to_string(),
            ));
        }
        self.transact(|doc, _| {
            let mut found = false;
            doc.for_each_inlines_mut(&mut |inlines| {
                for inline in inlines.iter_mut() {
                    if let Inline::TocAnchor(anchor) = inline
                        && anchor.id == id
                    {
                        anchor.label = label.to_string();
                        found = true;
                    }
                }
            });
            if found { Ok(()) } else { Err(ContentError::NotFound) }
        })
    }

    /// Replace an anchor with its label as plain text.
    pub fn remove_toc_anchor(&mut self, id: &str) -> ContentResult<()> {
        self.transact(|doc, _| {
            let mut found = false;
            doc.for_each_inlines_mut(&mut |inlines| {
                let mut changed = false;
                for inline in inlines.iter_mut() {
                    if let Inline::TocAnchor(anchor) = inline
                        && anchor.id == id
                    {
                        *inline = Inline::text(anchor.label.clone());
                        changed = true;
                    }
                }
                if changed {
                    normalize_inlines(inlines);
                    found = true;
                }
            });
            if found { Ok(()) } else { Err(ContentError::NotFound) }
        })
    }

    pub fn toc_anchors(&self) -> Vec<TocAnchor> {
        self.doc.toc_anchors().into_iter().cloned().collect()
    }

    /// Outline for the editor sidebar.
    pub fn outline(&self, hidden: &[String]) -> Vec<OutlineEntry> {
        toc::derive_outline(&self.html, hidden)
    }
}

fn image_mut(doc: &mut Document, block: usize) -> ContentResult<&mut ImageNode> {
    match doc.blocks.get_mut(block) {
        Some(Block::Image(image)) => Ok(image),
        _ => Err(ContentError::NotFound),
    }
}

/// Inline content under the cursor, creating a paragraph when the cursor
/// is not in a text block.
fn text_block_at_cursor<'a>(
    doc: &'a mut Document,
    cursor: &mut Cursor,
) -> ContentResult<&'a mut Vec<Inline>> {
    let in_text_block = doc
        .blocks
        .get(cursor.block)
        .is_some_and(|b| b.inlines().is_some());

    if !in_text_block {
        let index = if doc.blocks.is_empty() {
            0
        } else {
            (cursor.block + 1).min(doc.blocks.len())
        };
        doc.blocks.insert(index, Block::paragraph(Vec::new()));
        *cursor = Cursor {
            block: index,
            offset: 0,
        };
    }

    doc.blocks
        .get_mut(cursor.block)
        .and_then(Block::inlines_mut)
        .ok_or(ContentError::NotFound)
}

/// Split a text block at the cursor. The tail follows it as a block of the
/// same kind; a heading tail does not inherit the id.
fn split_block(doc: &mut Document, cursor: Cursor) -> ContentResult<()> {
    let block = doc
        .blocks
        .get_mut(cursor.block)
        .ok_or(ContentError::NotFound)?;
    let tail = {
        let inlines = block.inlines_mut().ok_or(ContentError::NotFound)?;
        let at = split_at(inlines, cursor.offset);
        inlines.split_off(at)
    };
    let tail = match block {
        Block::Heading { level, .. } => Block::Heading {
            level: *level,
            id: None,
            inlines: tail,
        },
        _ => Block::paragraph(tail),
    };
    doc.blocks.insert(cursor.block + 1, tail);
    Ok(())
}

fn inlines_len(inlines: &[Inline]) -> usize {
    inlines.iter().map(Inline::len).sum()
}

/// Split the run containing `offset` and return the index a new inline
/// should be inserted at.
fn split_at(inlines: &mut Vec<Inline>, offset: usize) -> usize {
    let mut pos = 0;
    for i in 0..inlines.len() {
        if offset <= pos {
            return i;
        }
        let len = inlines[i].len();
        if offset < pos + len {
            if let Inline::Text { text, marks } = &inlines[i] {
                let byte = text
                    .char_indices()
                    .nth(offset - pos)
                    .map_or(text.len(), |(b, _)| b);
                let head = Inline::Text {
                    text: text[..byte].to_string(),
                    marks: marks.clone(),
                };
                let tail = Inline::Text {
                    text: text[byte..].to_string(),
                    marks: marks.clone(),
                };
                inlines[i] = head;
                inlines.insert(i + 1, tail);
            }
            return i + 1;
        }
        pos += len;
    }
    inlines.len()
}

/// Alt text from a file name: the stem with separators as spaces.
fn alt_from_name(name: &str) -> String {
    let stem = std::path::Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    stem.replace(['_', '-'], " ").trim().to_string()
}

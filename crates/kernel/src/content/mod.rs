//! Content management.
//!
//! This module provides:
//! - ContentContext: cached posts and media, fed by store notifications
//! - Document: the node tree behind a post body (text, images, toc anchors)
//! - Editor: transactional editing of a document with HTML change events
//! - ResizeSession: drag-to-resize for image nodes

pub mod context;
pub mod editor;
pub mod html;
pub mod model;
pub mod resize;
pub mod single_flight;
pub mod slug;

pub use context::{ContentContext, ContentSnapshot};
pub use editor::{Cursor, Editor, ImageUploader};
pub use model::{Block, Document, ImageAlign, ImageNode, Inline, Mark, TocAnchor};
pub use resize::ResizeSession;
pub use slug::{is_valid_slug, slugify, unique_slug};

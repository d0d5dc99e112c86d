//! Drag-to-resize for image blocks.

use super::editor::Editor;
use super::single_flight::SingleFlight;
use crate::error::ContentResult;

/// Narrowest width a drag can request, in percent.
pub const MIN_RESIZE_WIDTH: f64 = 20.0;
/// Widest width a drag can request, in percent.
pub const MAX_RESIZE_WIDTH: f64 = 100.0;

/// An in-progress resize gesture on one image block.
///
/// Pointer movement is converted to a percentage of the editing surface's
/// rendered width. Moves are coalesced so the editor sees at most one width
/// change per tick; the final width is committed on release.
#[derive(Debug)]
pub struct ResizeSession {
    block: usize,
    surface_width: f64,
    start_x: f64,
    start_width: f64,
    frame: SingleFlight<f64>,
}

impl ResizeSession {
    pub(crate) fn new(block: usize, start_width: u8, surface_width: f64, start_x: f64) -> Self {
        Self {
            block,
            surface_width,
            start_x,
            start_width: f64::from(start_width),
            frame: SingleFlight::new(),
        }
    }

    /// Index of the image block being resized.
    pub fn block(&self) -> usize {
        self.block
    }

    /// Width requested by a pointer at `x`, clamped to the drag range.
    pub fn width_for(&self, x: f64) -> f64 {
        if !x.is_finite() || !self.surface_width.is_finite() || self.surface_width <= 0.0 {
            return self.start_width;
        }
        let delta = (x - self.start_x) / self.surface_width * 100.0;
        (self.start_width + delta).clamp(MIN_RESIZE_WIDTH, MAX_RESIZE_WIDTH)
    }

    /// Record a pointer move. Returns true when a tick should be requested.
    pub fn pointer_move(&mut self, x: f64) -> bool {
        let width = self.width_for(x);
        self.frame.schedule(width)
    }

    /// Apply the pending width, if any. Returns whether the document changed.
    pub fn tick(&mut self, editor: &mut Editor) -> ContentResult<bool> {
        match self.frame.flush() {
            Some(width) => {
                editor.set_image_width(self.block, width)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Commit the width for the release position and end the gesture.
    pub fn release(mut self, editor: &mut Editor, x: f64) -> ContentResult<u8> {
        self.frame.cancel();
        editor.set_image_width(self.block, self.width_for(x))?;
        Ok(editor.image_at(self.block).map_or(0, |img| img.width()))
    }

    /// Abandon the gesture and restore the starting width.
    pub fn cancel(mut self, editor: &mut Editor) -> ContentResult<()> {
        self.frame.cancel();
        editor.set_image_width(self.block, self.start_width)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::model::MIN_IMAGE_WIDTH;

    fn editor_with_image(width: u8) -> Editor {
        Editor::from_html(&format!(
            r#"<p>text</p><img src="a.png" data-width="{width}">"#
        ))
    }

    #[test]
    fn width_stays_in_drag_range_for_any_delta() {
        let mut editor = editor_with_image(50);
        let session = editor.begin_resize(1, 800.0, 400.0).unwrap();
        for x in [-10_000.0, -400.0, 0.0, 399.0, 400.0, 600.0, 10_000.0, f64::NAN] {
            let w = session.width_for(x);
            assert!((MIN_RESIZE_WIDTH..=MAX_RESIZE_WIDTH).contains(&w), "{x} -> {w}");
        }
        assert_eq!(session.width_for(600.0), 75.0);
    }

    #[test]
    fn moves_are_coalesced_per_tick() {
        let mut editor = editor_with_image(50);
        let changes = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = changes.clone();
        editor.set_on_change(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let mut session = editor.begin_resize(1, 1000.0, 0.0).unwrap();
        assert!(session.pointer_move(100.0));
        assert!(!session.pointer_move(200.0));
        assert!(!session.pointer_move(300.0));
        assert!(session.tick(&mut editor).unwrap());
        assert!(!session.tick(&mut editor).unwrap());

        assert_eq!(changes.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(editor.image_at(1).unwrap().width(), 80);
    }

    #[test]
    fn release_commits_clamped_width() {
        let mut editor = editor_with_image(50);
        let session = editor.begin_resize(1, 500.0, 0.0).unwrap();
        let width = session.release(&mut editor, -5000.0).unwrap();
        assert!(f64::from(width) >= MIN_RESIZE_WIDTH);
        assert_eq!(width, MIN_IMAGE_WIDTH);
        assert!(editor.html().contains(r#"data-width="25""#));
    }

    #[test]
    fn cancel_restores_start_width() {
        let mut editor = editor_with_image(60);
        let mut session = editor.begin_resize(1, 500.0, 0.0).unwrap();
        session.pointer_move(250.0);
        session.tick(&mut editor).unwrap();
        assert_eq!(editor.image_at(1).unwrap().width(), 100);
        session.cancel(&mut editor).unwrap();
        assert_eq!(editor.image_at(1).unwrap().width(), 60);
    }

    #[test]
    fn resize_requires_an_image_block() {
        let mut editor = editor_with_image(50);
        assert!(editor.begin_resize(0, 500.0, 0.0).is_err());
        assert!(editor.begin_resize(9, 500.0, 0.0).is_err());
    }
}

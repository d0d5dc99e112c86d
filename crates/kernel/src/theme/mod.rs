//! Theme engine and template rendering.
//!
//! Provides Tera-based page rendering from embedded templates and the
//! sanitizer applied to post bodies.

mod engine;
mod sanitize;

pub use engine::ThemeEngine;
pub use sanitize::sanitize_post_html;

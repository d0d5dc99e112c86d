//! Data models for the site's collections.

pub mod feedback;
pub mod media;
pub mod post;

pub use feedback::{CreateFeedback, Feedback, FeedbackStatus};
pub use media::MediaItem;
pub use post::{CreatePost, Post, PostStatus, UpdatePost};

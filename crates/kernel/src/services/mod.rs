//! Services behind the public endpoints.
//!
//! Challenge verification and feedback intake, social preview pages and
//! the static sitemap.

pub mod captcha;
pub mod feedback;
pub mod sitemap;
pub mod social;

pub use captcha::{ChallengeVerifier, TurnstileVerifier};
pub use feedback::{FeedbackError, FeedbackService, FeedbackSubmission};

//! Cadence test utilities.
//!
//! Helpers for integration testing: request payload builders, image
//! fixtures and assertion utilities.

use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

/// Smallest valid PNG (1x1, transparent).
pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// JPEG magic bytes followed by filler; enough for content sniffing.
pub const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

/// Create a post payload with default values.
pub fn test_post(title: &str) -> TestPost {
    TestPost {
        title: title.to_string(),
        slug: None,
        excerpt: format!("About {title}"),
        content: "<p>Body</p>".to_string(),
        featured_image: None,
        featured_badges: Vec::new(),
        status: "draft".to_string(),
        toc_hidden: Vec::new(),
    }
}

/// A post payload builder for the admin API.
#[derive(Debug, Clone)]
pub struct TestPost {
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: String,
    pub content: String,
    pub featured_image: Option<String>,
    pub featured_badges: Vec<String>,
    pub status: String,
    pub toc_hidden: Vec<String>,
}

impl TestPost {
    /// Set an explicit slug.
    pub fn with_slug(mut self, slug: &str) -> Self {
        self.slug = Some(slug.to_string());
        self
    }

    /// Set the HTML body.
    pub fn with_content(mut self, content: &str) -> Self {
        self.content = content.to_string();
        self
    }

    /// Set the featured image URL.
    pub fn with_image(mut self, url: &str) -> Self {
        self.featured_image = Some(url.to_string());
        self
    }

    /// Add a featured badge.
    pub fn with_badge(mut self, badge: &str) -> Self {
        self.featured_badges.push(badge.to_string());
        self
    }

    /// Hide a heading label from the outline.
    pub fn hiding(mut self, label: &str) -> Self {
        self.toc_hidden.push(label.to_string());
        self
    }

    /// Set as published.
    pub fn published(mut self) -> Self {
        self.status = "published".to_string();
        self
    }

    /// Set as draft.
    pub fn draft(mut self) -> Self {
        self.status = "draft".to_string();
        self
    }

    /// JSON body for `POST /api/admin/posts`.
    pub fn to_json(&self) -> JsonValue {
        let mut body = json!({
            "title": self.title,
            "excerpt": self.excerpt,
            "content": self.content,
            "featuredBadges": self.featured_badges,
            "status": self.status,
            "tocHidden": self.toc_hidden,
        });
        if let Some(obj) = body.as_object_mut() {
            if let Some(slug) = &self.slug {
                obj.insert("slug".to_string(), json!(slug));
            }
            if let Some(image) = &self.featured_image {
                obj.insert("featuredImage".to_string(), json!(image));
            }
        }
        body
    }
}

/// A valid feedback payload.
pub fn feedback_payload(message: &str) -> JsonValue {
    json!({
        "name": "Test User",
        "email": "test@example.com",
        "message": message,
        "turnstileToken": "test-token",
    })
}

/// Unique suffix for names that must not collide across tests.
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::now_v7().simple())
}

/// Assertion helpers for JSON content.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{needle}'\nActual: {haystack}"
        );
    }
}

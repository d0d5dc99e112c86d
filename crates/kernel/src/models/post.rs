//! Blog post model.
//!
//! Posts are the core content records of the site. The HTML body lives in
//! `content`; the outline shown next to it is derived at render time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::content::slug::slugify;

/// Number of featured badges shown on cards and post headers.
pub const MAX_DISPLAYED_BADGES: usize = 2;

/// Publication status of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            other => Err(format!("unknown post status '{other}'")),
        }
    }
}

/// Post record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,
    pub title: String,
    /// URL slug, unique across posts.
    pub slug: String,
    pub excerpt: String,
    /// Serialized HTML body.
    pub content: String,
    pub featured_image: Option<String>,
    pub featured_badges: Vec<String>,
    pub author_name: String,
    pub author_title: String,
    pub status: PostStatus,
    /// Heading labels excluded from the derived outline.
    pub toc_hidden: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set on the first transition to published, never overwritten.
    pub published_at: Option<DateTime<Utc>>,
}

/// Input for creating a new post.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePost {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub featured_badges: Option<Vec<String>>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_title: Option<String>,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub toc_hidden: Option<Vec<String>>,
}

/// Partial update for a post. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePost {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    /// `Some(None)` clears the image, `None` leaves it alone.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub featured_image: Option<Option<String>>,
    pub featured_badges: Option<Vec<String>>,
    pub author_name: Option<String>,
    pub author_title: Option<String>,
    pub status: Option<PostStatus>,
    pub toc_hidden: Option<Vec<String>>,
}

/// Distinguish an explicit `null` from a missing field.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl CreatePost {
    /// Slug before uniqueness is applied.
    ///
    /// An explicit, non-empty slug wins; otherwise the title is slugified.
    /// Titles with no ASCII alphanumerics fall back to `post-{id prefix}`.
    pub fn base_slug(&self, id: Uuid) -> String {
        let explicit = self.slug.as_deref().map(slugify).unwrap_or_default();
        if !explicit.is_empty() {
            return explicit;
        }
        fallback_slug(&self.title, id)
    }

    /// Build the post record. `slug` must already be unique.
    pub fn into_post(self, id: Uuid, slug: String, now: DateTime<Utc>) -> Post {
        let status = self.status.unwrap_or_default();
        Post {
            id,
            title: self.title.trim().to_string(),
            slug,
            excerpt: self.excerpt.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            featured_image: self.featured_image.filter(|s| !s.trim().is_empty()),
            featured_badges: normalize_labels(self.featured_badges.unwrap_or_default()),
            author_name: self.author_name.unwrap_or_default(),
            author_title: self.author_title.unwrap_or_default(),
            status,
            toc_hidden: normalize_labels(self.toc_hidden.unwrap_or_default()),
            created_at: now,
            updated_at: now,
            published_at: (status == PostStatus::Published).then_some(now),
        }
    }
}

impl Post {
    /// Check if this post is published.
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    /// Badges shown on cards: the first two.
    pub fn display_badges(&self) -> &[String] {
        let n = self.featured_badges.len().min(MAX_DISPLAYED_BADGES);
        &self.featured_badges[..n]
    }

    /// Apply a partial update.
    ///
    /// `updated_at` is always stamped. The slug is recomputed only when the
    /// patch carries one explicitly, or carries a title while the record has
    /// no slug yet. `make_unique` resolves collisions with other posts.
    /// `published_at` is set once, on the transition into published.
    pub fn apply_patch(
        &mut self,
        patch: UpdatePost,
        now: DateTime<Utc>,
        make_unique: impl Fn(String) -> String,
    ) {
        let explicit_slug = patch.slug.as_deref().map(slugify);

        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }

        match explicit_slug {
            Some(slug) if !slug.is_empty() => {
                if slug != self.slug {
                    self.slug = make_unique(slug);
                }
            }
            // An explicit empty slug asks for one derived from the title.
            Some(_) => self.slug = make_unique(fallback_slug(&self.title, self.id)),
            None if self.slug.is_empty() => {
                self.slug = make_unique(fallback_slug(&self.title, self.id));
            }
            None => {}
        }

        if let Some(excerpt) = patch.excerpt {
            self.excerpt = excerpt;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(image) = patch.featured_image {
            self.featured_image = image.filter(|s| !s.trim().is_empty());
        }
        if let Some(badges) = patch.featured_badges {
            self.featured_badges = normalize_labels(badges);
        }
        if let Some(name) = patch.author_name {
            self.author_name = name;
        }
        if let Some(title) = patch.author_title {
            self.author_title = title;
        }
        if let Some(hidden) = patch.toc_hidden {
            self.toc_hidden = normalize_labels(hidden);
        }
        if let Some(status) = patch.status {
            if status == PostStatus::Published && self.published_at.is_none() {
                self.published_at = Some(now);
            }
            self.status = status;
        }

        self.updated_at = now;
    }
}

/// Slugified title, or `post-{id prefix}` when the title has nothing usable.
fn fallback_slug(title: &str, id: Uuid) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        let simple = id.simple().to_string();
        format!("post-{}", &simple[simple.len() - 8..])
    } else {
        slug
    }
}

/// Trim labels and drop empty ones, keeping order.
fn normalize_labels(labels: Vec<String>) -> Vec<String> {
    labels
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

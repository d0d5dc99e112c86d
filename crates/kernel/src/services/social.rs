//! Social preview pages for blog posts.
//!
//! Link unfurlers don't run scripts, so shared blog links point at a tiny
//! HTML page carrying Open Graph and Twitter tags, which then refreshes to
//! the real post.

use crate::config::SiteMeta;
use crate::content::html::{escape_attr, escape_text};
use crate::models::Post;
use crate::store::{ContentStore, StoreResult};

/// Posts fetched per page while searching for a slug.
pub const PREVIEW_PAGE_SIZE: i64 = 100;

/// Fresh for five minutes, served stale for a day while revalidating.
pub const PREVIEW_CACHE_CONTROL: &str =
    "public, max-age=300, s-maxage=300, stale-while-revalidate=86400";

/// Find the first published post whose slug matches, ignoring case.
///
/// Pages through the whole collection in creation order (newest first).
pub async fn find_published_by_slug(
    store: &dyn ContentStore,
    slug: &str,
) -> StoreResult<Option<Post>> {
    let slug = slug.trim();
    let mut offset = 0;
    loop {
        let page = store.list_posts_page(PREVIEW_PAGE_SIZE, offset).await?;
        if let Some(post) = page
            .iter()
            .find(|p| p.is_published() && p.slug.eq_ignore_ascii_case(slug))
        {
            return Ok(Some(post.clone()));
        }
        if (page.len() as i64) < PREVIEW_PAGE_SIZE {
            return Ok(None);
        }
        offset += PREVIEW_PAGE_SIZE;
    }
}

/// Values for the preview tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewMeta {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    /// Canonical public URL.
    pub url: String,
    /// `article` for posts, `website` for the fallback.
    pub kind: &'static str,
    pub published_time: Option<String>,
}

impl PreviewMeta {
    pub fn for_post(post: &Post, site: &SiteMeta) -> Self {
        let description = match post.excerpt.trim() {
            "" => site.description.clone(),
            excerpt => excerpt.to_string(),
        };
        let image = post
            .featured_image
            .as_deref()
            .or(site.default_image.as_deref())
            .map(|img| site.absolute(img));

        Self {
            title: post.title.clone(),
            description,
            image,
            url: site.absolute(&format!("/blog/{}", post.slug)),
            kind: "article",
            published_time: post.published_at.map(|t| t.to_rfc3339()),
        }
    }

    /// Site-wide preview, used when the slug matches nothing.
    pub fn site_default(site: &SiteMeta) -> Self {
        Self {
            title: site.name.clone(),
            description: site.description.clone(),
            image: site.default_image.as_deref().map(|img| site.absolute(img)),
            url: site.absolute("/blog"),
            kind: "website",
            published_time: None,
        }
    }
}

fn meta(out: &mut String, attr: &str, key: &str, value: &str) {
    out.push_str(&format!(
        "    <meta {attr}=\"{key}\" content=\"{}\">\n",
        escape_attr(value)
    ));
}

/// Render the preview document.
pub fn render_preview(preview: &PreviewMeta, site: &SiteMeta) -> String {
    let mut head = String::new();
    meta(&mut head, "name", "description", &preview.description);
    meta(&mut head, "property", "og:type", preview.kind);
    meta(&mut head, "property", "og:site_name", &site.name);
    meta(&mut head, "property", "og:title", &preview.title);
    meta(&mut head, "property", "og:description", &preview.description);
    meta(&mut head, "property", "og:url", &preview.url);
    if let Some(image) = &preview.image {
        meta(&mut head, "property", "og:image", image);
    }
    if let Some(published) = &preview.published_time {
        meta(&mut head, "property", "article:published_time", published);
    }
    let card = if preview.image.is_some() {
        "summary_large_image"
    } else {
        "summary"
    };
    meta(&mut head, "name", "twitter:card", card);
    meta(&mut head, "name", "twitter:title", &preview.title);
    meta(&mut head, "name", "twitter:description", &preview.description);
    if let Some(image) = &preview.image {
        meta(&mut head, "name", "twitter:image", image);
    }

    let url = escape_attr(&preview.url);
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n    <meta charset=\"utf-8\">\n    <title>{title}</title>\n{head}    <link rel=\"canonical\" href=\"{url}\">\n    <meta http-equiv=\"refresh\" content=\"0; url={url}\">\n</head>\n<body>\n    <p><a href=\"{url}\">{link}</a></p>\n</body>\n</html>\n",
        title = escape_text(&format!("{} | {}", preview.title, site.name)),
        link = escape_text(&preview.title),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{CreatePost, PostStatus};
    use crate::store::MemoryContentStore;
    use chrono::Utc;
    use uuid::Uuid;

    fn site() -> SiteMeta {
        SiteMeta {
            url: "https://cadence.test".to_string(),
            name: "Cadence".to_string(),
            description: "Habits that stick".to_string(),
            default_image: Some("/og-default.png".to_string()),
        }
    }

    fn post(slug: &str, status: PostStatus) -> Post {
        CreatePost {
            title: format!("Post {slug}"),
            status: Some(status),
            ..Default::default()
        }
        .into_post(Uuid::now_v7(), slug.to_string(), Utc::now())
    }

    #[tokio::test]
    async fn finds_published_posts_past_the_first_page() {
        let store = MemoryContentStore::new();
        store
            .insert_post(&post("target", PostStatus::Published))
            .await
            .unwrap();
        store
            .insert_post(&post("hidden", PostStatus::Draft))
            .await
            .unwrap();
        for i in 0..PREVIEW_PAGE_SIZE + 5 {
            store
                .insert_post(&post(&format!("filler-{i}"), PostStatus::Published))
                .await
                .unwrap();
        }

        let found = find_published_by_slug(&store, "TARGET").await.unwrap();
        assert_eq!(found.unwrap().slug, "target");
        assert!(find_published_by_slug(&store, "hidden").await.unwrap().is_none());
        assert!(find_published_by_slug(&store, "missing").await.unwrap().is_none());
    }

    #[test]
    fn post_preview_falls_back_to_site_defaults() {
        let mut p = post("streaks", PostStatus::Published);
        p.title = "Streaks & \"Slips\"".to_string();
        let preview = PreviewMeta::for_post(&p, &site());
        assert_eq!(preview.description, "Habits that stick");
        assert_eq!(
            preview.image.as_deref(),
            Some("https://cadence.test/og-default.png")
        );
        assert_eq!(preview.url, "https://cadence.test/blog/streaks");

        let html = render_preview(&preview, &site());
        assert!(html.contains(r#"<meta property="og:title" content="Streaks &amp; &quot;Slips&quot;">"#));
        assert!(html.contains(r#"<meta name="twitter:card" content="summary_large_image">"#));
        assert!(html.contains(r#"<link rel="canonical" href="https://cadence.test/blog/streaks">"#));
        assert!(html.contains(r#"content="0; url=https://cadence.test/blog/streaks""#));
    }

    #[test]
    fn post_values_win_over_defaults() {
        let mut p = post("focus", PostStatus::Published);
        p.excerpt = "Deep work".to_string();
        p.featured_image = Some("https://cdn.test/focus.png".to_string());
        let preview = PreviewMeta::for_post(&p, &site());
        assert_eq!(preview.description, "Deep work");
        assert_eq!(preview.image.as_deref(), Some("https://cdn.test/focus.png"));
        assert_eq!(preview.kind, "article");
        assert!(preview.published_time.is_some());
    }

    #[test]
    fn site_default_preview() {
        let mut s = site();
        s.default_image = None;
        let html = render_preview(&PreviewMeta::site_default(&s), &s);
        assert!(html.contains(r#"<meta property="og:type" content="website">"#));
        assert!(html.contains(r#"<meta name="twitter:card" content="summary">"#));
        assert!(!html.contains("og:image"));
    }
}

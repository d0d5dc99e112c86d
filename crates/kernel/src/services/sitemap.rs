//! Static `sitemap.xml` and `robots.txt` generation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::info;

use crate::config::SiteMeta;
use crate::content::html::escape_text;
use crate::models::Post;

/// Public pages listed ahead of the posts, with their change frequency and
/// priority.
const STATIC_PAGES: &[(&str, &str, &str)] = &[
    ("/", "weekly", "1.0"),
    ("/blog", "daily", "0.9"),
    ("/feedback", "monthly", "0.5"),
    ("/privacy", "yearly", "0.3"),
    ("/terms", "yearly", "0.3"),
    ("/delete-account", "yearly", "0.3"),
];

/// Render `sitemap.xml`. Drafts are skipped.
pub fn render_sitemap(site: &SiteMeta, posts: &[Post]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );

    for (path, changefreq, priority) in STATIC_PAGES {
        xml.push_str(&format!(
            "  <url>\n    <loc>{}</loc>\n    <changefreq>{changefreq}</changefreq>\n    <priority>{priority}</priority>\n  </url>\n",
            escape_text(&site.absolute(path)),
        ));
    }

    for post in posts.iter().filter(|p| p.is_published()) {
        xml.push_str(&format!(
            "  <url>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n    <changefreq>monthly</changefreq>\n    <priority>0.7</priority>\n  </url>\n",
            escape_text(&site.absolute(&format!("/blog/{}", post.slug))),
            post.updated_at.format("%Y-%m-%d"),
        ));
    }

    xml.push_str("</urlset>\n");
    xml
}

/// Render `robots.txt`.
pub fn render_robots(site: &SiteMeta) -> String {
    format!(
        "User-agent: *\nAllow: /\nDisallow: /api/\n\nSitemap: {}\n",
        site.absolute("/sitemap.xml")
    )
}

/// Write both files into `dir`, creating it if needed.
pub async fn write_artifacts(dir: &Path, site: &SiteMeta, posts: &[Post]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let sitemap = dir.join("sitemap.xml");
    fs::write(&sitemap, render_sitemap(site, posts))
        .await
        .with_context(|| format!("failed to write {}", sitemap.display()))?;

    let robots = dir.join("robots.txt");
    fs::write(&robots, render_robots(site))
        .await
        .with_context(|| format!("failed to write {}", robots.display()))?;

    let published = posts.iter().filter(|p| p.is_published()).count();
    info!(dir = %dir.display(), published, "sitemap written");
    Ok(vec![sitemap, robots])
}

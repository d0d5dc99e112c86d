//! Theme engine with embedded Tera templates.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tera::Tera;
use tracing::{debug, error};

use crate::config::SiteMeta;
use crate::content::html::escape_text;

/// Templates compiled into the binary, by name.
const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/base.html")),
    ("home.html", include_str!("../../templates/home.html")),
    ("blog.html", include_str!("../../templates/blog.html")),
    ("post.html", include_str!("../../templates/post.html")),
    ("privacy.html", include_str!("../../templates/privacy.html")),
    ("terms.html", include_str!("../../templates/terms.html")),
    ("feedback.html", include_str!("../../templates/feedback.html")),
    (
        "delete_account.html",
        include_str!("../../templates/delete_account.html"),
    ),
    ("error.html", include_str!("../../templates/error.html")),
];

/// Served when even the error template fails to render.
const FALLBACK_ERROR_PAGE: &str = "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>Something went wrong</title></head><body><h1>Something went wrong</h1><p><a href=\"\">Reload the page</a></p></body></html>";

#[derive(Serialize)]
struct SiteContext<'a> {
    name: &'a str,
    url: &'a str,
    description: &'a str,
}

/// Theme engine for rendering pages.
pub struct ThemeEngine {
    tera: Tera,
    site: SiteMeta,
    /// Whether error pages may show details.
    show_error_details: bool,
}

impl ThemeEngine {
    /// Load the embedded templates.
    pub fn new(site: SiteMeta, show_error_details: bool) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())
            .context("failed to initialize Tera templates")?;
        Self::register_filters(&mut tera);

        debug!(count = tera.get_template_names().count(), "loaded templates");

        Ok(Self {
            tera,
            site,
            show_error_details,
        })
    }

    fn register_filters(tera: &mut Tera) {
        // RFC 3339 timestamp (as serialized by chrono) to "March 4, 2026".
        tera.register_filter(
            "format_date",
            |value: &tera::Value, _args: &HashMap<String, tera::Value>| {
                let formatted = value
                    .as_str()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc).format("%B %-d, %Y").to_string())
                    .unwrap_or_default();
                Ok(tera::Value::String(formatted))
            },
        );
    }

    pub fn site(&self) -> &SiteMeta {
        &self.site
    }

    /// Render a page template. `title` and `description` feed the head tags;
    /// an empty description falls back to the site's.
    pub fn render_page(
        &self,
        template: &str,
        title: &str,
        description: &str,
        path: &str,
        context: &mut tera::Context,
    ) -> Result<String> {
        let description = if description.trim().is_empty() {
            self.site.description.as_str()
        } else {
            description
        };

        context.insert(
            "site",
            &SiteContext {
                name: &self.site.name,
                url: &self.site.url,
                description: &self.site.description,
            },
        );
        context.insert("title", title);
        context.insert("description", description);
        context.insert("path", path);
        context.insert("canonical", &self.site.absolute(path));
        context.insert("year", &Utc::now().format("%Y").to_string());

        self.tera
            .render(template, context)
            .with_context(|| format!("failed to render template {template}"))
    }

    /// Generic error page with a reload link.
    ///
    /// `detail` is shown only when error details are enabled. Never fails.
    pub fn render_error(&self, heading: &str, detail: Option<&str>) -> String {
        let mut context = tera::Context::new();
        context.insert("heading", heading);
        if self.show_error_details
            && let Some(detail) = detail
        {
            context.insert("detail", detail);
        }

        self.render_page("error.html", heading, "", "/", &mut context)
            .unwrap_or_else(|e| {
                error!(error = ?e, "failed to render error page");
                if self.show_error_details {
                    FALLBACK_ERROR_PAGE.replace(
                        "</body>",
                        &format!("<pre>{}</pre></body>", escape_text(&format!("{e:?}"))),
                    )
                } else {
                    FALLBACK_ERROR_PAGE.to_string()
                }
            })
    }
}

impl std::fmt::Debug for ThemeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeEngine")
            .field("template_count", &self.tera.get_template_names().count())
            .field("site", &self.site.url)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn site() -> SiteMeta {
        SiteMeta {
            url: "https://cadence.test".to_string(),
            name: "Cadence".to_string(),
            description: "Habits that stick".to_string(),
            default_image: None,
        }
    }

    #[test]
    fn all_templates_load() {
        let engine = ThemeEngine::new(site(), false).unwrap();
        assert_eq!(engine.tera.get_template_names().count(), TEMPLATES.len());
    }

    #[test]
    fn format_date_filter() {
        let mut tera = Tera::default();
        ThemeEngine::register_filters(&mut tera);
        tera.add_raw_template("test", "{{ ts | format_date }}")
            .unwrap();

        let mut ctx = tera::Context::new();
        ctx.insert("ts", "2026-03-04T12:00:00Z");
        assert_eq!(tera.render("test", &ctx).unwrap(), "March 4, 2026");

        ctx.insert("ts", "not a date");
        assert_eq!(tera.render("test", &ctx).unwrap(), "");
    }

    #[test]
    fn page_gets_site_context() {
        let engine = ThemeEngine::new(site(), false).unwrap();
        let html = engine
            .render_page("privacy.html", "Privacy Policy", "", "/privacy", &mut tera::Context::new())
            .unwrap();
        assert!(html.contains("<title>Privacy Policy | Cadence</title>"));
        assert!(html.contains(r#"<link rel="canonical" href="https://cadence.test/privacy">"#));
        assert!(html.contains(r#"content="Habits that stick""#));
    }

    #[test]
    fn error_details_only_in_development() {
        let prod = ThemeEngine::new(site(), false).unwrap();
        let html = prod.render_error("Something went wrong", Some("boom at line 3"));
        assert!(html.contains("Something went wrong"));
        assert!(html.contains("Reload"));
        assert!(!html.contains("boom at line 3"));

        let dev = ThemeEngine::new(site(), true).unwrap();
        assert!(
            dev.render_error("Something went wrong", Some("boom at line 3"))
                .contains("boom at line 3")
        );
    }
}

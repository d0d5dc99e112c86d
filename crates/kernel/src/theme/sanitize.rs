//! Sanitization of stored post HTML before it reaches a public page.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static WIDTH_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*width:\s*(\d{1,3})%\s*;?\s*$").expect("valid regex literal")
});

/// Keep an inline style only when it is a plain percentage width.
fn width_style(value: &str) -> Option<String> {
    let caps = WIDTH_STYLE_RE.captures(value)?;
    let width: u8 = caps.get(1)?.as_str().parse().ok()?;
    (width <= 100).then(|| format!("width: {width}%"))
}

/// Clean post HTML with ammonia.
///
/// On top of ammonia's defaults this keeps heading ids (outline targets),
/// the toc anchor span attributes and the image width/alignment
/// attributes. Links get `rel="noopener noreferrer"`.
pub fn sanitize_post_html(html: &str) -> String {
    let mut builder = ammonia::Builder::default();
    builder
        .add_tag_attributes("h1", &["id"])
        .add_tag_attributes("h2", &["id"])
        .add_tag_attributes("h3", &["id"])
        .add_tag_attributes("span", &["id", "data-type", "data-id", "data-label"])
        .add_tag_attributes("img", &["data-width", "data-align", "style"])
        .link_rel(Some("noopener noreferrer"))
        .attribute_filter(|element, attribute, value| match (element, attribute) {
            ("img", "style") => width_style(value).map(Cow::Owned),
            _ => Some(Cow::Borrowed(value)),
        });
    builder.clean(html).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_and_handlers() {
        let out = sanitize_post_html(
            r#"<p onclick="x()">Hi<script>alert(1)</script></p><a href="javascript:alert(1)">x</a>"#,
        );
        assert!(!out.contains("script"));
        assert!(!out.contains("onclick"));
        assert!(!out.contains("javascript:"));
    }

    #[test]
    fn keeps_outline_targets_and_image_layout() {
        let out = sanitize_post_html(
            r#"<h2 id="intro-0">Intro</h2><p><span data-type="toc-anchor" id="toc-1" data-id="toc-1" data-label="Why"></span></p><img src="/files/a.png" alt="a" data-width="50" data-align="left" style="width: 50%">"#,
        );
        assert!(out.contains(r#"id="intro-0""#));
        assert!(out.contains(r#"data-type="toc-anchor""#));
        assert!(out.contains(r#"data-label="Why""#));
        assert!(out.contains(r#"data-width="50""#));
        assert!(out.contains(r#"style="width: 50%""#));
    }

    #[test]
    fn drops_arbitrary_styles() {
        let out = sanitize_post_html(
            r#"<img src="/a.png" style="position: fixed; width: 100%"><img src="/b.png" style="width: 400%">"#,
        );
        assert!(!out.contains("style="));
    }

    #[test]
    fn width_style_accepts_only_percentages() {
        assert_eq!(width_style("width: 75%").as_deref(), Some("width: 75%"));
        assert_eq!(width_style(" width:40%; ").as_deref(), Some("width: 40%"));
        assert_eq!(width_style("width: 75px"), None);
        assert_eq!(width_style("width: 101%"), None);
    }
}

//! URL slug generation for posts and anchor ids.

/// Maximum slug length in bytes.
const MAX_SLUG_LEN: usize = 128;

/// Convert text into a URL-safe slug.
///
/// Transforms to lowercase, replaces non-alphanumeric characters with hyphens,
/// collapses consecutive hyphens, and trims leading/trailing hyphens.
pub fn slugify(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_was_hyphen = true; // Start true to skip leading hyphens
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c);
            prev_was_hyphen = false;
        } else if !prev_was_hyphen {
            result.push('-');
            prev_was_hyphen = true;
        }
    }

    while result.ends_with('-') {
        result.pop();
    }

    if result.len() > MAX_SLUG_LEN {
        // Pure ASCII at this point, so byte slicing is safe.
        let truncated = &result[..MAX_SLUG_LEN];
        if let Some(last_hyphen) = truncated.rfind('-') {
            return truncated[..last_hyphen].to_string();
        }
        return truncated.to_string();
    }

    result
}

/// Check the slug invariant: lowercase `[a-z0-9-]`, no leading/trailing
/// hyphen, no empty segments, at most [`MAX_SLUG_LEN`] bytes.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
}

/// Make `base` unique with numeric suffixes.
///
/// If `my-post` is taken, tries `my-post-1`, `my-post-2`, etc. `taken`
/// reports whether a candidate is already used by another record. The
/// base is shortened so a suffixed slug stays within [`MAX_SLUG_LEN`].
pub fn unique_slug(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }

    for i in 1..1000 {
        let candidate = with_suffix(base, &i.to_string());
        if !taken(&candidate) {
            return candidate;
        }
    }

    // Fallback: append a UUID fragment for guaranteed uniqueness
    let fragment = uuid::Uuid::now_v7().simple().to_string();
    with_suffix(base, &fragment[fragment.len() - 8..])
}

fn with_suffix(base: &str, suffix: &str) -> String {
    let mut keep = MAX_SLUG_LEN.saturating_sub(suffix.len() + 1).min(base.len());
    while !base.is_char_boundary(keep) {
        keep -= 1;
    }
    format!("{}-{suffix}", base[..keep].trim_end_matches('-'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Hello, World! 2024"), "hello-world-2024");
    }

    #[test]
    fn test_slugify_special_chars() {
        assert_eq!(slugify("What's New?"), "what-s-new");
        assert_eq!(slugify("Streaks & Habits: Day #42"), "streaks-habits-day-42");
    }

    #[test]
    fn test_slugify_leading_trailing() {
        assert_eq!(slugify("  hello  "), "hello");
        assert_eq!(slugify("---hello---"), "hello");
        assert_eq!(slugify("¡Hola!"), "hola");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify("日本語"), "");
    }

    #[test]
    fn test_slugify_long_text() {
        let long_title = "word ".repeat(60);
        let slug = slugify(&long_title);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn slugify_output_always_satisfies_invariant() {
        let titles = [
            "Hello, World! 2024",
            "  Mixed CASE   spacing ",
            "emoji 🎯 goals",
            "a_b.c/d\\e",
            "Ünïcödé Tïtlé",
            "99 problems",
        ];
        for title in titles {
            let slug = slugify(title);
            assert!(is_valid_slug(&slug), "{title:?} produced {slug:?}");
        }
    }

    #[test]
    fn unique_slug_appends_suffix() {
        let existing = ["my-post", "my-post-1"];
        let slug = unique_slug("my-post", |s| existing.contains(&s));
        assert_eq!(slug, "my-post-2");
        assert_eq!(unique_slug("fresh", |_| false), "fresh");
    }

    #[test]
    fn suffixed_slug_stays_within_limit() {
        let base = format!("{}-{}", "a".repeat(100), "b".repeat(27));
        assert_eq!(base.len(), MAX_SLUG_LEN);

        let slug = unique_slug(&base, |s| s == base);
        assert_eq!(slug.len(), MAX_SLUG_LEN);
        assert!(slug.ends_with("-1"));
        assert!(is_valid_slug(&slug));

        // Cutting at a hyphen must not leave a double hyphen behind.
        let base = format!("{}-{}", "a".repeat(125), "bb");
        let slug = unique_slug(&base, |s| s == base);
        assert_eq!(slug, format!("{}-1", "a".repeat(125)));
        assert!(is_valid_slug(&slug));
    }
}

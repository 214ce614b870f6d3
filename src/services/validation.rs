//! Input validation helpers shared by the services

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest accepted slug
pub const MAX_SLUG_LEN: usize = 120;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug regex"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email regex")
});

/// Whether `slug` is lowercase ASCII words joined by single hyphens
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.len() <= MAX_SLUG_LEN && SLUG_RE.is_match(slug)
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 255 && EMAIL_RE.is_match(email)
}

/// Generate a URL slug from a title.
///
/// Keeps ASCII letters and digits, turns every other run of characters into
/// a single hyphen, and truncates to `MAX_SLUG_LEN` on a hyphen boundary.
pub fn generate_slug(title: &str) -> String {
    let mut result = String::new();
    let mut pending_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !result.is_empty() {
                result.push('-');
            }
            pending_hyphen = false;
            result.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if result.len() > MAX_SLUG_LEN {
        result.truncate(MAX_SLUG_LEN);
        result = result.trim_end_matches('-').to_string();
    }
    result
}

/// Media URLs must be absolute http(s) or root-relative
pub fn is_valid_media_url(url: &str) -> bool {
    let url = url.trim();
    if url.contains(char::is_whitespace) {
        return false;
    }
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host_and_path) => !host_and_path.is_empty() && !host_and_path.starts_with('/'),
        None => url.starts_with('/') && !url.starts_with("//"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("  Rust -- and   WASM!  "), "rust-and-wasm");
        assert_eq!(generate_slug("Café au lait"), "caf-au-lait");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[test]
    fn test_generate_slug_truncates_on_boundary() {
        let title = "word ".repeat(40);
        let slug = generate_slug(&title);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(is_valid_slug(&slug));
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("hello-world-2"));
        assert!(!is_valid_slug("Hello"));
        assert!(!is_valid_slug("-lead"));
        assert!(!is_valid_slug("double--hyphen"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug(&"a".repeat(MAX_SLUG_LEN + 1)));
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("reader@example.com"));
        assert!(is_valid_email("first.last+tag@mail.example.co"));
        assert!(!is_valid_email("reader@"));
        assert!(!is_valid_email("reader example.com"));
        assert!(!is_valid_email("reader@localhost"));
    }

    #[test]
    fn test_media_url_validation() {
        assert!(is_valid_media_url("https://cdn.example.com/a.png"));
        assert!(is_valid_media_url("http://example.com/a.png"));
        assert!(is_valid_media_url("/media/a.png"));
        assert!(!is_valid_media_url("//evil.example/a.png"));
        assert!(!is_valid_media_url("ftp://example.com/a.png"));
        assert!(!is_valid_media_url("javascript:alert(1)"));
        assert!(!is_valid_media_url("https://"));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn generated_slugs_are_valid_or_empty(title in ".{0,200}") {
            let slug = generate_slug(&title);
            prop_assert!(slug.is_empty() || is_valid_slug(&slug));
        }

        #[test]
        fn generate_slug_is_idempotent(title in "[A-Za-z0-9 _-]{0,80}") {
            let once = generate_slug(&title);
            prop_assert_eq!(generate_slug(&once), once.clone());
        }
    }
}

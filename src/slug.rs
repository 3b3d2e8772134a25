//! URL-safe slug derivation and upload file-name sanitation.

use crate::crypto::random_suffix;
use chrono::{DateTime, Datelike, Utc};

/// Punctuation removed from slugs.
const SLUG_STRIP: &[char] = &[
    '?', '&', '=', '#', '%', '/', '\\', ':', ';', ',', '.', '!', '"', '\'', '*', '+', '<', '>',
    '@', '[', ']', '^', '`', '{', '}', '|', '~', '(', ')', '$',
];

/// Characters never allowed in a stored file name.
const FILENAME_STRIP: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Number of candidates tried before slug assignment gives up.
pub const MAX_SLUG_ATTEMPTS: u32 = 10;

/// Derive a URL-safe slug from a human title.
///
/// Lower-cases, turns whitespace into `-`, drops control characters and the
/// reserved punctuation set, collapses runs of `-` and trims them from both
/// ends. A non-zero `suffix` is appended verbatim.
///
/// ```rust
/// use quillpress::slug::slugify;
///
/// assert_eq!(slugify("A sample headline", 0), "a-sample-headline");
/// assert_eq!(slugify("A sample headline", 1), "a-sample-headline1");
/// ```
#[must_use]
pub fn slugify(input: &str, suffix: u32) -> String {
    let mut out = String::with_capacity(input.len());

    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() || c == '-' || c == '_' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
        } else if c.is_control() || SLUG_STRIP.contains(&c) {
            continue;
        } else {
            out.push(c);
        }
    }

    while out.ends_with('-') {
        out.pop();
    }

    if suffix > 0 {
        out.push_str(&suffix.to_string());
    }

    out
}

/// Slug for an article: `YYYY/M/<slugify(headline, suffix)>`.
#[must_use]
pub fn article_slug(headline: &str, at: DateTime<Utc>, suffix: u32) -> String {
    format!("{}/{}/{}", at.year(), at.month(), slugify(headline, suffix))
}

/// True if the link points outside the blog and must be stored verbatim.
#[must_use]
pub fn is_external_link(link: &str) -> bool {
    link.starts_with("http://") || link.starts_with("https://")
}

/// Strip path separators, control characters, reserved punctuation and
/// leading dots from a display file name.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && !FILENAME_STRIP.contains(c))
        .collect();

    cleaned.trim().trim_start_matches('.').trim().to_string()
}

/// Collision-free storage name: sanitized stem, random suffix, lowercased extension.
#[must_use]
pub fn unique_filename(display_name: &str) -> String {
    let sanitized = sanitize_filename(display_name);
    let (stem, ext) = match sanitized.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (sanitized.as_str(), None),
    };

    let mut stem = slugify(stem, 0);
    if stem.is_empty() {
        stem.push_str("file");
    }

    let suffix = random_suffix(8);
    match ext.map(slugify_extension) {
        Some(ext) if !ext.is_empty() => format!("{stem}-{suffix}.{ext}"),
        _ => format!("{stem}-{suffix}"),
    }
}

fn slugify_extension(ext: &str) -> String {
    ext.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Hello World", 0), "hello-world");
        assert_eq!(slugify("  Hello   World  ", 0), "hello-world");
        assert_eq!(slugify("What's new? (2024)", 0), "whats-new-2024");
    }

    #[test]
    fn slugify_collapses_dashes() {
        assert_eq!(slugify("a -- b", 0), "a-b");
        assert_eq!(slugify("---a---", 0), "a");
    }

    #[test]
    fn slugify_strips_control_characters() {
        assert_eq!(slugify("tab\there\u{7}", 0), "tab-here");
    }

    #[test]
    fn slugify_keeps_unicode_letters() {
        assert_eq!(slugify("Über Straße", 0), "über-straße");
    }

    #[test]
    fn slugify_appends_suffix() {
        assert_eq!(slugify("a sample headline", 0), "a-sample-headline");
        assert_eq!(slugify("a sample headline", 1), "a-sample-headline1");
        assert_eq!(slugify("a sample headline", 9), "a-sample-headline9");
    }

    #[test]
    fn slugify_is_idempotent() {
        for input in ["Hello World", "What's new? (2024)", "a -- b", "Über Straße", "x/y\\z"] {
            let once = slugify(input, 0);
            assert_eq!(slugify(&once, 0), once, "input: {input}");
        }
    }

    #[test]
    fn article_slug_uses_unpadded_month() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(article_slug("A sample headline", at, 0), "2024/3/a-sample-headline");
        assert_eq!(article_slug("A sample headline", at, 2), "2024/3/a-sample-headline2");
    }

    #[test]
    fn external_links() {
        assert!(is_external_link("https://example.com"));
        assert!(is_external_link("http://example.com"));
        assert!(!is_external_link("about-us"));
        assert!(!is_external_link("ftp://example.com"));
    }

    #[test]
    fn sanitize_filename_removes_separators_and_leading_dots() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename("my<file>?.txt"), "myfile.txt");
        assert_eq!(sanitize_filename("report\u{0}.pdf"), "report.pdf");
    }

    #[test]
    fn unique_filename_keeps_extension() {
        let name = unique_filename("My Holiday Photo.JPG");
        assert!(name.starts_with("my-holiday-photo-"));
        assert!(name.ends_with(".jpg"));
        assert_ne!(name, unique_filename("My Holiday Photo.JPG"));
    }

    #[test]
    fn unique_filename_without_stem() {
        let name = unique_filename("...");
        assert!(name.starts_with("file-"));
        assert!(!name.contains('.'));
    }
}

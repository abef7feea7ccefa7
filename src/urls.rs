//! Pasted-link cleanup

use once_cell::sync::Lazy;
use regex::Regex;

static WATCH_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]v=([a-zA-Z0-9_-]{11})").expect("valid watch pattern"));
static SHORT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://youtu\.be/([a-zA-Z0-9_-]{11})").expect("valid short-link pattern"));

/// Rewrites a pasted link into the canonical watch URL when it carries a
/// video id, otherwise returns it trimmed.
pub fn clean_url(raw: &str) -> String {
    let url = raw.trim_matches(|c: char| c.is_whitespace() || c == '.');
    if let Some(caps) = WATCH_PARAM.captures(url) {
        return watch_url(&caps[1]);
    }
    if let Some(caps) = SHORT_LINK.captures(url) {
        return watch_url(&caps[1]);
    }
    url.to_string()
}

/// Extracts the video id when the link is a recognised form.
pub fn video_id(raw: &str) -> Option<String> {
    let url = clean_url(raw);
    WATCH_PARAM.captures(&url).map(|caps| caps[1].to_string())
}

fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const CANONICAL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[rstest]
    #[case("https://youtu.be/dQw4w9WgXcQ")]
    #[case("http://youtu.be/dQw4w9WgXcQ?si=abc123")]
    #[case("https://www.youtube.com/watch?v=dQw4w9WgXcQ")]
    #[case("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL123&index=4")]
    #[case("https://music.youtube.com/watch?feature=share&v=dQw4w9WgXcQ")]
    #[case("  https://m.youtube.com/watch?v=dQw4w9WgXcQ.  ")]
    fn known_forms_map_to_the_watch_url(#[case] raw: &str) {
        assert_eq!(clean_url(raw), CANONICAL);
    }

    #[rstest]
    #[case("https://vimeo.com/123456789", "https://vimeo.com/123456789")]
    #[case("  https://example.com/clip.  ", "https://example.com/clip")]
    #[case("https://www.youtube.com/watch?v=short", "https://www.youtube.com/watch?v=short")]
    #[case("", "")]
    #[case("foo .", "foo")]
    #[case(". https://vimeo.com/1", "https://vimeo.com/1")]
    fn other_links_are_only_trimmed(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(clean_url(raw), expected);
    }

    #[rstest]
    #[case("https://youtu.be/dQw4w9WgXcQ")]
    #[case("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42")]
    #[case("...https://vimeo.com/1...")]
    #[case(" plain text ")]
    #[case("foo .")]
    #[case(". https://vimeo.com/1")]
    #[case(" . https://youtu.be/dQw4w9WgXcQ . ")]
    fn cleaning_is_idempotent(#[case] raw: &str) {
        let once = clean_url(raw);
        assert_eq!(clean_url(&once), once);
    }

    #[test]
    fn video_id_is_extracted_from_short_links() {
        assert_eq!(video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(video_id("https://vimeo.com/1"), None);
    }
}

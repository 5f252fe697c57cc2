//! URL extraction from message bodies.
//!
//! Collects links from HTML anchors first, then from plain text, keeping
//! first-seen order and dropping duplicates. Only http, https, ftp and
//! mailto schemes are accepted, capped at 2048 bytes each.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

const MAX_URL_LEN: usize = 2048;
const SCHEMES: [&str; 4] = ["http://", "https://", "ftp://", "mailto:"];

fn href_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<a\s[^>]*href\s*=\s*["']([^"']+)["']"#).expect("valid href pattern")
    })
}

/// Extract links from the HTML and text bodies.
pub fn extract_urls(html: Option<&str>, text: Option<&str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    if let Some(html) = html {
        for capture in href_pattern().captures_iter(html) {
            if let Some(url) = clean_url(&capture[1]) {
                if seen.insert(url.clone()) {
                    urls.push(url);
                }
            }
        }
    }

    if let Some(text) = text {
        for candidate in scan_text(text) {
            if let Some(url) = clean_url(&candidate) {
                if seen.insert(url.clone()) {
                    urls.push(url);
                }
            }
        }
    }

    urls
}

/// Scan free text for scheme-prefixed runs, in order of appearance.
fn scan_text(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();
    // ASCII lowering keeps byte offsets aligned with the original text.
    let lower = text.to_ascii_lowercase();

    for scheme in SCHEMES {
        let mut start = 0;
        while let Some(pos) = lower[start..].find(scheme) {
            let begin = start + pos;
            let end = text[begin..]
                .find(|c: char| c.is_whitespace() || c == '<' || c == '>' || c == '"')
                .map(|offset| begin + offset)
                .unwrap_or(text.len());
            found.push((begin, text[begin..end].to_string()));
            start = end.max(begin + scheme.len());
        }
    }

    found.sort_by_key(|(begin, _)| *begin);
    found.into_iter().map(|(_, url)| url).collect()
}

/// Validate and trim a raw candidate.
fn clean_url(raw: &str) -> Option<String> {
    let mut url = raw.trim().to_string();

    if url.len() > MAX_URL_LEN {
        return None;
    }

    let lower = url.to_lowercase();
    if !SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        return None;
    }

    // Sentence punctuation that commonly rides along in prose.
    while url.ends_with(',') || url.ends_with(';') || url.ends_with('!') {
        url.pop();
    }

    // Closing parens beyond the ones opened inside the URL itself.
    while url.ends_with(')') {
        let opens = url.matches('(').count();
        let closes = url.matches(')').count();
        if closes > opens {
            url.pop();
        } else {
            break;
        }
    }

    // A trailing period is a sentence terminator unless the URL carries a
    // path, where dots are meaningful.
    if url.ends_with('.') {
        let trimmed = &url[..url.len() - 1];
        let after_scheme = trimmed.splitn(2, "://").nth(1).unwrap_or("");
        if !after_scheme.contains('/') {
            url.pop();
        }
    }

    if url.len() <= SCHEMES.iter().find(|s| lower.starts_with(*s))?.len() {
        return None;
    }

    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_anchors_extracted() {
        let html = r#"<p><a href="https://example.com/a">a</a> and
            <a class="x" href='http://example.org'>b</a></p>"#;
        let urls = extract_urls(Some(html), None);
        assert_eq!(urls, vec!["https://example.com/a", "http://example.org"]);
    }

    #[test]
    fn test_text_urls_extracted() {
        let text = "See https://example.com/page and mailto:user@example.com for details";
        let urls = extract_urls(None, Some(text));
        assert!(urls.contains(&"https://example.com/page".to_string()));
        assert!(urls.contains(&"mailto:user@example.com".to_string()));
    }

    #[test]
    fn test_html_before_text_and_deduplicated() {
        let html = r#"<a href="https://example.com">x</a>"#;
        let text = "https://example.com then https://other.example";
        let urls = extract_urls(Some(html), Some(text));
        assert_eq!(
            urls,
            vec!["https://example.com", "https://other.example"]
        );
    }

    #[test]
    fn test_text_order_is_positional_across_schemes() {
        let urls = extract_urls(None, Some("first https://a.example then http://b.example"));
        assert_eq!(urls, vec!["https://a.example", "http://b.example"]);
    }

    #[test]
    fn test_trailing_punctuation_trimmed() {
        let urls = extract_urls(None, Some("go to https://example.com/x, now!"));
        assert_eq!(urls, vec!["https://example.com/x"]);

        let urls = extract_urls(None, Some("wrapped (https://example.com)"));
        assert_eq!(urls, vec!["https://example.com"]);
    }

    #[test]
    fn test_balanced_parens_kept() {
        let urls = extract_urls(
            None,
            Some("ref https://en.example.org/wiki/Foo_(bar) here"),
        );
        assert_eq!(urls, vec!["https://en.example.org/wiki/Foo_(bar)"]);
    }

    #[test]
    fn test_trailing_dot_rules() {
        // Bare host: the dot is sentence punctuation.
        let urls = extract_urls(None, Some("visit https://example.com."));
        assert_eq!(urls, vec!["https://example.com"]);

        // With a path segment the dot is kept.
        let urls = extract_urls(None, Some("get https://example.com/v1."));
        assert_eq!(urls, vec!["https://example.com/v1."]);
    }

    #[test]
    fn test_oversized_urls_dropped() {
        let long = format!("https://example.com/{}", "a".repeat(MAX_URL_LEN));
        let urls = extract_urls(None, Some(&long));
        assert!(urls.is_empty());
    }

    #[test]
    fn test_unknown_schemes_ignored() {
        let urls = extract_urls(Some(r#"<a href="javascript:alert(1)">x</a>"#), Some("gopher://x"));
        assert!(urls.is_empty());
    }

    #[test]
    fn test_roundtrip_membership() {
        let u = "https://example.com/path?q=1";
        let urls = extract_urls(Some(&format!("<a href=\"{}\">l</a>", u)), Some(u));
        assert_eq!(urls, vec![u.to_string()]);
    }
}

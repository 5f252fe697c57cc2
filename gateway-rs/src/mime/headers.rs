//! Defensive header parsing on raw message bytes.
//!
//! The auth pipeline needs a handful of headers (notably `From`) before the
//! full MIME parse has happened, and it must not be attackable through
//! pathological input. Limits: 64 KiB of header section, 1000 lines, 8 KiB
//! per value.

use std::collections::HashMap;

/// Maximum header section size examined.
pub const MAX_HEADER_SECTION: usize = 64 * 1024;
/// Maximum number of header lines examined.
const MAX_HEADER_LINES: usize = 1000;
/// Individual values are capped at this many bytes.
const MAX_VALUE_LEN: usize = 8 * 1024;

/// Parse the header section of `raw` into a name → value map.
///
/// Folded continuation lines are joined with a single space. Names are
/// lowercased; a repeated name overwrites the earlier value.
pub fn parse_headers(raw: &[u8]) -> HashMap<String, String> {
    let section_len = header_section_len(raw).min(MAX_HEADER_SECTION);
    let section = String::from_utf8_lossy(&raw[..section_len]);

    let mut headers = HashMap::new();
    let mut current: Option<(String, String)> = None;

    for (line_no, line) in section.lines().enumerate() {
        if line_no >= MAX_HEADER_LINES {
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = current.as_mut() {
                if value.len() < MAX_VALUE_LEN {
                    value.push(' ');
                    value.push_str(line.trim());
                    value.truncate(MAX_VALUE_LEN);
                }
            }
        } else if let Some(colon) = line.find(':') {
            if let Some((name, value)) = current.take() {
                headers.insert(name, value);
            }
            let name = line[..colon].trim().to_lowercase();
            let mut value = line[colon + 1..].trim().to_string();
            value.truncate(MAX_VALUE_LEN);
            current = Some((name, value));
        }
    }

    if let Some((name, value)) = current {
        headers.insert(name, value);
    }

    headers
}

/// Length of the header section: everything before the first blank line.
fn header_section_len(raw: &[u8]) -> usize {
    if let Some(pos) = find_subslice(raw, b"\r\n\r\n") {
        pos
    } else if let Some(pos) = find_subslice(raw, b"\n\n") {
        pos
    } else {
        raw.len()
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Reduce a header value like `"Jane Doe" <jane@example.com>` to the bare
/// address. A value without angle brackets is returned trimmed.
pub fn extract_bare_email(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let (Some(open), Some(close)) = (value.rfind('<'), value.rfind('>')) {
        if open < close {
            let inner = value[open + 1..close].trim();
            if inner.is_empty() {
                return None;
            }
            return Some(inner.to_string());
        }
    }

    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_headers() {
        let raw = b"From: a@example.com\r\nSubject: Hi\r\n\r\nbody";
        let headers = parse_headers(raw);
        assert_eq!(headers.get("from").unwrap(), "a@example.com");
        assert_eq!(headers.get("subject").unwrap(), "Hi");
        assert!(!headers.contains_key("body"));
    }

    #[test]
    fn test_folded_value_joined_with_single_space() {
        let raw = b"Subject: part one\r\n\tpart two\r\n\r\n";
        let headers = parse_headers(raw);
        assert_eq!(headers.get("subject").unwrap(), "part one part two");
    }

    #[test]
    fn test_names_lowercased_and_duplicates_overwrite() {
        let raw = b"X-Tag: first\r\nx-tag: second\r\n\r\n";
        let headers = parse_headers(raw);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-tag").unwrap(), "second");
    }

    #[test]
    fn test_lf_only_messages() {
        let raw = b"From: a@example.com\nTo: b@example.com\n\nbody";
        let headers = parse_headers(raw);
        assert_eq!(headers.get("to").unwrap(), "b@example.com");
    }

    #[test]
    fn test_value_length_capped() {
        let mut raw = b"X-Big: ".to_vec();
        raw.extend(std::iter::repeat(b'a').take(32 * 1024));
        raw.extend_from_slice(b"\r\n\r\n");
        let headers = parse_headers(&raw);
        assert_eq!(headers.get("x-big").unwrap().len(), MAX_VALUE_LEN);
    }

    #[test]
    fn test_line_count_capped() {
        let mut raw = Vec::new();
        for i in 0..2000 {
            raw.extend_from_slice(format!("X-H{}: v\r\n", i).as_bytes());
        }
        raw.extend_from_slice(b"\r\n");
        let headers = parse_headers(&raw);
        assert!(headers.len() <= 1000);
    }

    #[test]
    fn test_reparse_preserves_names_and_values() {
        let raw = b"From: a@example.com\r\nSubject: round trip\r\n\r\n";
        let headers = parse_headers(raw);

        let mut serialized = String::new();
        for (name, value) in &headers {
            serialized.push_str(&format!("{}: {}\r\n", name, value));
        }
        serialized.push_str("\r\n");

        let reparsed = parse_headers(serialized.as_bytes());
        assert_eq!(headers, reparsed);
    }

    #[test]
    fn test_extract_bare_email() {
        assert_eq!(
            extract_bare_email("\"Jane Doe\" <jane@example.com>").unwrap(),
            "jane@example.com"
        );
        assert_eq!(
            extract_bare_email("jane@example.com").unwrap(),
            "jane@example.com"
        );
        assert_eq!(extract_bare_email("   "), None);
        assert_eq!(extract_bare_email("Jane <>"), None);
    }
}

//! Remote-address canonicalization.

/// Canonicalize a remote IP string as reported by the socket layer.
///
/// Trims whitespace, drops any IPv6 zone identifier (`%eth0`), and strips
/// the IPv4-mapped IPv6 prefix so `::ffff:192.0.2.1` and `192.0.2.1`
/// compare equal. Absent input stays absent; an empty string normalizes to
/// the empty string so callers can distinguish the two.
pub fn normalize_ip(input: Option<&str>) -> Option<String> {
    let raw = input?;
    let mut ip = raw.trim();

    if let Some(zone) = ip.find('%') {
        ip = &ip[..zone];
    }

    let lowered = ip.to_ascii_lowercase();
    if let Some(stripped) = lowered.strip_prefix("::ffff:") {
        // Only unmap when the rest looks like dotted IPv4.
        if stripped.contains('.') {
            return Some(ip[ip.len() - stripped.len()..].to_string());
        }
    }

    Some(ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_stays_absent() {
        assert_eq!(normalize_ip(None), None);
    }

    #[test]
    fn test_empty_stays_empty() {
        assert_eq!(normalize_ip(Some("")), Some(String::new()));
        assert_eq!(normalize_ip(Some("   ")), Some(String::new()));
    }

    #[test]
    fn test_plain_addresses_unchanged() {
        assert_eq!(normalize_ip(Some("192.0.2.1")), Some("192.0.2.1".to_string()));
        assert_eq!(normalize_ip(Some("2001:db8::1")), Some("2001:db8::1".to_string()));
    }

    #[test]
    fn test_zone_identifier_dropped() {
        assert_eq!(
            normalize_ip(Some("fe80::1%eth0")),
            Some("fe80::1".to_string())
        );
    }

    #[test]
    fn test_mapped_ipv4_unwrapped() {
        assert_eq!(
            normalize_ip(Some("::ffff:192.0.2.1")),
            Some("192.0.2.1".to_string())
        );
        assert_eq!(
            normalize_ip(Some("::FFFF:192.0.2.1")),
            Some("192.0.2.1".to_string())
        );
    }

    #[test]
    fn test_mapped_prefix_without_dotted_quad_kept() {
        assert_eq!(
            normalize_ip(Some("::ffff:abcd")),
            Some("::ffff:abcd".to_string())
        );
    }

    #[test]
    fn test_idempotent() {
        for input in ["::ffff:192.0.2.1", "fe80::1%lo", " 10.0.0.1 ", ""] {
            let once = normalize_ip(Some(input)).unwrap();
            let twice = normalize_ip(Some(&once)).unwrap();
            assert_eq!(once, twice);
        }
    }
}

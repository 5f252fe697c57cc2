//! Received trace header.

use crate::security::TlsInfo;
use crate::smtp::SessionInfo;
use chrono::{DateTime, Utc};

/// Render the Received header this server prepends to every accepted
/// message before parsing and storage.
pub fn build_received_header(
    session: &SessionInfo,
    server_hostname: &str,
    tls: Option<&TlsInfo>,
    recipient: &str,
    now: DateTime<Utc>,
) -> String {
    let client_hostname = session
        .client_hostname
        .as_deref()
        .filter(|hostname| !hostname.is_empty())
        .unwrap_or("unknown");
    let remote_ip = session.remote_ip.as_deref().unwrap_or("unknown");

    let mut with_clause = session.transmission_type.clone();
    if let Some(tls) = tls {
        with_clause.push_str(&format!(
            " (version={} cipher={}",
            tls.version, tls.cipher
        ));
        if let Some(bits) = tls.bits {
            with_clause.push_str(&format!(" bits={}", bits));
        }
        with_clause.push(')');
    }

    format!(
        "Received: from {client} ({client} [{ip}])\r\n\tby {server} with {with_clause}\r\n\tid {id} for <{recipient}>;\r\n\t{date}\r\n",
        client = client_hostname,
        ip = remote_ip,
        server = server_hostname,
        with_clause = with_clause,
        id = session.session_id,
        recipient = recipient,
        date = now.to_rfc2822(),
    )
}

/// Prepend the Received header to the client-sent bytes.
pub fn prepend_received_header(header: &str, raw: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(header.len() + raw.len());
    message.extend_from_slice(header.as_bytes());
    message.extend_from_slice(raw);
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionInfo {
        let mut session = SessionInfo::new(
            "sess-42".to_string(),
            Some("192.0.2.7".to_string()),
        );
        session.client_hostname = Some("mail.ex.org".to_string());
        session.transmission_type = "ESMTP".to_string();
        session
    }

    #[test]
    fn test_plain_header_shape() {
        let header = build_received_header(
            &session(),
            "gw.example.com",
            None,
            "user@example.com",
            Utc::now(),
        );

        assert!(header.starts_with("Received: from mail.ex.org (mail.ex.org [192.0.2.7])"));
        assert!(header.contains("by gw.example.com with ESMTP"));
        assert!(header.contains("id sess-42 for <user@example.com>;"));
        assert!(header.ends_with("\r\n"));
        assert!(!header.contains("version="));
    }

    #[test]
    fn test_tls_clause() {
        let tls = TlsInfo {
            version: "TLSv1.3".to_string(),
            cipher: "TLS13_AES_256_GCM_SHA384".to_string(),
            bits: Some(256),
        };
        let header = build_received_header(
            &session(),
            "gw.example.com",
            Some(&tls),
            "user@example.com",
            Utc::now(),
        );
        assert!(header
            .contains("with ESMTP (version=TLSv1.3 cipher=TLS13_AES_256_GCM_SHA384 bits=256)"));
    }

    #[test]
    fn test_prepended_message_parses_with_trace_on_top() {
        let raw = b"From: s@ex.org\r\nSubject: Hi\r\n\r\nbody";
        let header = build_received_header(
            &session(),
            "gw.example.com",
            None,
            "user@example.com",
            Utc::now(),
        );
        let message = prepend_received_header(&header, raw);

        let headers = crate::mime::parse_headers(&message);
        assert!(headers.get("received").unwrap().contains("gw.example.com"));
        assert_eq!(headers.get("subject").unwrap(), "Hi");

        // The trace is the topmost header line.
        assert!(message.starts_with(b"Received: from"));
    }

    #[test]
    fn test_unknown_client_fields() {
        let session = SessionInfo::new("sess-1".to_string(), None);
        let header =
            build_received_header(&session, "gw.example.com", None, "u@example.com", Utc::now());
        assert!(header.starts_with("Received: from unknown (unknown [unknown])"));
    }
}

//! Stored payload construction.
//!
//! Every delivered message becomes three payloads: a small metadata
//! record, the full parsed structure, and the base64-encoded raw bytes.
//! Encrypted inboxes get each payload sealed separately under a
//! role-binding AAD.

use crate::authentication::AuthVerdicts;
use crate::mime::ParsedEmail;
use crate::smtp::SessionInfo;
use crate::spam::SpamVerdict;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;

/// AADs binding each ciphertext to its role.
pub const AAD_METADATA: &[u8] = b"vaultsandbox:metadata";
pub const AAD_PARSED: &[u8] = b"vaultsandbox:parsed";
pub const AAD_RAW: &[u8] = b"vaultsandbox:raw";

/// The metadata record shown in inbox listings.
pub fn build_metadata(
    message_id: &str,
    from: &str,
    recipient: &str,
    subject: Option<&str>,
    received_at: DateTime<Utc>,
) -> serde_json::Value {
    json!({
        "id": message_id,
        "from": from,
        "to": recipient,
        "subject": subject.unwrap_or("(no subject)"),
        "received_at": received_at.to_rfc3339(),
    })
}

/// The full parsed payload. Falls back to envelope data for fields the
/// MIME parse could not provide.
pub fn build_parsed_payload(
    parsed: Option<&ParsedEmail>,
    session: &SessionInfo,
    headers: &HashMap<String, String>,
    auth: &AuthVerdicts,
    spam: Option<&SpamVerdict>,
) -> serde_json::Value {
    let envelope_from = session.mail_from.clone().unwrap_or_default();

    let mut payload = match parsed {
        Some(parsed) => json!({
            "from": parsed.from.as_ref().map(|block| block.text.clone()).unwrap_or(envelope_from),
            "to": parsed.to.as_ref().map(|block| block.text.clone()).unwrap_or_else(|| session.rcpt_to.join(", ")),
            "cc": parsed.cc.as_ref().map(|block| block.text.clone()),
            "reply_to": parsed.reply_to.as_ref().map(|block| block.text.clone()),
            "subject": parsed.subject,
            "message_id": parsed.message_id,
            "date": parsed.date,
            "text": parsed.text,
            "html": parsed.html,
            "text_as_html": parsed.text_as_html,
            "references": parsed.references,
            "in_reply_to": parsed.in_reply_to,
            "priority": parsed.priority,
            "attachments": parsed.attachments.iter().map(|attachment| json!({
                "filename": attachment.filename,
                "content_type": attachment.content_type,
                "size": attachment.size,
                "checksum": attachment.checksum,
                "cid": attachment.cid,
                "disposition": attachment.disposition,
                "content_b64": BASE64.encode(&attachment.content),
            })).collect::<Vec<_>>(),
            "links": parsed.links,
        }),
        None => json!({
            "from": envelope_from,
            "to": session.rcpt_to.join(", "),
            "subject": serde_json::Value::Null,
            "text": serde_json::Value::Null,
            "html": serde_json::Value::Null,
            "attachments": [],
            "links": [],
        }),
    };

    payload["headers"] = serde_json::to_value(headers).unwrap_or_default();
    payload["auth"] = serde_json::to_value(auth).unwrap_or_default();
    if let Some(spam) = spam {
        payload["spam"] = serde_json::to_value(spam).unwrap_or_default();
    }

    payload
}

/// Attachment summaries for the `email.received` event (no content).
pub fn attachment_summaries(parsed: Option<&ParsedEmail>) -> Vec<serde_json::Value> {
    parsed
        .map(|parsed| {
            parsed
                .attachments
                .iter()
                .map(|attachment| {
                    json!({
                        "filename": attachment.filename,
                        "content_type": attachment.content_type,
                        "size": attachment.size,
                        "checksum": attachment.checksum,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Base64 of the Received-prepended raw bytes.
pub fn build_raw_payload(raw: &[u8]) -> String {
    BASE64.encode(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::AuthVerdicts;

    fn session() -> SessionInfo {
        let mut session = SessionInfo::new("sess-1".to_string(), Some("192.0.2.1".to_string()));
        session.mail_from = Some("s@ex.org".to_string());
        session.rcpt_to = vec!["user@example.com".to_string()];
        session
    }

    #[test]
    fn test_metadata_defaults_subject() {
        let metadata = build_metadata("id-1", "s@ex.org", "user@example.com", None, Utc::now());
        assert_eq!(metadata["subject"], "(no subject)");
        assert_eq!(metadata["to"], "user@example.com");
    }

    #[test]
    fn test_parsed_payload_from_envelope_when_parse_failed() {
        let headers = HashMap::new();
        let payload =
            build_parsed_payload(None, &session(), &headers, &AuthVerdicts::skipped(), None);
        assert_eq!(payload["from"], "s@ex.org");
        assert_eq!(payload["to"], "user@example.com");
        assert!(payload["spam"].is_null());
        assert_eq!(payload["auth"]["spf"]["status"], "skipped");
    }

    #[test]
    fn test_parsed_payload_includes_attachment_content() {
        let mut parsed = crate::mime::ParsedEmail::default();
        parsed.subject = Some("Hi".to_string());
        parsed.attachments.push(crate::mime::Attachment {
            filename: Some("a.bin".to_string()),
            content_type: "application/octet-stream".to_string(),
            size: 3,
            checksum: "x".to_string(),
            cid: None,
            disposition: Some("attachment".to_string()),
            content: b"abc".to_vec(),
        });

        let mut headers = HashMap::new();
        headers.insert("subject".to_string(), "Hi".to_string());
        let payload = build_parsed_payload(
            Some(&parsed),
            &session(),
            &headers,
            &AuthVerdicts::skipped(),
            None,
        );
        assert_eq!(payload["subject"], "Hi");
        assert_eq!(payload["headers"]["subject"], "Hi");
        assert_eq!(payload["attachments"][0]["content_b64"], BASE64.encode(b"abc"));

        // Event summaries must not carry content.
        let summaries = attachment_summaries(Some(&parsed));
        assert!(summaries[0].get("content_b64").is_none());
        assert_eq!(summaries[0]["filename"], "a.bin");
    }

    #[test]
    fn test_raw_payload_roundtrip() {
        let raw = b"Received: ...\r\nFrom: s@ex.org\r\n\r\nbody";
        let encoded = build_raw_payload(raw);
        assert_eq!(BASE64.decode(encoded).unwrap(), raw);
    }
}

//! MIME parse adapter.
//!
//! Wraps `mail-parser` and flattens its view into the gateway's
//! [`ParsedEmail`] DTO. A message that fails to parse yields `None`; the
//! delivery pipeline then continues on envelope data alone.

use super::links::extract_urls;
use super::types::{AddressBlock, Attachment, EmailAddress, ParsedEmail};
use mail_parser::{Address, HeaderValue, Message, MessageParser, MimeHeaders};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Parse raw RFC 5322 bytes into the structured DTO.
pub fn parse_email(raw: &[u8], session_id: &str) -> Option<ParsedEmail> {
    let message = match MessageParser::default().parse(raw) {
        Some(message) => message,
        None => {
            warn!(session_id, "MIME parse failed, continuing with envelope data");
            return None;
        }
    };

    let text = message.body_text(0).map(|body| body.to_string());
    let has_html_part = !message.html_body.is_empty();
    let rendered_html = message.body_html(0).map(|body| body.to_string());

    // `body_html` falls back to a text-to-HTML rendering when the message
    // has no HTML part; surface that under `text_as_html` instead.
    let (html, text_as_html) = if has_html_part {
        (rendered_html, None)
    } else {
        (None, rendered_html)
    };

    let links = extract_urls(html.as_deref(), text.as_deref());
    let attachments = collect_attachments(&message);

    let parsed = ParsedEmail {
        subject: message.subject().map(str::to_string),
        message_id: message.message_id().map(str::to_string),
        date: message.date().map(|date| date.to_rfc3339()),
        from: message.from().map(address_block),
        to: message.to().map(address_block),
        cc: message.cc().map(address_block),
        bcc: message.bcc().map(address_block),
        reply_to: message.reply_to().map(address_block),
        text,
        html,
        text_as_html,
        references: text_list(message.header("References")),
        in_reply_to: text_value(message.header("In-Reply-To")),
        priority: text_value(message.header("X-Priority")),
        attachments,
        links,
    };

    debug!(
        session_id,
        subject = parsed.subject.as_deref().unwrap_or(""),
        attachments = parsed.attachments.len(),
        links = parsed.links.len(),
        "parsed message"
    );

    Some(parsed)
}

fn address_block(address: &Address<'_>) -> AddressBlock {
    let addresses: Vec<EmailAddress> = match address {
        Address::List(list) => list.iter().filter_map(convert_addr).collect(),
        Address::Group(groups) => groups
            .iter()
            .flat_map(|group| group.addresses.iter())
            .filter_map(convert_addr)
            .collect(),
    };

    let text = addresses
        .iter()
        .map(|mailbox| match &mailbox.name {
            Some(name) => format!("{} <{}>", name, mailbox.address),
            None => mailbox.address.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ");

    AddressBlock { text, addresses }
}

fn convert_addr(addr: &mail_parser::Addr<'_>) -> Option<EmailAddress> {
    Some(EmailAddress {
        address: addr.address.as_ref()?.to_string(),
        name: addr.name.as_ref().map(|name| name.to_string()),
    })
}

fn collect_attachments(message: &Message<'_>) -> Vec<Attachment> {
    message
        .attachments()
        .map(|part| {
            let content = part.contents().to_vec();
            let checksum = format!("{:x}", Sha256::digest(&content));

            let content_type = part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string());

            Attachment {
                filename: part.attachment_name().map(str::to_string),
                content_type,
                size: content.len(),
                checksum,
                cid: part.content_id().map(str::to_string),
                disposition: part
                    .content_disposition()
                    .map(|disposition| disposition.ctype().to_string()),
                content,
            }
        })
        .collect()
}

fn text_value(header: Option<&HeaderValue<'_>>) -> Option<String> {
    match header? {
        HeaderValue::Text(text) => Some(text.to_string()),
        HeaderValue::TextList(list) => list.first().map(|text| text.to_string()),
        _ => None,
    }
}

fn text_list(header: Option<&HeaderValue<'_>>) -> Vec<String> {
    match header {
        Some(HeaderValue::Text(text)) => text
            .split_whitespace()
            .map(str::to_string)
            .collect(),
        Some(HeaderValue::TextList(list)) => list.iter().map(|text| text.to_string()).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &[u8] = b"From: Sender <s@ex.org>\r\n\
To: user@example.com\r\n\
Subject: Hi\r\n\
Message-ID: <abc@ex.org>\r\n\
\r\n\
body text";

    #[test]
    fn test_simple_message() {
        let parsed = parse_email(SIMPLE, "session-1").unwrap();
        assert_eq!(parsed.subject.as_deref(), Some("Hi"));
        assert_eq!(parsed.message_id.as_deref(), Some("abc@ex.org"));
        assert_eq!(parsed.from_address(), Some("s@ex.org"));
        assert_eq!(
            parsed.from.as_ref().unwrap().addresses[0].name.as_deref(),
            Some("Sender")
        );
        assert_eq!(parsed.text.as_deref(), Some("body text"));
        assert!(parsed.html.is_none());
        assert!(parsed.attachments.is_empty());
    }

    #[test]
    fn test_multipart_with_attachment() {
        let raw = b"From: s@ex.org\r\n\
To: user@example.com\r\n\
Subject: files\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"xyz\"\r\n\
\r\n\
--xyz\r\n\
Content-Type: text/plain\r\n\
\r\n\
see attachment\r\n\
--xyz\r\n\
Content-Type: application/pdf; name=\"doc.pdf\"\r\n\
Content-Disposition: attachment; filename=\"doc.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
aGVsbG8=\r\n\
--xyz--\r\n";

        let parsed = parse_email(raw, "session-1").unwrap();
        assert_eq!(parsed.text.as_deref(), Some("see attachment"));
        assert_eq!(parsed.attachments.len(), 1);

        let attachment = &parsed.attachments[0];
        assert_eq!(attachment.filename.as_deref(), Some("doc.pdf"));
        assert_eq!(attachment.content_type, "application/pdf");
        assert_eq!(attachment.content, b"hello");
        assert_eq!(attachment.size, 5);
        // SHA-256 of "hello".
        assert_eq!(
            attachment.checksum,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_links_from_html_body() {
        let raw = b"From: s@ex.org\r\n\
Subject: link\r\n\
MIME-Version: 1.0\r\n\
Content-Type: text/html\r\n\
\r\n\
<html><body><a href=\"https://example.com/x\">here</a></body></html>";

        let parsed = parse_email(raw, "session-1").unwrap();
        assert!(parsed.html.is_some());
        assert_eq!(parsed.links, vec!["https://example.com/x"]);
    }

    #[test]
    fn test_unparseable_input_yields_none() {
        assert!(parse_email(b"", "session-1").is_none());
    }
}

use serde::Serialize;

/// A single mailbox from an address header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailAddress {
    pub address: String,
    pub name: Option<String>,
}

/// An address header in both textual and structured form.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AddressBlock {
    pub text: String,
    pub addresses: Vec<EmailAddress>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub filename: Option<String>,
    pub content_type: String,
    pub size: usize,
    /// SHA-256 of the decoded content, hex-encoded.
    pub checksum: String,
    pub cid: Option<String>,
    pub disposition: Option<String>,
    #[serde(skip)]
    pub content: Vec<u8>,
}

/// Structured view over a raw RFC 5322 message.
#[derive(Debug, Clone, Default)]
pub struct ParsedEmail {
    pub subject: Option<String>,
    pub message_id: Option<String>,
    pub date: Option<String>,
    pub from: Option<AddressBlock>,
    pub to: Option<AddressBlock>,
    pub cc: Option<AddressBlock>,
    pub bcc: Option<AddressBlock>,
    pub reply_to: Option<AddressBlock>,
    pub text: Option<String>,
    pub html: Option<String>,
    /// Plain-text body rendered as HTML when the message has no HTML part.
    pub text_as_html: Option<String>,
    pub references: Vec<String>,
    pub in_reply_to: Option<String>,
    pub priority: Option<String>,
    pub attachments: Vec<Attachment>,
    pub links: Vec<String>,
}

impl ParsedEmail {
    /// The bare address of the first `From` mailbox, if any.
    pub fn from_address(&self) -> Option<&str> {
        self.from
            .as_ref()?
            .addresses
            .first()
            .map(|a| a.address.as_str())
    }
}

use thiserror::Error;

/// Reasons an email address fails RFC 5321 validation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressError {
    #[error("address exceeds RFC 5321 length limits")]
    TooLong,

    #[error("address is not a valid RFC 5321 mailbox")]
    InvalidFormat,

    #[error("address contains control characters")]
    ControlChars,

    #[error("address is empty")]
    Empty,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("recipient domain not allowed: {0}")]
    DomainNotAllowed(String),

    #[error("no inbox for {0}")]
    InboxNotFound(String),

    #[error("hard mode active, no inboxes configured")]
    HardModeActive { code: u16 },

    #[error("rate limit exceeded, retry after {retry_after_ms} ms")]
    RateLimitExceeded { retry_after_ms: u64 },

    #[error("message rejected - size limit exceeded")]
    SizeExceeded { limit: usize },

    #[error("chaos rejection: {code} {enhanced} {message}")]
    ChaosSmtp {
        code: u16,
        enhanced: String,
        message: String,
    },

    #[error("chaos connection drop (graceful: {graceful})")]
    ChaosDrop { graceful: bool },

    #[error("encryption failure: {0}")]
    Crypto(String),

    #[error("store full and unable to evict")]
    StoreFull,

    #[error("SMTP protocol error: {0}")]
    SmtpProtocol(String),

    #[error("DNS lookup failed: {0}")]
    DnsLookup(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Render the SMTP reply line for errors that carry a precise code.
    ///
    /// `null_sender_context` distinguishes the MAIL FROM enhanced code
    /// (5.1.7) from the RCPT TO one (5.1.3) for address failures.
    pub fn smtp_reply(&self, mail_from_context: bool) -> Option<String> {
        match self {
            GatewayError::InvalidAddress(_) => {
                let enhanced = if mail_from_context { "5.1.7" } else { "5.1.3" };
                Some(format!("501 {} Invalid address: {}", enhanced, self))
            }
            GatewayError::DomainNotAllowed(_) => {
                Some("550 5.7.1 Relaying denied for recipient domain".to_string())
            }
            GatewayError::InboxNotFound(_) => {
                Some("550 5.1.1 Recipient address rejected".to_string())
            }
            GatewayError::HardModeActive { code } => {
                Some(format!("{} Gateway has no inboxes configured", code))
            }
            GatewayError::RateLimitExceeded { retry_after_ms } => Some(format!(
                "421 4.7.0 Rate limit exceeded, try again in {} seconds",
                retry_after_ms.div_ceil(1000)
            )),
            GatewayError::SizeExceeded { .. } => {
                Some("552 Message rejected - size limit exceeded".to_string())
            }
            GatewayError::ChaosSmtp {
                code,
                enhanced,
                message,
            } => Some(format!("{} {} {}", code, enhanced, message)),
            GatewayError::Crypto(_) => Some("451 4.3.0 Temporary failure".to_string()),
            GatewayError::StoreFull => {
                Some("452 4.3.1 Insufficient system storage".to_string())
            }
            // ChaosDrop closes the socket instead of replying; everything
            // else falls back to the generic temporary-failure path.
            GatewayError::ChaosDrop { .. } => None,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_error_reply_codes() {
        let err = GatewayError::InvalidAddress(AddressError::TooLong);
        assert!(err.smtp_reply(true).unwrap().starts_with("501 5.1.7"));
        assert!(err.smtp_reply(false).unwrap().starts_with("501 5.1.3"));
    }

    #[test]
    fn test_rate_limit_reply_rounds_up_seconds() {
        let err = GatewayError::RateLimitExceeded {
            retry_after_ms: 59_001,
        };
        let reply = err.smtp_reply(true).unwrap();
        assert!(reply.starts_with("421 4.7.0"));
        assert!(reply.contains("60 seconds"));
    }

    #[test]
    fn test_chaos_reply_is_literal() {
        let err = GatewayError::ChaosSmtp {
            code: 550,
            enhanced: "5.7.1".to_string(),
            message: "blocked".to_string(),
        };
        assert_eq!(err.smtp_reply(false).unwrap(), "550 5.7.1 blocked");
    }

    #[test]
    fn test_drop_has_no_reply() {
        let err = GatewayError::ChaosDrop { graceful: true };
        assert!(err.smtp_reply(false).is_none());
    }

    #[test]
    fn test_store_full_reply() {
        assert_eq!(
            GatewayError::StoreFull.smtp_reply(false).unwrap(),
            "452 4.3.1 Insufficient system storage"
        );
    }
}

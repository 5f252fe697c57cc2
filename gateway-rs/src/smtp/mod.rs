//! SMTP session engine.

pub mod commands;
pub mod server;
pub mod session;

pub use commands::SmtpCommand;
pub use server::SmtpServer;
pub use session::SmtpSession;

use crate::security::TlsInfo;

/// Envelope and transport facts for one TCP connection. Lives only for
/// the connection and is snapshotted into delivery.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: String,
    pub remote_ip: Option<String>,
    pub client_hostname: Option<String>,
    pub tls: Option<TlsInfo>,
    pub mail_from: Option<String>,
    pub rcpt_to: Vec<String>,
    /// `SMTP`, `ESMTP` or `ESMTPS`, for the Received header.
    pub transmission_type: String,
}

impl SessionInfo {
    pub fn new(session_id: String, remote_ip: Option<String>) -> Self {
        Self {
            session_id,
            remote_ip,
            client_hostname: None,
            tls: None,
            mail_from: None,
            rcpt_to: Vec::new(),
            transmission_type: "SMTP".to_string(),
        }
    }

    /// Clear envelope state (RSET, or after a completed transaction).
    pub fn reset_envelope(&mut self) {
        self.mail_from = None;
        self.rcpt_to.clear();
    }
}

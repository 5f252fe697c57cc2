//! Per-connection SMTP session.
//!
//! One task per connection; callbacks run strictly in protocol order
//! inside the session. The session owns command validation, early
//! rejection policy and TLS handling, and hands completed DATA payloads
//! to the delivery orchestrator.

use crate::config::Config;
use crate::delivery::DeliveryOrchestrator;
use crate::error::{GatewayError, Result};
use crate::inbox::InboxRegistry;
use crate::metrics::GatewayMetrics;
use crate::security::{RateLimiter, TlsConfig, TlsInfo, TlsInfoCache};
use crate::smtp::commands::SmtpCommand;
use crate::smtp::SessionInfo;
use crate::utils::{domain_of, inbox_key, normalize_ip, validate_recipient, validate_sender};
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::server::TlsStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// RFC 5321 command line limit.
const MAX_LINE_LENGTH: usize = 1000;

/// Recipients per envelope.
const MAX_RECIPIENTS: usize = 100;

/// Errors tolerated before the client is disconnected.
const MAX_ERRORS: usize = 10;

/// Unified stream type so plain and TLS connections share one session
/// loop, enabling STARTTLS upgrades mid-session.
enum SmtpStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    /// Transient state during STARTTLS upgrade; never observable.
    Upgrading,
}

impl AsyncRead for SmtpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SmtpStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            SmtpStream::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
            SmtpStream::Upgrading => panic!("I/O on SmtpStream during STARTTLS upgrade"),
        }
    }
}

impl AsyncWrite for SmtpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            SmtpStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            SmtpStream::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
            SmtpStream::Upgrading => panic!("I/O on SmtpStream during STARTTLS upgrade"),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SmtpStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            SmtpStream::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
            SmtpStream::Upgrading => panic!("I/O on SmtpStream during STARTTLS upgrade"),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SmtpStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            SmtpStream::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
            SmtpStream::Upgrading => panic!("I/O on SmtpStream during STARTTLS upgrade"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Connected,
    Greeted,
    SenderAccepted,
    RecipientsAccepted,
    Data,
}

enum SessionResult {
    /// Restart command processing (after a STARTTLS upgrade).
    Continue,
    Quit,
}

pub struct SmtpSession {
    config: Arc<Config>,
    registry: Arc<dyn InboxRegistry>,
    metrics: Arc<GatewayMetrics>,
    rate_limiter: Arc<RateLimiter>,
    orchestrator: Arc<DeliveryOrchestrator>,
    tls_config: Option<TlsConfig>,
    tls_cache: Arc<TlsInfoCache>,
    server_hostname: String,
    state: SessionState,
    info: SessionInfo,
    is_encrypted: bool,
    error_count: usize,
}

impl SmtpSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        registry: Arc<dyn InboxRegistry>,
        metrics: Arc<GatewayMetrics>,
        rate_limiter: Arc<RateLimiter>,
        orchestrator: Arc<DeliveryOrchestrator>,
        tls_config: Option<TlsConfig>,
        tls_cache: Arc<TlsInfoCache>,
        server_hostname: String,
    ) -> Self {
        let session_id = Uuid::new_v4().to_string();
        Self {
            config,
            registry,
            metrics,
            rate_limiter,
            orchestrator,
            tls_config,
            tls_cache,
            server_hostname,
            state: SessionState::Connected,
            info: SessionInfo::new(session_id, None),
            is_encrypted: false,
            error_count: 0,
        }
    }

    /// Drive the connection to completion, then release session caches.
    pub async fn handle(mut self, stream: TcpStream) -> Result<()> {
        self.metrics.connection_opened();
        let outcome = self.drive(stream).await;

        self.tls_cache.remove(&self.info.session_id).await;
        self.metrics.connection_closed();
        debug!(session_id = self.info.session_id, "session closed");
        outcome
    }

    async fn drive(&mut self, stream: TcpStream) -> Result<()> {
        let peer_ip = stream.peer_addr().ok().map(|addr| addr.ip().to_string());
        self.info.remote_ip = normalize_ip(peer_ip.as_deref());
        let remote_ip = self.info.remote_ip.clone().unwrap_or_default();
        info!(
            session_id = self.info.session_id,
            remote_ip, "connection accepted"
        );

        // Per-IP admission control happens before any bytes are sent.
        if let Err(err) = self.rate_limiter.consume(&remote_ip).await {
            self.metrics.rejections.rate_limit.fetch_add(1, Ordering::Relaxed);
            self.metrics.connection_rejected();
            let mut stream = stream;
            if let Some(reply) = err.smtp_reply(true) {
                let _ = stream.write_all(format!("{}\r\n", reply).as_bytes()).await;
            }
            return Ok(());
        }

        // Catch non-compliant clients that talk before the banner by
        // simply making them wait for it.
        if self.config.smtp.early_talker_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.smtp.early_talker_delay_ms))
                .await;
        }

        let mut smtp_stream = if self.config.smtp.secure {
            match &self.tls_config {
                Some(tls_config) => {
                    let tls_stream = tls_config.acceptor().accept(stream).await.map_err(|e| {
                        warn!(session_id = self.info.session_id, error = %e, "implicit TLS handshake failed");
                        GatewayError::Tls(format!("TLS handshake failed: {}", e))
                    })?;
                    self.record_tls_info(tls_stream.get_ref().1).await;
                    self.is_encrypted = true;
                    SmtpStream::Tls(Box::new(tls_stream))
                }
                None => {
                    error!("smtp.secure set without TLS material");
                    return Err(GatewayError::Tls(
                        "implicit TLS enabled without certificate".to_string(),
                    ));
                }
            }
        } else {
            SmtpStream::Plain(stream)
        };

        let banner = self
            .config
            .smtp
            .banner
            .clone()
            .unwrap_or_else(|| format!("{} ESMTP Service Ready", self.server_hostname));
        smtp_stream
            .write_all(format!("220 {}\r\n", banner).as_bytes())
            .await?;

        loop {
            match self.process_commands(&mut smtp_stream).await? {
                SessionResult::Continue => continue,
                SessionResult::Quit => break,
            }
        }

        Ok(())
    }

    async fn record_tls_info(&mut self, conn: &rustls::ServerConnection) {
        if let Some(tls_info) = TlsInfo::from_connection(conn) {
            info!(
                session_id = self.info.session_id,
                version = tls_info.version,
                cipher = tls_info.cipher,
                "TLS established"
            );
            self.tls_cache
                .insert(&self.info.session_id, tls_info.clone())
                .await;
            self.info.tls = Some(tls_info);
        }
    }

    async fn process_commands(&mut self, stream: &mut SmtpStream) -> Result<SessionResult> {
        // Reborrow so the reader can be dropped for STARTTLS upgrades.
        let mut buf_reader = BufReader::new(&mut *stream);
        let mut line = String::new();
        let command_timeout = Duration::from_millis(self.config.smtp.session_timeout_ms.max(1));

        loop {
            if self.error_count >= MAX_ERRORS {
                warn!(session_id = self.info.session_id, "too many errors, disconnecting");
                buf_reader
                    .write_all(b"421 4.7.0 Too many errors, closing connection\r\n")
                    .await?;
                return Ok(SessionResult::Quit);
            }

            line.clear();
            let read = match timeout(command_timeout, buf_reader.read_line(&mut line)).await {
                Ok(Ok(read)) => read,
                Ok(Err(e)) => {
                    debug!(session_id = self.info.session_id, error = %e, "read error");
                    return Err(e.into());
                }
                Err(_) => {
                    warn!(session_id = self.info.session_id, "session timeout");
                    buf_reader
                        .write_all(b"421 4.4.2 Timeout, closing connection\r\n")
                        .await?;
                    return Ok(SessionResult::Quit);
                }
            };

            if read == 0 {
                debug!(session_id = self.info.session_id, "client disconnected");
                return Ok(SessionResult::Quit);
            }

            if line.len() > MAX_LINE_LENGTH {
                self.metrics
                    .rejections
                    .invalid_commands
                    .fetch_add(1, Ordering::Relaxed);
                self.error_count += 1;
                buf_reader.write_all(b"500 5.5.2 Line too long\r\n").await?;
                continue;
            }

            let trimmed = line.trim_end();
            debug!(session_id = self.info.session_id, command = trimmed, "received");
            let command = SmtpCommand::parse(trimmed);

            if self.is_disabled(&command) {
                self.metrics
                    .rejections
                    .invalid_commands
                    .fetch_add(1, Ordering::Relaxed);
                buf_reader
                    .write_all(b"502 5.5.1 Command not implemented\r\n")
                    .await?;
                continue;
            }

            if command == SmtpCommand::StartTls {
                drop(buf_reader);
                return match self.handle_starttls(stream).await? {
                    true => Ok(SessionResult::Continue),
                    false => {
                        // Upgrade refused; resume on the same stream.
                        buf_reader = BufReader::new(&mut *stream);
                        continue;
                    }
                };
            }

            let reply = self.handle_command(command).await?;
            buf_reader.write_all(reply.as_bytes()).await?;

            if reply.starts_with("221") {
                return Ok(SessionResult::Quit);
            }

            if self.state == SessionState::Data {
                let keep_session = self.receive_data(&mut buf_reader).await?;
                if !keep_session {
                    return Ok(SessionResult::Quit);
                }
            }
        }
    }

    fn is_disabled(&self, command: &SmtpCommand) -> bool {
        let verb = command.verb();
        !verb.is_empty()
            && self
                .config
                .smtp
                .disabled_commands
                .iter()
                .any(|disabled| disabled.eq_ignore_ascii_case(verb))
    }

    async fn handle_command(&mut self, command: SmtpCommand) -> Result<String> {
        match (self.state, command) {
            (_, SmtpCommand::Helo(hostname)) => {
                info!(session_id = self.info.session_id, hostname, "HELO");
                self.info.client_hostname = Some(hostname.clone());
                self.info.transmission_type = "SMTP".to_string();
                self.info.reset_envelope();
                self.state = SessionState::Greeted;
                Ok(format!("250 {} Hello {}\r\n", self.server_hostname, hostname))
            }
            (_, SmtpCommand::Ehlo(hostname)) => {
                info!(session_id = self.info.session_id, hostname, "EHLO");
                self.info.client_hostname = Some(hostname.clone());
                self.info.transmission_type = if self.is_encrypted {
                    "ESMTPS".to_string()
                } else {
                    "ESMTP".to_string()
                };
                self.info.reset_envelope();
                self.state = SessionState::Greeted;

                let mut reply = format!("250-{} Hello {}\r\n", self.server_hostname, hostname);
                reply.push_str(&format!("250-SIZE {}\r\n", self.config.smtp.max_message_size));
                if !self.config.smtp.disable_pipelining {
                    reply.push_str("250-PIPELINING\r\n");
                }
                if self.tls_config.is_some() && !self.is_encrypted {
                    reply.push_str("250-STARTTLS\r\n");
                }
                reply.push_str("250-8BITMIME\r\n");
                reply.push_str("250 HELP\r\n");
                Ok(reply)
            }
            (
                SessionState::Greeted | SessionState::SenderAccepted | SessionState::RecipientsAccepted,
                SmtpCommand::MailFrom {
                    address,
                    declared_size,
                },
            ) => self.handle_mail_from(address, declared_size).await,
            (
                SessionState::SenderAccepted | SessionState::RecipientsAccepted,
                SmtpCommand::RcptTo(address),
            ) => self.handle_rcpt_to(address).await,
            (SessionState::RecipientsAccepted, SmtpCommand::Data) => {
                self.state = SessionState::Data;
                Ok("354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_string())
            }
            (_, SmtpCommand::Rset) => {
                self.info.reset_envelope();
                if self.state != SessionState::Connected {
                    self.state = SessionState::Greeted;
                }
                Ok("250 2.0.0 OK\r\n".to_string())
            }
            (_, SmtpCommand::Noop) => Ok("250 2.0.0 OK\r\n".to_string()),
            (_, SmtpCommand::Help) => {
                Ok("214 2.0.0 Commands: HELO EHLO MAIL RCPT DATA RSET NOOP QUIT\r\n".to_string())
            }
            (_, SmtpCommand::Quit) => {
                Ok(format!("221 {} closing connection\r\n", self.server_hostname))
            }
            (
                _,
                SmtpCommand::Vrfy | SmtpCommand::Expn | SmtpCommand::Etrn | SmtpCommand::Turn,
            ) => {
                self.metrics
                    .rejections
                    .invalid_commands
                    .fetch_add(1, Ordering::Relaxed);
                Ok("502 5.5.1 Command not implemented\r\n".to_string())
            }
            (_, SmtpCommand::StartTls) => {
                // Handled before dispatch; reaching here is a sequencing bug.
                error!("STARTTLS reached handle_command");
                Ok("503 5.5.1 Bad sequence of commands\r\n".to_string())
            }
            (_, SmtpCommand::Unknown(raw)) => {
                debug!(session_id = self.info.session_id, command = raw, "unknown command");
                self.metrics
                    .rejections
                    .invalid_commands
                    .fetch_add(1, Ordering::Relaxed);
                self.error_count += 1;
                Ok("500 5.5.2 Syntax error, command unrecognized\r\n".to_string())
            }
            _ => {
                self.error_count += 1;
                Ok("503 5.5.1 Bad sequence of commands\r\n".to_string())
            }
        }
    }

    async fn handle_mail_from(
        &mut self,
        address: String,
        declared_size: Option<usize>,
    ) -> Result<String> {
        if let Err(err) = validate_sender(&address) {
            self.metrics
                .rejections
                .sender_rejected
                .fetch_add(1, Ordering::Relaxed);
            self.error_count += 1;
            let reply = GatewayError::InvalidAddress(err)
                .smtp_reply(true)
                .unwrap_or_else(|| "501 5.1.7 Invalid address".to_string());
            return Ok(format!("{}\r\n", reply));
        }

        // Hard mode: while the deployment has no inboxes at all, refuse
        // senders outright with the configured code.
        let hard_mode_code = self.config.local.hard_mode_reject_code;
        if hard_mode_code > 0 && self.registry.get_inbox_count().await == 0 {
            warn!(
                session_id = self.info.session_id,
                "hard mode: rejecting MAIL FROM, no inboxes exist"
            );
            self.metrics
                .rejections
                .hard_mode
                .fetch_add(1, Ordering::Relaxed);
            return Ok(format!(
                "{} Gateway has no inboxes configured\r\n",
                hard_mode_code
            ));
        }

        // Re-consulted here to cap per-connection abuse.
        let remote_ip = self.info.remote_ip.clone().unwrap_or_default();
        if let Err(err) = self.rate_limiter.consume(&remote_ip).await {
            self.metrics
                .rejections
                .rate_limit
                .fetch_add(1, Ordering::Relaxed);
            let reply = err
                .smtp_reply(true)
                .unwrap_or_else(|| "421 4.7.0 Rate limit exceeded".to_string());
            return Ok(format!("{}\r\n", reply));
        }

        if let Some(declared) = declared_size {
            if declared > self.config.smtp.max_message_size {
                self.metrics
                    .rejections
                    .data_size
                    .fetch_add(1, Ordering::Relaxed);
                return Ok("552 5.3.4 Message size exceeds maximum\r\n".to_string());
            }
        }

        info!(session_id = self.info.session_id, sender = address, "MAIL FROM");
        self.info.mail_from = Some(address);
        self.info.rcpt_to.clear();
        self.state = SessionState::SenderAccepted;
        Ok("250 2.1.0 OK\r\n".to_string())
    }

    async fn handle_rcpt_to(&mut self, address: String) -> Result<String> {
        if let Err(err) = validate_recipient(&address) {
            self.metrics
                .rejections
                .recipient_rejected
                .fetch_add(1, Ordering::Relaxed);
            self.error_count += 1;
            let reply = GatewayError::InvalidAddress(err)
                .smtp_reply(false)
                .unwrap_or_else(|| "501 5.1.3 Invalid address".to_string());
            return Ok(format!("{}\r\n", reply));
        }

        if self.info.rcpt_to.len() >= MAX_RECIPIENTS {
            return Ok(format!(
                "452 4.5.3 Too many recipients (max {})\r\n",
                MAX_RECIPIENTS
            ));
        }

        // The domain allow-list is checked before any inbox lookup.
        let domain = domain_of(&address).unwrap_or_default();
        let allowed = self
            .config
            .smtp
            .allowed_recipient_domains
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&domain));
        if !allowed {
            warn!(
                session_id = self.info.session_id,
                recipient = address,
                "recipient domain not allowed"
            );
            self.metrics
                .rejections
                .recipient_rejected
                .fetch_add(1, Ordering::Relaxed);
            return Ok("550 5.7.1 Relaying denied for recipient domain\r\n".to_string());
        }

        let key = inbox_key(&address);
        if self.registry.get_inbox_by_email(&key).await.is_none() {
            info!(
                session_id = self.info.session_id,
                recipient = address,
                "recipient rejected: no such inbox"
            );
            self.metrics
                .rejections
                .recipient_rejected
                .fetch_add(1, Ordering::Relaxed);
            return Ok("550 5.1.1 Recipient address rejected\r\n".to_string());
        }

        info!(session_id = self.info.session_id, recipient = address, "RCPT TO");
        self.info.rcpt_to.push(address);
        self.state = SessionState::RecipientsAccepted;
        Ok("250 2.1.5 OK\r\n".to_string())
    }

    /// Read the DATA stream to the terminating dot and hand it to the
    /// orchestrator. Returns false when the session must close.
    async fn receive_data<S>(&mut self, buf_reader: &mut BufReader<S>) -> Result<bool>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let data_timeout = Duration::from_millis(self.config.smtp.session_timeout_ms.max(1));
        let max_size = self.config.smtp.max_message_size;
        let mut data: Vec<u8> = Vec::new();
        let mut oversized = false;
        let mut line = String::new();

        loop {
            line.clear();
            let read = match timeout(data_timeout, buf_reader.read_line(&mut line)).await {
                Ok(Ok(read)) => read,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    warn!(session_id = self.info.session_id, "timeout during DATA");
                    buf_reader
                        .write_all(b"421 4.4.2 Timeout, closing connection\r\n")
                        .await?;
                    return Ok(false);
                }
            };

            if read == 0 {
                // Disconnect mid-DATA: nothing is stored.
                debug!(session_id = self.info.session_id, "client closed during DATA");
                return Ok(false);
            }

            if line.trim_end() == "." {
                break;
            }

            // Keep draining after the limit so the 552 lands on the
            // terminating dot instead of mid-stream.
            if data.len() + line.len() > max_size {
                oversized = true;
                continue;
            }

            // Dot-stuffing transparency.
            if let Some(stuffed) = line.strip_prefix('.') {
                data.extend_from_slice(stuffed.as_bytes());
            } else {
                data.extend_from_slice(line.as_bytes());
            }
        }

        if oversized {
            warn!(
                session_id = self.info.session_id,
                max_size, "message rejected: size limit exceeded"
            );
            self.metrics
                .rejections
                .data_size
                .fetch_add(1, Ordering::Relaxed);
            buf_reader
                .write_all(b"552 Message rejected - size limit exceeded\r\n")
                .await?;
            self.reset_transaction();
            return Ok(true);
        }

        info!(
            session_id = self.info.session_id,
            bytes = data.len(),
            "DATA complete"
        );

        match self.orchestrator.deliver(&self.info, &data).await {
            Ok(outcome) => {
                if let Some(delay_ms) = outcome.delay_ms {
                    debug!(
                        session_id = self.info.session_id,
                        delay_ms, "applying chaos delay before reply"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                buf_reader
                    .write_all(b"250 2.0.0 OK: message accepted\r\n")
                    .await?;
                self.reset_transaction();
                Ok(true)
            }
            Err(GatewayError::ChaosDrop { graceful }) => {
                if graceful {
                    let _ = buf_reader
                        .write_all(b"421 4.3.0 Connection closing\r\n")
                        .await;
                }
                Ok(false)
            }
            Err(err) => {
                if matches!(err, GatewayError::SizeExceeded { .. }) {
                    self.metrics
                        .rejections
                        .data_size
                        .fetch_add(1, Ordering::Relaxed);
                }
                let reply = err
                    .smtp_reply(false)
                    .unwrap_or_else(|| "451 4.3.0 Temporary failure, try again later".to_string());
                error!(session_id = self.info.session_id, error = %err, "delivery failed");
                buf_reader.write_all(format!("{}\r\n", reply).as_bytes()).await?;
                self.reset_transaction();
                Ok(true)
            }
        }
    }

    fn reset_transaction(&mut self) {
        self.info.reset_envelope();
        self.state = SessionState::Greeted;
    }

    /// STARTTLS upgrade. Returns true when the stream was replaced and
    /// command processing must restart on the encrypted stream.
    async fn handle_starttls(&mut self, stream: &mut SmtpStream) -> Result<bool> {
        let tls_config = match &self.tls_config {
            Some(tls_config) => tls_config.clone(),
            None => {
                stream.write_all(b"502 5.5.1 STARTTLS not available\r\n").await?;
                return Ok(false);
            }
        };

        if self.is_encrypted {
            stream.write_all(b"503 5.5.1 Already using TLS\r\n").await?;
            return Ok(false);
        }

        if self.state != SessionState::Greeted {
            stream
                .write_all(b"503 5.5.1 Bad sequence of commands\r\n")
                .await?;
            return Ok(false);
        }

        stream.write_all(b"220 2.0.0 Ready to start TLS\r\n").await?;
        stream.flush().await?;

        let tcp_stream = match std::mem::replace(stream, SmtpStream::Upgrading) {
            SmtpStream::Plain(tcp) => tcp,
            other => {
                *stream = other;
                error!("STARTTLS on a non-plain stream");
                return Err(GatewayError::SmtpProtocol(
                    "stream state mismatch during STARTTLS".to_string(),
                ));
            }
        };

        let tls_stream = tls_config.acceptor().accept(tcp_stream).await.map_err(|e| {
            warn!(session_id = self.info.session_id, error = %e, "STARTTLS handshake failed");
            GatewayError::Tls(format!("TLS handshake failed: {}", e))
        })?;

        self.record_tls_info(tls_stream.get_ref().1).await;
        *stream = SmtpStream::Tls(Box::new(tls_stream));
        self.is_encrypted = true;

        // RFC 3207: the client must greet again on the secured channel.
        self.state = SessionState::Connected;
        self.info.reset_envelope();

        info!(session_id = self.info.session_id, "STARTTLS upgrade complete");
        Ok(true)
    }
}

//! Delivery orchestration.
//!
//! Everything that happens between a completed DATA stream and the final
//! SMTP reply: the Received trace, MIME parse, chaos evaluation, the auth
//! pipeline, optional spam analysis, payload construction,
//! encrypt-or-plain storage and event emission.

pub mod payload;
pub mod received;

pub use received::{build_received_header, prepend_received_header};

use crate::authentication::{AuthInput, AuthPipeline};
use crate::chaos::{ChaosContext, ChaosEngine, ChaosOutcome, ChaosTrigger};
use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::events::{EventBus, EventTopic};
use crate::inbox::{ClientCrypto, Inbox, InboxRegistry, StoredMessage};
use crate::metrics::GatewayMetrics;
use crate::mime::{parse_email, parse_headers, ParsedEmail};
use crate::security::TlsInfoCache;
use crate::smtp::SessionInfo;
use crate::spam::{SpamScanStatus, SpamScanner, SpamVerdict};
use crate::store::EmailStore;
use crate::utils::inbox_key;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use payload::{
    attachment_summaries, build_metadata, build_parsed_payload, build_raw_payload, AAD_METADATA,
    AAD_PARSED, AAD_RAW,
};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Non-error result of a delivery, applied by the session before its
/// final reply.
#[derive(Debug, Default)]
pub struct DeliveryOutcome {
    pub delay_ms: Option<u64>,
    pub blackholed: bool,
}

struct RecipientContext {
    rcpt_address: String,
    key: String,
    inbox: Inbox,
}

pub struct DeliveryOrchestrator {
    config: Arc<Config>,
    registry: Arc<dyn InboxRegistry>,
    crypto: Arc<dyn ClientCrypto>,
    store: Arc<EmailStore>,
    chaos: Arc<ChaosEngine>,
    auth: Arc<AuthPipeline>,
    scanner: Option<Arc<dyn SpamScanner>>,
    events: EventBus,
    metrics: Arc<GatewayMetrics>,
    tls_cache: Arc<TlsInfoCache>,
    server_hostname: String,
}

impl DeliveryOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        registry: Arc<dyn InboxRegistry>,
        crypto: Arc<dyn ClientCrypto>,
        store: Arc<EmailStore>,
        chaos: Arc<ChaosEngine>,
        auth: Arc<AuthPipeline>,
        scanner: Option<Arc<dyn SpamScanner>>,
        events: EventBus,
        metrics: Arc<GatewayMetrics>,
        tls_cache: Arc<TlsInfoCache>,
        server_hostname: String,
    ) -> Self {
        Self {
            config,
            registry,
            crypto,
            store,
            chaos,
            auth,
            scanner,
            events,
            metrics,
            tls_cache,
            server_hostname,
        }
    }

    /// Process one accepted DATA payload end to end.
    pub async fn deliver(
        &self,
        session: &SessionInfo,
        client_raw: &[u8],
    ) -> Result<DeliveryOutcome> {
        let recipients = self.resolve_recipients(session).await?;
        let primary = &recipients[0];

        // The trace header names the primary recipient; alias fan-in
        // still produces a single stored message per base inbox.
        let tls = match &session.tls {
            Some(tls) => Some(tls.clone()),
            None => self.tls_cache.get(&session.session_id).await,
        };
        let header = build_received_header(
            session,
            &self.server_hostname,
            tls.as_ref(),
            &primary.rcpt_address,
            Utc::now(),
        );
        let full_raw = prepend_received_header(&header, client_raw);

        let parsed = parse_email(&full_raw, &session.session_id);
        let headers = parse_headers(&full_raw);

        let outcome = self
            .chaos
            .evaluate(
                primary.inbox.chaos_config.as_ref(),
                ChaosContext {
                    trigger: ChaosTrigger::OnData,
                    session_id: &session.session_id,
                    inbox_key: &primary.key,
                    sender_ip: session.remote_ip.as_deref(),
                    sender_email: session.mail_from.as_deref(),
                },
            )
            .await?;

        let verdicts = self
            .auth
            .run(
                AuthInput {
                    session_id: &session.session_id,
                    remote_ip: session.remote_ip.as_deref(),
                    client_hostname: session.client_hostname.as_deref(),
                    mail_from: session.mail_from.as_deref(),
                    raw: &full_raw,
                    headers: &headers,
                },
                primary.inbox.email_auth_enabled.unwrap_or(true),
            )
            .await;

        let spam = self.scan_spam(&full_raw, session, &primary.inbox).await;

        if let ChaosOutcome::Blackhole { trigger_webhooks } = outcome {
            info!(
                session_id = session.session_id,
                inbox = primary.key,
                trigger_webhooks,
                "message blackholed, skipping storage"
            );
            if trigger_webhooks {
                for recipient in &recipients {
                    self.emit_received(recipient, session, parsed.as_ref(), &verdicts);
                }
            }
            return Ok(DeliveryOutcome {
                delay_ms: None,
                blackholed: true,
            });
        }

        let raw_b64 = build_raw_payload(&full_raw);

        for recipient in &recipients {
            let message_id = Uuid::new_v4().to_string();
            let received_at = Utc::now();

            let metadata = build_metadata(
                &message_id,
                session
                    .mail_from
                    .as_deref()
                    .filter(|from| !from.is_empty())
                    .unwrap_or("<>"),
                &recipient.rcpt_address,
                parsed.as_ref().and_then(|parsed| parsed.subject.as_deref()),
                received_at,
            );
            let parsed_payload = build_parsed_payload(
                parsed.as_ref(),
                session,
                &headers,
                &verdicts,
                spam.as_ref(),
            );

            let metadata_bytes = serde_json::to_vec(&metadata)?;
            let parsed_bytes = serde_json::to_vec(&parsed_payload)?;

            if recipient.inbox.encrypted {
                let Some(client_key) = recipient.inbox.client_kem_public_key.as_deref() else {
                    warn!(
                        inbox = recipient.key,
                        "encrypted inbox without a registered client key"
                    );
                    return Err(GatewayError::Crypto(
                        "encrypted inbox has no client key".to_string(),
                    ));
                };

                let encrypted_metadata = self
                    .crypto
                    .encrypt_for_client(client_key, &metadata_bytes, AAD_METADATA)
                    .await?;
                let encrypted_parsed = self
                    .crypto
                    .encrypt_for_client(client_key, &parsed_bytes, AAD_PARSED)
                    .await?;
                let encrypted_raw = self
                    .crypto
                    .encrypt_for_client(client_key, raw_b64.as_bytes(), AAD_RAW)
                    .await?;

                let new_email_payload = json!({
                    "inbox_hash": recipient.inbox.inbox_hash,
                    "email_id": message_id,
                    "encrypted_metadata": encrypted_metadata.to_json(),
                });

                self.store
                    .store(
                        &recipient.key,
                        StoredMessage::Encrypted {
                            id: message_id.clone(),
                            encrypted_metadata,
                            encrypted_parsed,
                            encrypted_raw,
                            is_read: false,
                        },
                    )
                    .await?;

                self.events.emit(EventTopic::EmailNew, new_email_payload);
            } else {
                let metadata_b64 = BASE64.encode(&metadata_bytes);
                self.store
                    .store(
                        &recipient.key,
                        StoredMessage::Plain {
                            id: message_id.clone(),
                            metadata_bytes,
                            parsed_bytes,
                            raw_bytes: raw_b64.clone().into_bytes(),
                            is_read: false,
                        },
                    )
                    .await?;

                self.events.emit(
                    EventTopic::EmailNew,
                    json!({
                        "inbox_hash": recipient.inbox.inbox_hash,
                        "email_id": message_id,
                        "metadata_b64": metadata_b64,
                    }),
                );
            }

            self.events.emit(
                EventTopic::EmailStored,
                json!({
                    "email_id": message_id,
                    "inbox_hash": recipient.inbox.inbox_hash,
                    "inbox_email": recipient.inbox.email,
                }),
            );
            self.emit_received(recipient, session, parsed.as_ref(), &verdicts);

            info!(
                session_id = session.session_id,
                inbox = recipient.key,
                message_id,
                "message delivered"
            );
        }

        let delay_ms = match outcome {
            ChaosOutcome::Delay { delay_ms } => Some(delay_ms),
            _ => None,
        };

        Ok(DeliveryOutcome {
            delay_ms,
            blackholed: false,
        })
    }

    /// Dedupe the envelope recipients by base inbox and resolve their
    /// records. A recipient whose inbox vanished since RCPT is dropped.
    async fn resolve_recipients(&self, session: &SessionInfo) -> Result<Vec<RecipientContext>> {
        let mut recipients: Vec<RecipientContext> = Vec::new();

        for rcpt in &session.rcpt_to {
            let key = inbox_key(rcpt);
            if recipients.iter().any(|existing| existing.key == key) {
                continue;
            }
            match self.registry.get_inbox_by_email(&key).await {
                Some(inbox) => recipients.push(RecipientContext {
                    rcpt_address: rcpt.clone(),
                    key,
                    inbox,
                }),
                None => {
                    warn!(
                        session_id = session.session_id,
                        recipient = %rcpt,
                        "inbox disappeared between RCPT and DATA"
                    );
                }
            }
        }

        if recipients.is_empty() {
            return Err(GatewayError::SmtpProtocol(
                "no deliverable recipients".to_string(),
            ));
        }
        Ok(recipients)
    }

    async fn scan_spam(
        &self,
        full_raw: &[u8],
        session: &SessionInfo,
        inbox: &Inbox,
    ) -> Option<SpamVerdict> {
        if !self.config.spam_analysis.enabled {
            return None;
        }

        let spam_metrics = &self.metrics.spam;
        let inbox_enabled = inbox
            .spam_analysis_enabled
            .unwrap_or(self.config.spam_analysis.inbox_default);
        if !inbox_enabled {
            spam_metrics.skipped.fetch_add(1, Ordering::Relaxed);
            return Some(SpamVerdict::skipped("Spam analysis disabled for inbox"));
        }

        let Some(scanner) = &self.scanner else {
            spam_metrics.skipped.fetch_add(1, Ordering::Relaxed);
            return Some(SpamVerdict::skipped("No spam scanner configured"));
        };

        let verdict = scanner
            .analyze(full_raw, &session.session_id, Some(inbox))
            .await;

        match verdict.status {
            SpamScanStatus::Analyzed => {
                spam_metrics.analyzed.fetch_add(1, Ordering::Relaxed);
                if verdict.is_spam == Some(true) {
                    spam_metrics.detected.fetch_add(1, Ordering::Relaxed);
                }
                if let Some(elapsed) = verdict.processing_time_ms {
                    spam_metrics
                        .processing_time_ms
                        .fetch_add(elapsed, Ordering::Relaxed);
                }
            }
            SpamScanStatus::Skipped => {
                spam_metrics.skipped.fetch_add(1, Ordering::Relaxed);
            }
            SpamScanStatus::Error => {
                spam_metrics.errors.fetch_add(1, Ordering::Relaxed);
            }
        }

        Some(verdict)
    }

    fn emit_received(
        &self,
        recipient: &RecipientContext,
        session: &SessionInfo,
        parsed: Option<&ParsedEmail>,
        verdicts: &crate::authentication::AuthVerdicts,
    ) {
        let payload = json!({
            "inbox_email": recipient.inbox.email,
            "inbox_hash": recipient.inbox.inbox_hash,
            "from": parsed
                .and_then(|parsed| parsed.from.as_ref().map(|block| block.text.clone()))
                .unwrap_or_else(|| session.mail_from.clone().unwrap_or_default()),
            "to": parsed
                .and_then(|parsed| parsed.to.as_ref().map(|block| block.text.clone()))
                .unwrap_or_else(|| session.rcpt_to.join(", ")),
            "cc": parsed.and_then(|parsed| parsed.cc.as_ref().map(|block| block.text.clone())),
            "subject": parsed.and_then(|parsed| parsed.subject.clone()),
            "text": parsed.and_then(|parsed| parsed.text.clone()),
            "html": parsed.and_then(|parsed| parsed.html.clone()),
            "attachments": attachment_summaries(parsed),
            "auth": serde_json::to_value(verdicts).unwrap_or_default(),
        });
        self.events.emit(EventTopic::EmailReceived, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chaos::{ChaosAction, ChaosConfig, ChaosEntry};
    use crate::config::Config;
    use crate::inbox::{EncryptedBlob, InMemoryInboxRegistry};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Deterministic stand-in for the crypto collaborator.
    struct FakeCrypto;

    #[async_trait]
    impl ClientCrypto for FakeCrypto {
        async fn encrypt_for_client(
            &self,
            _client_kem_public_key: &[u8],
            plaintext: &[u8],
            aad: &[u8],
        ) -> Result<EncryptedBlob> {
            Ok(EncryptedBlob {
                ct_kem: vec![1; 32],
                nonce: vec![2; 12],
                aad: aad.to_vec(),
                ciphertext: plaintext.to_vec(),
                sig: vec![3; 64],
                server_sig_pk: vec![4; 32],
            })
        }
    }

    struct Fixture {
        registry: Arc<InMemoryInboxRegistry>,
        store: Arc<EmailStore>,
        events: EventBus,
        metrics: Arc<GatewayMetrics>,
        orchestrator: DeliveryOrchestrator,
    }

    fn fixture_with_config(config: Config) -> Fixture {
        let config = Arc::new(config);
        let registry = Arc::new(InMemoryInboxRegistry::new());
        let metrics = Arc::new(GatewayMetrics::new());
        let store = Arc::new(EmailStore::new(
            config.max_memory_bytes(),
            config.max_email_age_ms(),
            registry.clone(),
        ));
        let chaos = Arc::new(ChaosEngine::new(
            config.chaos.enabled,
            Duration::from_secs(config.chaos.greylist_delay_seconds),
            metrics.clone(),
        ));
        let auth = Arc::new(AuthPipeline::new(
            crate::config::EmailAuthConfig {
                enabled: false,
                ..Default::default()
            },
            metrics.clone(),
        ));
        let events = EventBus::new(64);
        let orchestrator = DeliveryOrchestrator::new(
            config.clone(),
            registry.clone(),
            Arc::new(FakeCrypto),
            store.clone(),
            chaos,
            auth,
            None,
            events.clone(),
            metrics.clone(),
            Arc::new(TlsInfoCache::new()),
            "gw.example.com".to_string(),
        );

        Fixture {
            registry,
            store,
            events,
            metrics,
            orchestrator,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_config(Config::default())
    }

    fn session(rcpts: &[&str]) -> SessionInfo {
        let mut session = SessionInfo::new("sess-1".to_string(), Some("192.0.2.1".to_string()));
        session.client_hostname = Some("client.ex.org".to_string());
        session.mail_from = Some("s@ex.org".to_string());
        session.rcpt_to = rcpts.iter().map(|r| r.to_string()).collect();
        session.transmission_type = "ESMTP".to_string();
        session
    }

    const RAW: &[u8] = b"From: s@ex.org\r\nTo: user@example.com\r\nSubject: Hi\r\n\r\nbody";

    #[tokio::test]
    async fn test_plain_delivery_stores_and_notifies() {
        let fixture = fixture();
        fixture
            .registry
            .register(Inbox::plain("user@example.com"))
            .await;
        let mut rx = fixture.events.subscribe();

        let outcome = fixture
            .orchestrator
            .deliver(&session(&["user@example.com"]), RAW)
            .await
            .unwrap();
        assert!(outcome.delay_ms.is_none());
        assert!(!outcome.blackholed);

        let messages = fixture.registry.messages("user@example.com").await;
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            StoredMessage::Plain {
                metadata_bytes,
                parsed_bytes,
                raw_bytes,
                ..
            } => {
                let metadata: serde_json::Value =
                    serde_json::from_slice(metadata_bytes).unwrap();
                assert_eq!(metadata["subject"], "Hi");
                assert_eq!(metadata["from"], "s@ex.org");

                let parsed: serde_json::Value = serde_json::from_slice(parsed_bytes).unwrap();
                assert_eq!(parsed["subject"], "Hi");
                assert_eq!(parsed["auth"]["spf"]["status"], "skipped");

                let raw = BASE64
                    .decode(std::str::from_utf8(raw_bytes).unwrap())
                    .unwrap();
                assert!(raw.starts_with(b"Received: from client.ex.org"));
            }
            other => panic!("expected plain message, got {other:?}"),
        }

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, EventTopic::EmailNew);
        assert!(event.payload["metadata_b64"].is_string());
        assert_eq!(
            event.payload["inbox_hash"],
            crate::inbox::inbox_hash("user@example.com")
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, EventTopic::EmailStored);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, EventTopic::EmailReceived);
        assert_eq!(event.payload["subject"], "Hi");

        assert_eq!(fixture.store.metrics().await.total_stored, 1);
    }

    #[tokio::test]
    async fn test_alias_fan_in_delivers_once() {
        let fixture = fixture();
        fixture
            .registry
            .register(Inbox::plain("user@example.com"))
            .await;

        fixture
            .orchestrator
            .deliver(
                &session(&["user+x@example.com", "user+y@example.com"]),
                RAW,
            )
            .await
            .unwrap();

        assert_eq!(fixture.registry.messages("user@example.com").await.len(), 1);
        assert_eq!(fixture.store.metrics().await.total_stored, 1);
    }

    #[tokio::test]
    async fn test_encrypted_delivery_uses_role_aads() {
        let fixture = fixture();
        fixture
            .registry
            .register(Inbox::encrypted("user@example.com", vec![9; 32]))
            .await;
        let mut rx = fixture.events.subscribe();

        fixture
            .orchestrator
            .deliver(&session(&["user@example.com"]), RAW)
            .await
            .unwrap();

        let messages = fixture.registry.messages("user@example.com").await;
        match &messages[0] {
            StoredMessage::Encrypted {
                encrypted_metadata,
                encrypted_parsed,
                encrypted_raw,
                ..
            } => {
                assert_eq!(encrypted_metadata.aad, AAD_METADATA);
                assert_eq!(encrypted_parsed.aad, AAD_PARSED);
                assert_eq!(encrypted_raw.aad, AAD_RAW);
            }
            other => panic!("expected encrypted message, got {other:?}"),
        }

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, EventTopic::EmailNew);
        assert!(event.payload["encrypted_metadata"]["ciphertext"].is_string());
        assert!(event.payload.get("metadata_b64").is_none());
    }

    #[tokio::test]
    async fn test_chaos_error_aborts_without_storage() {
        let fixture = fixture_with_config({
            let mut config = Config::default();
            config.chaos.enabled = true;
            config
        });
        let mut inbox = Inbox::plain("user@example.com");
        inbox.chaos_config = Some(ChaosConfig {
            enabled: true,
            entries: vec![ChaosEntry {
                types: vec![ChaosTrigger::OnData],
                probability: 1.0,
                action: ChaosAction::Error {
                    code: 550,
                    enhanced: "5.7.1".to_string(),
                    message: "blocked".to_string(),
                },
            }],
        });
        fixture.registry.register(inbox).await;

        let err = fixture
            .orchestrator
            .deliver(&session(&["user@example.com"]), RAW)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ChaosSmtp { code: 550, .. }));

        assert!(fixture.registry.messages("user@example.com").await.is_empty());
        assert_eq!(
            fixture
                .metrics
                .chaos
                .errors_returned
                .load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_chaos_delay_is_reported_not_slept_here() {
        let fixture = fixture_with_config({
            let mut config = Config::default();
            config.chaos.enabled = true;
            config
        });
        let mut inbox = Inbox::plain("user@example.com");
        inbox.chaos_config = Some(ChaosConfig {
            enabled: true,
            entries: vec![ChaosEntry {
                types: vec![],
                probability: 1.0,
                action: ChaosAction::Delay { delay_ms: 1234 },
            }],
        });
        fixture.registry.register(inbox).await;

        let started = std::time::Instant::now();
        let outcome = fixture
            .orchestrator
            .deliver(&session(&["user@example.com"]), RAW)
            .await
            .unwrap();
        assert_eq!(outcome.delay_ms, Some(1234));
        // The sleep belongs to the session, not the orchestrator.
        assert!(started.elapsed() < Duration::from_millis(1000));
        assert_eq!(fixture.registry.messages("user@example.com").await.len(), 1);
    }

    #[tokio::test]
    async fn test_blackhole_skips_storage_but_can_emit() {
        let fixture = fixture_with_config({
            let mut config = Config::default();
            config.chaos.enabled = true;
            config
        });
        let mut inbox = Inbox::plain("user@example.com");
        inbox.chaos_config = Some(ChaosConfig {
            enabled: true,
            entries: vec![ChaosEntry {
                types: vec![],
                probability: 1.0,
                action: ChaosAction::Blackhole {
                    trigger_webhooks: true,
                },
            }],
        });
        fixture.registry.register(inbox).await;
        let mut rx = fixture.events.subscribe();

        let outcome = fixture
            .orchestrator
            .deliver(&session(&["user@example.com"]), RAW)
            .await
            .unwrap();
        assert!(outcome.blackholed);

        assert!(fixture.registry.messages("user@example.com").await.is_empty());
        assert_eq!(fixture.store.metrics().await.total_stored, 0);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, EventTopic::EmailReceived);
    }

    #[tokio::test]
    async fn test_no_deliverable_recipients_is_an_error() {
        let fixture = fixture();
        let err = fixture
            .orchestrator
            .deliver(&session(&["ghost@example.com"]), RAW)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::SmtpProtocol(_)));
    }
}

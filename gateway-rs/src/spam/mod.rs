//! Spam analysis through an external Rspamd instance.
//!
//! The scanner posts raw message bytes to `/checkv2` with a configurable
//! timeout. Scan failures degrade to an `error` verdict and never block
//! delivery.

use crate::config::RspamdConfig;
use crate::inbox::Inbox;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpamScanStatus {
    Analyzed,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpamVerdict {
    pub status: SpamScanStatus,
    pub score: Option<f64>,
    pub required_score: Option<f64>,
    pub action: Option<String>,
    pub is_spam: Option<bool>,
    pub symbols: Option<Vec<String>>,
    pub processing_time_ms: Option<u64>,
    pub info: Option<String>,
}

impl SpamVerdict {
    pub fn skipped(info: &str) -> Self {
        Self {
            status: SpamScanStatus::Skipped,
            score: None,
            required_score: None,
            action: None,
            is_spam: None,
            symbols: None,
            processing_time_ms: None,
            info: Some(info.to_string()),
        }
    }

    pub fn error(info: String) -> Self {
        Self {
            status: SpamScanStatus::Error,
            score: None,
            required_score: None,
            action: None,
            is_spam: None,
            symbols: None,
            processing_time_ms: None,
            info: Some(info),
        }
    }
}

#[async_trait]
pub trait SpamScanner: Send + Sync {
    async fn analyze(&self, raw: &[u8], session_id: &str, inbox: Option<&Inbox>) -> SpamVerdict;
}

/// Rspamd `/checkv2` response subset the gateway cares about.
#[derive(Debug, Deserialize)]
struct RspamdReply {
    score: Option<f64>,
    required_score: Option<f64>,
    action: Option<String>,
    #[serde(default)]
    symbols: serde_json::Map<String, serde_json::Value>,
}

pub struct RspamdScanner {
    client: reqwest::Client,
    url: String,
    password: Option<String>,
}

impl RspamdScanner {
    pub fn new(config: &RspamdConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            password: config.password.clone(),
        }
    }
}

#[async_trait]
impl SpamScanner for RspamdScanner {
    async fn analyze(&self, raw: &[u8], session_id: &str, inbox: Option<&Inbox>) -> SpamVerdict {
        let started = Instant::now();

        let mut request = self
            .client
            .post(format!("{}/checkv2", self.url))
            .body(raw.to_vec());
        if let Some(password) = &self.password {
            request = request.header("Password", password.clone());
        }
        if let Some(inbox) = inbox {
            request = request.header("Rcpt", inbox.email.clone());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(session_id, error = %err, "rspamd request failed");
                return SpamVerdict::error(format!("Rspamd request failed: {}", err));
            }
        };

        if !response.status().is_success() {
            warn!(session_id, status = %response.status(), "rspamd returned error status");
            return SpamVerdict::error(format!(
                "Rspamd returned status {}",
                response.status()
            ));
        }

        let reply: RspamdReply = match response.json().await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(session_id, error = %err, "rspamd reply unparseable");
                return SpamVerdict::error(format!("Rspamd reply unparseable: {}", err));
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let is_spam = match (reply.score, reply.required_score) {
            (Some(score), Some(required)) => Some(score >= required),
            _ => None,
        };

        debug!(
            session_id,
            score = reply.score.unwrap_or_default(),
            action = reply.action.as_deref().unwrap_or(""),
            elapsed_ms,
            "rspamd scan complete"
        );

        SpamVerdict {
            status: SpamScanStatus::Analyzed,
            score: reply.score,
            required_score: reply.required_score,
            action: reply.action,
            is_spam,
            symbols: Some(reply.symbols.keys().cloned().collect()),
            processing_time_ms: Some(elapsed_ms),
            info: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_constructors() {
        let skipped = SpamVerdict::skipped("disabled for inbox");
        assert_eq!(skipped.status, SpamScanStatus::Skipped);
        assert_eq!(skipped.info.as_deref(), Some("disabled for inbox"));

        let error = SpamVerdict::error("boom".to_string());
        assert_eq!(error.status, SpamScanStatus::Error);
    }

    #[test]
    fn test_reply_parsing() {
        let json = r#"{
            "score": 7.5,
            "required_score": 5.0,
            "action": "add header",
            "symbols": {"FORGED_SENDER": {"score": 0.3}, "MISSING_DATE": {"score": 1.0}}
        }"#;
        let reply: RspamdReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.score, Some(7.5));
        assert_eq!(reply.required_score, Some(5.0));
        assert_eq!(reply.symbols.len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error_verdict() {
        let scanner = RspamdScanner::new(&RspamdConfig {
            // Reserved TEST-NET address, nothing listens there.
            url: "http://192.0.2.1:11333".to_string(),
            timeout_ms: 200,
            password: None,
        });

        let verdict = scanner.analyze(b"raw", "session-1", None).await;
        assert_eq!(verdict.status, SpamScanStatus::Error);
        assert!(verdict.info.is_some());
    }
}

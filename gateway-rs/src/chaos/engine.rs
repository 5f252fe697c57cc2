//! Chaos evaluation.

use super::greylist::{GreylistDecision, GreylistState};
use super::types::{ChaosAction, ChaosConfig, ChaosOutcome, ChaosTrigger};
use crate::error::{GatewayError, Result};
use crate::metrics::GatewayMetrics;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Evaluation context for one trigger point.
pub struct ChaosContext<'a> {
    pub trigger: ChaosTrigger,
    pub session_id: &'a str,
    pub inbox_key: &'a str,
    pub sender_ip: Option<&'a str>,
    pub sender_email: Option<&'a str>,
}

pub struct ChaosEngine {
    enabled: bool,
    greylist: GreylistState,
    metrics: Arc<GatewayMetrics>,
}

impl ChaosEngine {
    pub fn new(enabled: bool, greylist_delay: Duration, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            enabled,
            greylist: GreylistState::new(greylist_delay),
            metrics,
        }
    }

    /// Evaluate an inbox's chaos configuration at one trigger point.
    ///
    /// Entries are walked in declaration order; the first one whose
    /// trigger set matches and whose probability draw succeeds decides.
    /// `Error`, `Drop` and greylist rejections surface as typed errors;
    /// `Delay` and `Blackhole` come back as outcomes the orchestrator
    /// applies after the rest of the processing.
    pub async fn evaluate(
        &self,
        config: Option<&ChaosConfig>,
        ctx: ChaosContext<'_>,
    ) -> Result<ChaosOutcome> {
        if !self.enabled {
            return Ok(ChaosOutcome::Continue);
        }

        let config = match config {
            Some(config) if config.enabled => config,
            _ => return Ok(ChaosOutcome::Continue),
        };

        for entry in &config.entries {
            if !entry.types.is_empty() && !entry.types.contains(&ctx.trigger) {
                continue;
            }
            if !draw(entry.probability) {
                continue;
            }

            return self.apply(&entry.action, &ctx).await;
        }

        Ok(ChaosOutcome::Continue)
    }

    async fn apply(&self, action: &ChaosAction, ctx: &ChaosContext<'_>) -> Result<ChaosOutcome> {
        let chaos = &self.metrics.chaos;
        match action {
            ChaosAction::Continue => Ok(ChaosOutcome::Continue),
            ChaosAction::Error {
                code,
                enhanced,
                message,
            } => {
                info!(
                    session_id = ctx.session_id,
                    inbox = ctx.inbox_key,
                    code,
                    "chaos: returning error"
                );
                chaos.events.fetch_add(1, Ordering::Relaxed);
                chaos.errors_returned.fetch_add(1, Ordering::Relaxed);
                Err(GatewayError::ChaosSmtp {
                    code: *code,
                    enhanced: enhanced.clone(),
                    message: message.clone(),
                })
            }
            ChaosAction::Drop { graceful } => {
                info!(
                    session_id = ctx.session_id,
                    inbox = ctx.inbox_key,
                    graceful,
                    "chaos: dropping connection"
                );
                chaos.events.fetch_add(1, Ordering::Relaxed);
                chaos.connections_dropped.fetch_add(1, Ordering::Relaxed);
                Err(GatewayError::ChaosDrop { graceful: *graceful })
            }
            ChaosAction::Delay { delay_ms } => {
                info!(
                    session_id = ctx.session_id,
                    inbox = ctx.inbox_key,
                    delay_ms,
                    "chaos: scheduling delay"
                );
                chaos.events.fetch_add(1, Ordering::Relaxed);
                chaos
                    .latency_injected_ms
                    .fetch_add(*delay_ms, Ordering::Relaxed);
                Ok(ChaosOutcome::Delay {
                    delay_ms: *delay_ms,
                })
            }
            ChaosAction::Blackhole { trigger_webhooks } => {
                info!(
                    session_id = ctx.session_id,
                    inbox = ctx.inbox_key,
                    trigger_webhooks,
                    "chaos: blackholing message"
                );
                chaos.events.fetch_add(1, Ordering::Relaxed);
                chaos.blackhole.fetch_add(1, Ordering::Relaxed);
                Ok(ChaosOutcome::Blackhole {
                    trigger_webhooks: *trigger_webhooks,
                })
            }
            ChaosAction::Greylist => {
                let sender_ip = ctx.sender_ip.unwrap_or_default();
                let sender_email = ctx.sender_email.unwrap_or_default();
                match self.greylist.check(sender_ip, sender_email).await {
                    GreylistDecision::TemporaryReject => {
                        info!(
                            session_id = ctx.session_id,
                            inbox = ctx.inbox_key,
                            sender_ip,
                            "chaos: greylist rejection"
                        );
                        chaos.events.fetch_add(1, Ordering::Relaxed);
                        chaos.greylist_rejections.fetch_add(1, Ordering::Relaxed);
                        Err(GatewayError::ChaosSmtp {
                            code: 451,
                            enhanced: "4.7.1".to_string(),
                            message: "Greylisted, please try again later".to_string(),
                        })
                    }
                    GreylistDecision::Allow => Ok(ChaosOutcome::Continue),
                }
            }
        }
    }
}

/// Uniform probability draw. 0.0 never fires; 1.0 always fires.
fn draw(probability: f64) -> bool {
    rand::random::<f64>() < probability
}

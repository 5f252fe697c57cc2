//! Email authentication pipeline.
//!
//! Runs SPF, DKIM, DMARC and reverse DNS for each accepted message and
//! produces normalized verdicts. Verdicts are never fatal; they ride along
//! on the stored message and its events. Each check can be disabled
//! globally or per recipient inbox, in which case it reports `skipped`.

pub mod dkim;
pub mod dmarc;
pub mod reverse_dns;
pub mod spf;
pub mod types;

pub use types::{
    AuthVerdicts, DkimSignatureVerdict, DkimStatus, DmarcPolicy, DmarcStatus, DmarcVerdict,
    ReverseDnsStatus, ReverseDnsVerdict, SpfStatus, SpfVerdict,
};

use crate::config::EmailAuthConfig;
use crate::metrics::GatewayMetrics;
use crate::utils::dns::BoundedResolver;
use crate::utils::domain_of;
use dkim::DkimChecker;
use dmarc::DmarcChecker;
use mail_auth::{AuthenticatedMessage, Resolver};
use reverse_dns::ReverseDnsChecker;
use spf::SpfChecker;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-message inputs to the pipeline.
pub struct AuthInput<'a> {
    pub session_id: &'a str,
    pub remote_ip: Option<&'a str>,
    pub client_hostname: Option<&'a str>,
    pub mail_from: Option<&'a str>,
    pub raw: &'a [u8],
    pub headers: &'a HashMap<String, String>,
}

pub struct AuthPipeline {
    config: EmailAuthConfig,
    spf: SpfChecker,
    dkim: DkimChecker,
    dmarc: DmarcChecker,
    reverse_dns: ReverseDnsChecker,
    metrics: Arc<GatewayMetrics>,
}

impl AuthPipeline {
    pub fn new(config: EmailAuthConfig, metrics: Arc<GatewayMetrics>) -> Self {
        let resolver = Arc::new(Resolver::new_system_conf().unwrap_or_else(|_| {
            warn!("Failed to load system DNS config, using default resolver");
            Resolver::new_cloudflare_tls().expect("Failed to create DNS resolver")
        }));
        let dns = Arc::new(BoundedResolver::new());

        Self {
            config,
            spf: SpfChecker::new(resolver.clone()),
            dkim: DkimChecker::new(resolver.clone()),
            dmarc: DmarcChecker::new(resolver),
            reverse_dns: ReverseDnsChecker::new(dns),
            metrics,
        }
    }

    /// Run the enabled checks for one message.
    ///
    /// `inbox_auth_enabled` is the effective per-inbox toggle of the
    /// primary recipient.
    pub async fn run(&self, input: AuthInput<'_>, inbox_auth_enabled: bool) -> AuthVerdicts {
        if !self.config.enabled || !inbox_auth_enabled {
            let verdicts = AuthVerdicts::skipped();
            info!(
                session_id = input.session_id,
                summary = %verdicts.summary(),
                "email authentication skipped"
            );
            return verdicts;
        }

        let sender = input.mail_from.unwrap_or_default();
        let sender_domain = input.mail_from.and_then(domain_of);
        let helo = input.client_hostname.unwrap_or_default();

        let (spf_verdict, spf_output) = if self.config.spf {
            self.spf
                .check(
                    sender_domain.as_deref(),
                    input.remote_ip,
                    sender,
                    helo,
                    input.session_id,
                )
                .await
        } else {
            (SpfVerdict::skipped(), None)
        };

        let message = AuthenticatedMessage::parse(input.raw);

        let (dkim_verdicts, dkim_outputs) = match (&message, self.config.dkim) {
            (Some(message), true) => self.dkim.check(message, input.session_id).await,
            (None, true) => (
                vec![DkimSignatureVerdict::none(
                    "Failed to parse message for DKIM verification",
                )],
                Vec::new(),
            ),
            (_, false) => (vec![DkimSignatureVerdict::skipped()], Vec::new()),
        };

        let dmarc_verdict = match (&message, self.config.dmarc) {
            (Some(message), true) => {
                self.dmarc
                    .check(
                        message,
                        input.headers,
                        spf_output.as_ref(),
                        &dkim_outputs,
                        input.session_id,
                    )
                    .await
            }
            (None, true) => DmarcVerdict::unevaluable(),
            (_, false) => DmarcVerdict::skipped(),
        };

        let reverse_dns_verdict = if self.config.reverse_dns {
            self.reverse_dns
                .check(input.remote_ip, input.session_id)
                .await
        } else {
            ReverseDnsVerdict::skipped()
        };

        let verdicts = AuthVerdicts {
            spf: spf_verdict,
            dkim: dkim_verdicts,
            dmarc: dmarc_verdict,
            reverse_dns: reverse_dns_verdict,
        };

        self.record_metrics(&verdicts);
        info!(
            session_id = input.session_id,
            summary = %verdicts.summary(),
            "email authentication complete"
        );

        verdicts
    }

    fn record_metrics(&self, verdicts: &AuthVerdicts) {
        let auth = &self.metrics.auth;
        match verdicts.spf.status {
            SpfStatus::Pass => auth.spf_pass.fetch_add(1, Ordering::Relaxed),
            SpfStatus::Fail => auth.spf_fail.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };

        if verdicts.dkim.iter().any(|v| v.status == DkimStatus::Pass) {
            auth.dkim_pass.fetch_add(1, Ordering::Relaxed);
        } else if verdicts.dkim.iter().any(|v| v.status == DkimStatus::Fail) {
            auth.dkim_fail.fetch_add(1, Ordering::Relaxed);
        }

        match verdicts.dmarc.status {
            DmarcStatus::Pass => auth.dmarc_pass.fetch_add(1, Ordering::Relaxed),
            DmarcStatus::Fail => auth.dmarc_fail.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(config: EmailAuthConfig) -> AuthPipeline {
        AuthPipeline::new(config, Arc::new(GatewayMetrics::new()))
    }

    fn input<'a>(headers: &'a HashMap<String, String>, raw: &'a [u8]) -> AuthInput<'a> {
        AuthInput {
            session_id: "session-1",
            remote_ip: None,
            client_hostname: None,
            mail_from: None,
            raw,
            headers,
        }
    }

    #[tokio::test]
    async fn test_globally_disabled_skips_everything() {
        let config = EmailAuthConfig {
            enabled: false,
            ..EmailAuthConfig::default()
        };
        let headers = HashMap::new();
        let verdicts = pipeline(config).run(input(&headers, b"x"), true).await;
        assert_eq!(verdicts.spf.status, SpfStatus::Skipped);
        assert_eq!(verdicts.dmarc.status, DmarcStatus::Skipped);
        assert_eq!(verdicts.reverse_dns.status, ReverseDnsStatus::Skipped);
    }

    #[tokio::test]
    async fn test_inbox_opt_out_skips_everything() {
        let headers = HashMap::new();
        let verdicts = pipeline(EmailAuthConfig::default())
            .run(input(&headers, b"x"), false)
            .await;
        assert_eq!(verdicts.spf.status, SpfStatus::Skipped);
        assert_eq!(verdicts.dkim[0].status, DkimStatus::Skipped);
    }

    #[tokio::test]
    async fn test_individual_checks_disabled() {
        let config = EmailAuthConfig {
            enabled: true,
            spf: false,
            dkim: false,
            dmarc: false,
            reverse_dns: false,
        };
        let headers = HashMap::new();
        let raw = b"From: s@ex.org\r\n\r\nbody";
        let verdicts = pipeline(config).run(input(&headers, raw), true).await;
        assert_eq!(verdicts.spf.status, SpfStatus::Skipped);
        assert_eq!(verdicts.dkim[0].status, DkimStatus::Skipped);
        assert_eq!(verdicts.dmarc.status, DmarcStatus::Skipped);
        assert_eq!(verdicts.reverse_dns.status, ReverseDnsStatus::Skipped);
    }
}

//! SPF evaluation.

use super::types::{SpfStatus, SpfVerdict};
use crate::utils::dns::DNS_DEADLINE;
use mail_auth::{Resolver, SpfOutput, SpfResult};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub struct SpfChecker {
    resolver: Arc<Resolver>,
}

impl SpfChecker {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }

    /// Evaluate SPF for the envelope sender.
    ///
    /// Returns the normalized verdict plus the evaluator output for DMARC
    /// alignment. Either input missing short-circuits to `none`.
    pub async fn check(
        &self,
        domain: Option<&str>,
        ip: Option<&str>,
        sender: &str,
        helo: &str,
        session_id: &str,
    ) -> (SpfVerdict, Option<SpfOutput>) {
        let parsed_ip = ip.and_then(|ip| ip.parse::<std::net::IpAddr>().ok());
        let (domain, remote_ip) = match (domain, parsed_ip) {
            (Some(domain), Some(remote_ip)) if !domain.is_empty() => (domain, remote_ip),
            _ => {
                debug!(session_id, "SPF inputs incomplete");
                return (
                    SpfVerdict {
                        status: SpfStatus::None,
                        domain: domain.map(str::to_string),
                        ip: ip.map(str::to_string),
                        info: Some("SPF check skipped".to_string()),
                    },
                    None,
                );
            }
        };

        let output = match timeout(
            DNS_DEADLINE,
            self.resolver
                .verify_spf_sender(remote_ip, helo, domain, sender),
        )
        .await
        {
            Ok(output) => output,
            Err(_) => {
                warn!(session_id, domain, "SPF evaluation timed out");
                return (
                    SpfVerdict {
                        status: SpfStatus::TempError,
                        domain: Some(domain.to_string()),
                        ip: Some(remote_ip.to_string()),
                        info: Some("SPF evaluation timed out".to_string()),
                    },
                    None,
                );
            }
        };

        let status = match output.result() {
            SpfResult::Pass => SpfStatus::Pass,
            SpfResult::Fail => SpfStatus::Fail,
            SpfResult::SoftFail => SpfStatus::SoftFail,
            SpfResult::Neutral => SpfStatus::Neutral,
            SpfResult::TempError => SpfStatus::TempError,
            SpfResult::PermError => SpfStatus::PermError,
            SpfResult::None => SpfStatus::None,
        };

        let info = output
            .explanation()
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());

        info!(session_id, domain, %status, "SPF verdict");

        (
            SpfVerdict {
                status,
                domain: Some(domain.to_string()),
                ip: Some(remote_ip.to_string()),
                info: Some(info),
            },
            Some(output),
        )
    }
}

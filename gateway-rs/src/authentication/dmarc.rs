//! DMARC policy evaluation.

use super::types::{DmarcPolicy, DmarcStatus, DmarcVerdict};
use crate::mime::extract_bare_email;
use crate::utils::dns::DNS_DEADLINE;
use crate::utils::domain_of;
use mail_auth::dmarc::Policy;
use mail_auth::{AuthenticatedMessage, DkimOutput, DmarcResult, Resolver, SpfOutput};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{info, warn};

pub struct DmarcChecker {
    resolver: Arc<Resolver>,
}

impl DmarcChecker {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }

    /// Evaluate the DMARC policy of the `From` domain against the SPF and
    /// DKIM outputs. A message without a usable `From` header cannot be
    /// evaluated and fails closed.
    pub async fn check(
        &self,
        message: &AuthenticatedMessage<'_>,
        headers: &HashMap<String, String>,
        spf_output: Option<&SpfOutput>,
        dkim_outputs: &[DkimOutput<'_>],
        session_id: &str,
    ) -> DmarcVerdict {
        let from_domain = match headers
            .get("from")
            .and_then(|value| extract_bare_email(value))
            .and_then(|address| domain_of(&address))
        {
            Some(domain) => domain,
            None => {
                warn!(session_id, "no From domain for DMARC evaluation");
                return DmarcVerdict::unevaluable();
            }
        };

        // A skipped SPF check still allows DMARC to pass through DKIM
        // alignment; the evaluator just sees an SPF result of `none`.
        let default_spf = SpfOutput::default();
        let spf_output = spf_output.unwrap_or(&default_spf);

        let output = match timeout(
            DNS_DEADLINE,
            self.resolver
                .verify_dmarc(message, dkim_outputs, &from_domain, spf_output),
        )
        .await
        {
            Ok(output) => output,
            Err(_) => {
                warn!(session_id, domain = %from_domain, "DMARC evaluation timed out");
                return DmarcVerdict {
                    status: DmarcStatus::None,
                    policy: None,
                    aligned: None,
                    domain: Some(from_domain),
                    info: Some("DMARC evaluation timed out".to_string()),
                };
            }
        };

        let spf_aligned = matches!(output.spf_result(), DmarcResult::Pass);
        let dkim_aligned = matches!(output.dkim_result(), DmarcResult::Pass);
        let aligned = spf_aligned || dkim_aligned;

        let policy = match output.policy() {
            Policy::Unspecified => None,
            Policy::None => Some(DmarcPolicy::None),
            Policy::Quarantine => Some(DmarcPolicy::Quarantine),
            Policy::Reject => Some(DmarcPolicy::Reject),
        };

        // No published record and no alignment evidence: nothing to enforce.
        let no_record = policy.is_none()
            && matches!(output.spf_result(), DmarcResult::None)
            && matches!(output.dkim_result(), DmarcResult::None);

        let (status, info) = if no_record {
            (
                DmarcStatus::None,
                "No DMARC record found".to_string(),
            )
        } else if aligned {
            (DmarcStatus::Pass, "DMARC alignment passed".to_string())
        } else {
            (
                DmarcStatus::Fail,
                format!(
                    "DMARC alignment failed: spf={} dkim={}",
                    output.spf_result(),
                    output.dkim_result()
                ),
            )
        };

        info!(session_id, domain = %from_domain, %status, "DMARC verdict");

        DmarcVerdict {
            status,
            policy,
            aligned: Some(aligned),
            domain: Some(from_domain),
            info: Some(info),
        }
    }
}

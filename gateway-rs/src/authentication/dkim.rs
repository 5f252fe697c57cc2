//! DKIM signature verification.

use super::types::{DkimSignatureVerdict, DkimStatus};
use crate::utils::dns::DNS_DEADLINE;
use mail_auth::common::verify::VerifySignature;
use mail_auth::{AuthenticatedMessage, DkimOutput, DkimResult, Resolver};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{info, warn};

pub struct DkimChecker {
    resolver: Arc<Resolver>,
}

impl DkimChecker {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }

    /// Verify every DKIM-Signature header of the message.
    ///
    /// Returns one verdict per signature (a single `none` verdict when the
    /// message carries no signatures) plus the raw evaluator outputs for
    /// DMARC alignment.
    pub async fn check<'x>(
        &self,
        message: &'x AuthenticatedMessage<'x>,
        session_id: &str,
    ) -> (Vec<DkimSignatureVerdict>, Vec<DkimOutput<'x>>) {
        let outputs = match timeout(DNS_DEADLINE, self.resolver.verify_dkim(message)).await {
            Ok(outputs) => outputs,
            Err(_) => {
                warn!(session_id, "DKIM verification timed out");
                return (
                    vec![DkimSignatureVerdict::none("DKIM verification timed out")],
                    Vec::new(),
                );
            }
        };

        if outputs.is_empty() {
            return (
                vec![DkimSignatureVerdict::none(
                    "No DKIM signatures found in email",
                )],
                outputs,
            );
        }

        let verdicts = outputs
            .iter()
            .map(|output| {
                let (status, info) = match output.result() {
                    DkimResult::Pass => (DkimStatus::Pass, "DKIM signature valid".to_string()),
                    DkimResult::Fail(err) => {
                        (DkimStatus::Fail, format!("DKIM signature invalid: {}", err))
                    }
                    DkimResult::Neutral(err) => {
                        (DkimStatus::None, format!("DKIM verification neutral: {}", err))
                    }
                    DkimResult::TempError(err) => (
                        DkimStatus::None,
                        format!("Temporary error during DKIM verification: {}", err),
                    ),
                    DkimResult::PermError(err) => (
                        DkimStatus::None,
                        format!("Permanent error in DKIM signature: {}", err),
                    ),
                    DkimResult::None => {
                        (DkimStatus::None, "No DKIM signature present".to_string())
                    }
                };

                let domain = output.signature().map(|sig| sig.domain().to_string());
                let selector = output.signature().map(|sig| sig.selector().to_string());

                info!(
                    session_id,
                    %status,
                    domain = domain.as_deref().unwrap_or(""),
                    "DKIM verdict"
                );

                DkimSignatureVerdict {
                    status,
                    domain,
                    selector,
                    info: Some(info),
                }
            })
            .collect();

        (verdicts, outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> DkimChecker {
        let resolver = Resolver::new_system_conf()
            .unwrap_or_else(|_| Resolver::new_cloudflare_tls().expect("resolver"));
        DkimChecker::new(Arc::new(resolver))
    }

    #[tokio::test]
    async fn test_unsigned_message_yields_single_none() {
        let raw = b"From: s@ex.org\r\nTo: u@example.com\r\nSubject: x\r\n\r\nbody";
        let message = AuthenticatedMessage::parse(raw).unwrap();
        let (verdicts, outputs) = checker().check(&message, "session-1").await;

        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].status, DkimStatus::None);
        assert_eq!(
            verdicts[0].info.as_deref(),
            Some("No DKIM signatures found in email")
        );
        assert!(outputs.is_empty());
    }
}

//! Forward-confirmed reverse DNS.

use super::types::{ReverseDnsStatus, ReverseDnsVerdict};
use crate::utils::dns::{BoundedResolver, DnsError};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ReverseDnsChecker {
    dns: Arc<BoundedResolver>,
}

impl ReverseDnsChecker {
    pub fn new(dns: Arc<BoundedResolver>) -> Self {
        Self { dns }
    }

    /// Resolve the client's PTR records and confirm one of them points
    /// back at the client address.
    pub async fn check(&self, ip: Option<&str>, session_id: &str) -> ReverseDnsVerdict {
        let raw_ip = match ip {
            Some(ip) if !ip.is_empty() => ip,
            _ => {
                return ReverseDnsVerdict {
                    status: ReverseDnsStatus::None,
                    ip: None,
                    hostname: None,
                    info: Some("Reverse DNS check skipped".to_string()),
                };
            }
        };

        let parsed: IpAddr = match raw_ip.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                return ReverseDnsVerdict {
                    status: ReverseDnsStatus::Fail,
                    ip: Some(raw_ip.to_string()),
                    hostname: None,
                    info: Some(format!("Unparseable client address: {}", raw_ip)),
                };
            }
        };

        let hostnames = match self.dns.reverse_ptr(parsed).await {
            Ok(hostnames) => hostnames,
            Err(DnsError::NoRecords) => {
                info!(session_id, ip = raw_ip, "no PTR record");
                return ReverseDnsVerdict {
                    status: ReverseDnsStatus::Fail,
                    ip: Some(raw_ip.to_string()),
                    hostname: None,
                    info: Some("No PTR record found".to_string()),
                };
            }
            Err(err) => {
                warn!(session_id, ip = raw_ip, error = %err, "reverse lookup failed");
                return ReverseDnsVerdict {
                    status: ReverseDnsStatus::Fail,
                    ip: Some(raw_ip.to_string()),
                    hostname: None,
                    info: Some(format!("Reverse lookup failed: {}", err)),
                };
            }
        };

        // Forward-confirm each hostname; a broken hostname does not abort
        // the loop.
        for hostname in &hostnames {
            match self.dns.forward_ips(hostname).await {
                Ok(addresses) if addresses.contains(&parsed) => {
                    info!(session_id, ip = raw_ip, hostname, "reverse DNS verified");
                    return ReverseDnsVerdict {
                        status: ReverseDnsStatus::Pass,
                        ip: Some(raw_ip.to_string()),
                        hostname: Some(hostname.clone()),
                        info: None,
                    };
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(session_id, hostname, error = %err, "forward confirmation failed");
                }
            }
        }

        ReverseDnsVerdict {
            status: ReverseDnsStatus::Fail,
            ip: Some(raw_ip.to_string()),
            hostname: hostnames.first().cloned(),
            info: Some("No PTR hostname resolved back to the client address".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> ReverseDnsChecker {
        ReverseDnsChecker::new(Arc::new(BoundedResolver::new()))
    }

    #[tokio::test]
    async fn test_absent_ip_is_skipped() {
        let verdict = checker().check(None, "session-1").await;
        assert_eq!(verdict.status, ReverseDnsStatus::None);
        assert_eq!(verdict.info.as_deref(), Some("Reverse DNS check skipped"));
    }

    #[tokio::test]
    async fn test_unparseable_ip_fails() {
        let verdict = checker().check(Some("not-an-ip"), "session-1").await;
        assert_eq!(verdict.status, ReverseDnsStatus::Fail);
    }
}

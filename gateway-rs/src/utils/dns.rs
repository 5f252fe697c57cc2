//! Bounded-time DNS lookups.
//!
//! Every resolver call is capped at five seconds so a slow or broken DNS
//! path can never stall an SMTP session past its own timeouts. Callers map
//! [`DnsError`] into the verdict vocabulary of their check.

use std::net::IpAddr;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::TokioAsyncResolver;

/// Per-call deadline for all DNS operations.
pub const DNS_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    /// The deadline elapsed before the resolver answered.
    Timeout,
    /// The name exists but has no records of the requested type, or does
    /// not exist at all.
    NoRecords,
    Other(String),
}

impl std::fmt::Display for DnsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DnsError::Timeout => write!(f, "DNS lookup timed out"),
            DnsError::NoRecords => write!(f, "no records found"),
            DnsError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

pub struct BoundedResolver {
    resolver: TokioAsyncResolver,
    deadline: Duration,
}

impl BoundedResolver {
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(
                ResolverConfig::default(),
                ResolverOpts::default(),
            ),
            deadline: DNS_DEADLINE,
        }
    }

    /// PTR lookup for `ip`, yielding hostnames without the trailing dot.
    pub async fn reverse_ptr(&self, ip: IpAddr) -> Result<Vec<String>, DnsError> {
        let lookup = timeout(self.deadline, self.resolver.reverse_lookup(ip))
            .await
            .map_err(|_| DnsError::Timeout)?
            .map_err(map_resolve_error)?;

        let hostnames: Vec<String> = lookup
            .iter()
            .map(|ptr| ptr.to_string().trim_end_matches('.').to_string())
            .collect();

        debug!(ip = %ip, count = hostnames.len(), "reverse lookup");

        if hostnames.is_empty() {
            return Err(DnsError::NoRecords);
        }
        Ok(hostnames)
    }

    /// A/AAAA lookup for `host`.
    pub async fn forward_ips(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        let lookup = timeout(self.deadline, self.resolver.lookup_ip(host))
            .await
            .map_err(|_| DnsError::Timeout)?
            .map_err(map_resolve_error)?;

        Ok(lookup.iter().collect())
    }
}

impl Default for BoundedResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn map_resolve_error(e: trust_dns_resolver::error::ResolveError) -> DnsError {
    match e.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => DnsError::NoRecords,
        ResolveErrorKind::Timeout => DnsError::Timeout,
        _ => DnsError::Other(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_error_display() {
        assert_eq!(DnsError::Timeout.to_string(), "DNS lookup timed out");
        assert_eq!(DnsError::NoRecords.to_string(), "no records found");
        assert_eq!(
            DnsError::Other("boom".to_string()).to_string(),
            "boom"
        );
    }
}

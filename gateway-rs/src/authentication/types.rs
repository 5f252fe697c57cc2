use serde::Serialize;

/// SPF evaluation status per RFC 7208, plus the gateway's `skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpfStatus {
    Pass,
    Fail,
    SoftFail,
    Neutral,
    None,
    TempError,
    PermError,
    Skipped,
}

impl std::fmt::Display for SpfStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SpfStatus::Pass => "pass",
            SpfStatus::Fail => "fail",
            SpfStatus::SoftFail => "softfail",
            SpfStatus::Neutral => "neutral",
            SpfStatus::None => "none",
            SpfStatus::TempError => "temperror",
            SpfStatus::PermError => "permerror",
            SpfStatus::Skipped => "skipped",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpfVerdict {
    pub status: SpfStatus,
    pub domain: Option<String>,
    pub ip: Option<String>,
    pub info: Option<String>,
}

impl SpfVerdict {
    pub fn skipped() -> Self {
        Self {
            status: SpfStatus::Skipped,
            domain: None,
            ip: None,
            info: Some("SPF check skipped".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DkimStatus {
    Pass,
    Fail,
    None,
    Skipped,
}

impl std::fmt::Display for DkimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DkimStatus::Pass => "pass",
            DkimStatus::Fail => "fail",
            DkimStatus::None => "none",
            DkimStatus::Skipped => "skipped",
        };
        write!(f, "{}", label)
    }
}

/// One verdict per DKIM-Signature header.
#[derive(Debug, Clone, Serialize)]
pub struct DkimSignatureVerdict {
    pub status: DkimStatus,
    pub domain: Option<String>,
    pub selector: Option<String>,
    pub info: Option<String>,
}

impl DkimSignatureVerdict {
    pub fn skipped() -> Self {
        Self {
            status: DkimStatus::Skipped,
            domain: None,
            selector: None,
            info: Some("DKIM check skipped".to_string()),
        }
    }

    pub fn none(info: &str) -> Self {
        Self {
            status: DkimStatus::None,
            domain: None,
            selector: None,
            info: Some(info.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DmarcStatus {
    Pass,
    Fail,
    None,
    Skipped,
}

impl std::fmt::Display for DmarcStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DmarcStatus::Pass => "pass",
            DmarcStatus::Fail => "fail",
            DmarcStatus::None => "none",
            DmarcStatus::Skipped => "skipped",
        };
        write!(f, "{}", label)
    }
}

/// Published DMARC disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DmarcPolicy {
    None,
    Quarantine,
    Reject,
}

impl std::fmt::Display for DmarcPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DmarcPolicy::None => "none",
            DmarcPolicy::Quarantine => "quarantine",
            DmarcPolicy::Reject => "reject",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DmarcVerdict {
    pub status: DmarcStatus,
    pub policy: Option<DmarcPolicy>,
    pub aligned: Option<bool>,
    pub domain: Option<String>,
    pub info: Option<String>,
}

impl DmarcVerdict {
    pub fn skipped() -> Self {
        Self {
            status: DmarcStatus::Skipped,
            policy: None,
            aligned: None,
            domain: None,
            info: Some("DMARC check skipped".to_string()),
        }
    }

    pub fn unevaluable() -> Self {
        Self {
            status: DmarcStatus::Fail,
            policy: None,
            aligned: None,
            domain: None,
            info: Some("Unable to evaluate DMARC policy".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReverseDnsStatus {
    Pass,
    Fail,
    None,
    Skipped,
}

impl std::fmt::Display for ReverseDnsStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReverseDnsStatus::Pass => "pass",
            ReverseDnsStatus::Fail => "fail",
            ReverseDnsStatus::None => "none",
            ReverseDnsStatus::Skipped => "skipped",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReverseDnsVerdict {
    pub status: ReverseDnsStatus,
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub info: Option<String>,
}

impl ReverseDnsVerdict {
    pub fn skipped() -> Self {
        Self {
            status: ReverseDnsStatus::Skipped,
            ip: None,
            hostname: None,
            info: Some("Reverse DNS check skipped".to_string()),
        }
    }
}

/// The combined result of the authentication pipeline, recorded on every
/// stored message and surfaced through events.
#[derive(Debug, Clone, Serialize)]
pub struct AuthVerdicts {
    pub spf: SpfVerdict,
    pub dkim: Vec<DkimSignatureVerdict>,
    pub dmarc: DmarcVerdict,
    pub reverse_dns: ReverseDnsVerdict,
}

impl AuthVerdicts {
    /// All checks skipped, either globally or for this inbox.
    pub fn skipped() -> Self {
        Self {
            spf: SpfVerdict::skipped(),
            dkim: vec![DkimSignatureVerdict::skipped()],
            dmarc: DmarcVerdict::skipped(),
            reverse_dns: ReverseDnsVerdict::skipped(),
        }
    }

    /// One-line summary for the per-session log record.
    pub fn summary(&self) -> String {
        let dkim = self
            .dkim
            .iter()
            .map(|verdict| verdict.status.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "spf={} dkim={} dmarc={} rdns={}",
            self.spf.status, dkim, self.dmarc.status, self.reverse_dns.status
        )
    }
}

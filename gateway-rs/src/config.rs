use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub main: MainConfig,
    pub smtp: SmtpConfig,
    pub smtp_rate_limit: RateLimitConfig,
    pub email_auth: EmailAuthConfig,
    pub spam_analysis: SpamAnalysisConfig,
    pub local: LocalConfig,
    pub certificate: CertificateConfig,
    pub chaos: ChaosSettings,
    pub logging: LoggingConfig,
}

/// Gateway operating mode. Backend mode exists in the configuration surface
/// but is not supported by this build and is refused at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    Local,
    Backend,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MainConfig {
    pub gateway_mode: GatewayMode,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            gateway_mode: GatewayMode::Local,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS on the listening socket (as opposed to STARTTLS).
    pub secure: bool,
    pub max_message_size: usize,
    pub max_header_size: usize,
    pub session_timeout_ms: u64,
    pub allowed_recipient_domains: Vec<String>,
    pub max_connections: usize,
    pub close_timeout_ms: u64,
    pub disabled_commands: Vec<String>,
    pub disable_pipelining: bool,
    pub early_talker_delay_ms: u64,
    pub banner: Option<String>,
    /// Global in-memory budget for stored mail. Fractional so tiny test
    /// budgets are expressible.
    pub max_memory_mb: f64,
    /// 0 disables the age sweep.
    pub max_email_age_seconds: u64,
    pub tls: TlsSettings,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2525,
            secure: false,
            max_message_size: 10 * 1024 * 1024,
            max_header_size: 64 * 1024,
            session_timeout_ms: 300_000,
            allowed_recipient_domains: Vec::new(),
            max_connections: 100,
            close_timeout_ms: 5_000,
            disabled_commands: vec![
                "VRFY".to_string(),
                "EXPN".to_string(),
                "ETRN".to_string(),
                "TURN".to_string(),
            ],
            disable_pipelining: false,
            early_talker_delay_ms: 0,
            banner: None,
            max_memory_mb: 256.0,
            max_email_age_seconds: 0,
            tls: TlsSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsSettings {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
    /// "1.2" or "1.3". Defaults to 1.2 with a warning when TLS is enabled
    /// without an explicit minimum.
    pub min_version: Option<String>,
    pub ciphers: Option<String>,
    pub honor_cipher_order: bool,
    pub ecdh_curve: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub points: u32,
    /// Window length in seconds.
    pub duration: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            points: 100,
            duration: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmailAuthConfig {
    pub enabled: bool,
    pub spf: bool,
    pub dkim: bool,
    pub dmarc: bool,
    pub reverse_dns: bool,
}

impl Default for EmailAuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            spf: true,
            dkim: true,
            dmarc: true,
            reverse_dns: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpamAnalysisConfig {
    pub enabled: bool,
    pub rspamd: RspamdConfig,
    /// Default per-inbox toggle when the inbox record carries none.
    pub inbox_default: bool,
}

impl Default for SpamAnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rspamd: RspamdConfig::default(),
            inbox_default: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RspamdConfig {
    pub url: String,
    pub timeout_ms: u64,
    pub password: Option<String>,
}

impl Default for RspamdConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:11333".to_string(),
            timeout_ms: 5_000,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalConfig {
    /// SMTP code used to reject MAIL FROM while no inboxes exist.
    /// 0 disables hard mode.
    pub hard_mode_reject_code: u16,
    /// Plain inboxes the dev binary seeds into the in-memory registry.
    pub inboxes: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CertificateConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChaosSettings {
    pub enabled: bool,
    /// Greylist window: retries inside it are rejected again.
    pub greylist_delay_seconds: u64,
}

impl Default for ChaosSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            greylist_delay_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Hard-mode rejections must use a code SMTP clients treat as final or
/// retryable rejection of the transaction.
const HARD_MODE_CODES: [u16; 5] = [421, 450, 451, 550, 554];

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| GatewayError::Config(format!("cannot read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| GatewayError::Config(format!("invalid config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Startup validation. Called once; later code trusts the result.
    pub fn validate(&self) -> Result<()> {
        if self.main.gateway_mode == GatewayMode::Backend {
            return Err(GatewayError::Config(
                "backend gateway mode is not supported by this build".to_string(),
            ));
        }

        if self.local.hard_mode_reject_code != 0
            && !HARD_MODE_CODES.contains(&self.local.hard_mode_reject_code)
        {
            return Err(GatewayError::Config(format!(
                "hard_mode_reject_code must be one of {:?}, got {}",
                HARD_MODE_CODES, self.local.hard_mode_reject_code
            )));
        }

        if self.smtp.max_memory_mb <= 0.0 {
            return Err(GatewayError::Config(
                "smtp.max_memory_mb must be positive".to_string(),
            ));
        }

        if self.tls_enabled() && self.smtp.tls.min_version.is_none() {
            warn!("TLS enabled without smtp.tls.min_version, defaulting to TLS 1.2");
        }

        if let Some(min) = &self.smtp.tls.min_version {
            if min != "1.2" && min != "1.3" {
                return Err(GatewayError::Config(format!(
                    "smtp.tls.min_version must be \"1.2\" or \"1.3\", got {:?}",
                    min
                )));
            }
        }

        Ok(())
    }

    /// Whether any TLS material is configured (implicit TLS or STARTTLS).
    pub fn tls_enabled(&self) -> bool {
        self.certificate.enabled
            || (self.smtp.tls.cert_path.is_some() && self.smtp.tls.key_path.is_some())
    }

    /// The global memory budget in bytes.
    pub fn max_memory_bytes(&self) -> u64 {
        (self.smtp.max_memory_mb * 1024.0 * 1024.0) as u64
    }

    /// The age budget in milliseconds; 0 disables the sweep.
    pub fn max_email_age_ms(&self) -> u64 {
        self.smtp.max_email_age_seconds * 1000
    }
}

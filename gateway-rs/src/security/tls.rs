//! TLS for the SMTP listener.
//!
//! Supports implicit TLS and STARTTLS upgrades. Certificate material comes
//! from PEM files or the certificate collaborator; the negotiated
//! parameters of each handshake are kept in a session-scoped cache until
//! the Received header is assembled.

use crate::error::{GatewayError, Result};
use rustls::ServerConfig;
use rustls_pemfile::{certs, pkcs8_private_keys, rsa_private_keys};
use std::collections::HashMap;
use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Minimum accepted protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinTlsVersion {
    V1_2,
    V1_3,
}

impl MinTlsVersion {
    /// Parse the config string, defaulting to 1.2 (with a warning emitted
    /// by config validation when the field is absent).
    pub fn from_config(min_version: Option<&str>) -> Self {
        match min_version {
            Some("1.3") => MinTlsVersion::V1_3,
            Some("1.2") | None => MinTlsVersion::V1_2,
            Some(other) => {
                warn!(min_version = other, "unknown TLS minimum version, using 1.2");
                MinTlsVersion::V1_2
            }
        }
    }

    fn protocol_versions(self) -> &'static [&'static rustls::SupportedProtocolVersion] {
        static V1_2_VERSIONS: [&rustls::SupportedProtocolVersion; 2] =
            [&rustls::version::TLS13, &rustls::version::TLS12];
        static V1_3_VERSIONS: [&rustls::SupportedProtocolVersion; 1] = [&rustls::version::TLS13];
        match self {
            MinTlsVersion::V1_2 => &V1_2_VERSIONS,
            MinTlsVersion::V1_3 => &V1_3_VERSIONS,
        }
    }
}

/// Negotiated handshake parameters captured for the Received header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsInfo {
    pub version: String,
    pub cipher: String,
    pub bits: Option<u32>,
}

impl TlsInfo {
    /// Read negotiated parameters off a completed server-side handshake.
    pub fn from_connection(conn: &rustls::ServerConnection) -> Option<Self> {
        let version = match conn.protocol_version()? {
            rustls::ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
            rustls::ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
            other => format!("{:?}", other),
        };

        let cipher = format!("{:?}", conn.negotiated_cipher_suite()?.suite());
        let bits = if cipher.contains("256") {
            Some(256)
        } else if cipher.contains("128") {
            Some(128)
        } else {
            None
        };

        Some(Self {
            version,
            cipher,
            bits,
        })
    }
}

/// TLS server configuration.
#[derive(Clone)]
pub struct TlsConfig {
    server_config: Arc<ServerConfig>,
}

impl TlsConfig {
    /// Build from PEM certificate and key files.
    pub fn from_pem_files<P: AsRef<Path>>(
        cert_path: P,
        key_path: P,
        min_version: MinTlsVersion,
    ) -> Result<Self> {
        info!("Loading TLS certificate from {:?}", cert_path.as_ref());
        let cert_pem = std::fs::read(cert_path.as_ref())
            .map_err(|e| GatewayError::Tls(format!("Failed to read certificate file: {}", e)))?;
        let key_pem = std::fs::read(key_path.as_ref())
            .map_err(|e| GatewayError::Tls(format!("Failed to read key file: {}", e)))?;
        Self::from_pem(&cert_pem, &key_pem, min_version)
    }

    /// Build from in-memory PEM material, as handed over by the
    /// certificate collaborator on `certificate.reloaded`.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8], min_version: MinTlsVersion) -> Result<Self> {
        let mut cert_reader = BufReader::new(Cursor::new(cert_pem));
        let certs = certs(&mut cert_reader)
            .map_err(|e| GatewayError::Tls(format!("Failed to read certificates: {}", e)))?;
        if certs.is_empty() {
            return Err(GatewayError::Tls("No certificates found".to_string()));
        }
        debug!("Loaded {} certificate(s)", certs.len());

        let mut key_reader = BufReader::new(Cursor::new(key_pem));
        let mut keys = pkcs8_private_keys(&mut key_reader)
            .map_err(|e| GatewayError::Tls(format!("Failed to read private keys: {}", e)))?;
        if keys.is_empty() {
            let mut key_reader = BufReader::new(Cursor::new(key_pem));
            keys = rsa_private_keys(&mut key_reader)
                .map_err(|e| GatewayError::Tls(format!("Failed to read private keys: {}", e)))?;
        }
        if keys.is_empty() {
            return Err(GatewayError::Tls("No private key found".to_string()));
        }
        let private_key = keys.remove(0);

        let config = ServerConfig::builder()
            .with_safe_default_cipher_suites()
            .with_safe_default_kx_groups()
            .with_protocol_versions(min_version.protocol_versions())
            .map_err(|e| GatewayError::Tls(format!("Unsupported protocol versions: {}", e)))?
            .with_no_client_auth()
            .with_single_cert(
                certs.into_iter().map(rustls::Certificate).collect(),
                rustls::PrivateKey(private_key),
            )
            .map_err(|e| GatewayError::Tls(format!("Failed to create TLS config: {}", e)))?;

        info!("TLS configuration created");

        Ok(Self {
            server_config: Arc::new(config),
        })
    }

    pub fn acceptor(&self) -> tokio_rustls::TlsAcceptor {
        tokio_rustls::TlsAcceptor::from(self.server_config.clone())
    }
}

/// Session cache entries older than this are leaked sessions; the sweep
/// evicts them.
const TLS_INFO_MAX_AGE: Duration = Duration::from_secs(300);

/// Handshake parameters keyed by session id. Entered on
/// handshake-complete, consumed when the Received header is built, removed
/// on session close, and swept every minute as a leak guard.
#[derive(Default)]
pub struct TlsInfoCache {
    entries: RwLock<HashMap<String, (TlsInfo, Instant)>>,
}

impl TlsInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session_id: &str, info: TlsInfo) {
        let mut entries = self.entries.write().await;
        entries.insert(session_id.to_string(), (info, Instant::now()));
    }

    pub async fn get(&self, session_id: &str) -> Option<TlsInfo> {
        let entries = self.entries.read().await;
        entries.get(session_id).map(|(info, _)| info.clone())
    }

    pub async fn remove(&self, session_id: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(session_id);
    }

    /// Evict entries older than five minutes. Returns the eviction count.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, (_, inserted)| now.duration_since(*inserted) < TLS_INFO_MAX_AGE);
        let evicted = before - entries.len();
        if evicted > 0 {
            warn!(evicted, "evicted stale TLS session info entries");
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_version_parsing() {
        assert_eq!(MinTlsVersion::from_config(None), MinTlsVersion::V1_2);
        assert_eq!(MinTlsVersion::from_config(Some("1.2")), MinTlsVersion::V1_2);
        assert_eq!(MinTlsVersion::from_config(Some("1.3")), MinTlsVersion::V1_3);
        assert_eq!(MinTlsVersion::from_config(Some("tls9")), MinTlsVersion::V1_2);
    }

    #[test]
    fn test_from_pem_rejects_garbage() {
        let result = TlsConfig::from_pem(b"not a pem", b"not a key", MinTlsVersion::V1_2);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_tls_info_cache_roundtrip() {
        let cache = TlsInfoCache::new();
        let info = TlsInfo {
            version: "TLSv1.3".to_string(),
            cipher: "TLS13_AES_256_GCM_SHA384".to_string(),
            bits: Some(256),
        };

        cache.insert("session-1", info.clone()).await;
        assert_eq!(cache.get("session-1").await, Some(info));

        cache.remove("session-1").await;
        assert_eq!(cache.get("session-1").await, None);
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_entries() {
        let cache = TlsInfoCache::new();
        cache
            .insert(
                "session-1",
                TlsInfo {
                    version: "TLSv1.2".to_string(),
                    cipher: "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256".to_string(),
                    bits: Some(128),
                },
            )
            .await;

        assert_eq!(cache.sweep().await, 0);
        assert_eq!(cache.len().await, 1);
    }
}

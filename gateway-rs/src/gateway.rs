//! Gateway assembly.
//!
//! Local mode wires every collaborator up front, so the rest of the code
//! never has to ask whether a service exists. Backend mode is refused by
//! configuration validation before anything is constructed.

use crate::authentication::AuthPipeline;
use crate::chaos::ChaosEngine;
use crate::config::Config;
use crate::delivery::DeliveryOrchestrator;
use crate::error::Result;
use crate::events::EventBus;
use crate::inbox::{CertificateProvider, ClientCrypto, InboxRegistry};
use crate::metrics::{GatewayMetrics, MetricsSnapshot};
use crate::security::tls::MinTlsVersion;
use crate::security::{RateLimiter, TlsConfig, TlsInfoCache};
use crate::smtp::SmtpServer;
use crate::spam::SpamScanner;
use crate::store::EmailStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

pub struct Gateway {
    pub config: Arc<Config>,
    pub metrics: Arc<GatewayMetrics>,
    pub store: Arc<EmailStore>,
    pub events: EventBus,
    pub server: SmtpServer,
}

impl Gateway {
    /// Assemble the gateway in local mode.
    pub fn new(
        config: Config,
        registry: Arc<dyn InboxRegistry>,
        crypto: Arc<dyn ClientCrypto>,
        scanner: Option<Arc<dyn SpamScanner>>,
        certificates: Option<Arc<dyn CertificateProvider>>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let metrics = Arc::new(GatewayMetrics::new());
        let events = EventBus::default();
        let tls_cache = Arc::new(TlsInfoCache::new());

        let store = Arc::new(EmailStore::new(
            config.max_memory_bytes(),
            config.max_email_age_ms(),
            registry.clone(),
        ));

        let chaos = Arc::new(ChaosEngine::new(
            config.chaos.enabled,
            Duration::from_secs(config.chaos.greylist_delay_seconds),
            metrics.clone(),
        ));

        let auth = Arc::new(AuthPipeline::new(config.email_auth.clone(), metrics.clone()));

        let min_version = MinTlsVersion::from_config(config.smtp.tls.min_version.as_deref());
        let tls_config = if config.certificate.enabled {
            match certificates.as_ref().and_then(|provider| provider.get_current_certificate()) {
                Some(material) => Some(TlsConfig::from_pem(
                    &material.certificate,
                    &material.private_key,
                    min_version,
                )?),
                None => {
                    info!("certificate collaborator has no material yet, starting without TLS");
                    None
                }
            }
        } else {
            match (&config.smtp.tls.cert_path, &config.smtp.tls.key_path) {
                (Some(cert_path), Some(key_path)) => {
                    Some(TlsConfig::from_pem_files(cert_path, key_path, min_version)?)
                }
                _ => None,
            }
        };

        let server_hostname = gethostname::gethostname().to_string_lossy().to_string();

        let orchestrator = Arc::new(DeliveryOrchestrator::new(
            config.clone(),
            registry.clone(),
            crypto,
            store.clone(),
            chaos,
            auth,
            scanner,
            events.clone(),
            metrics.clone(),
            tls_cache.clone(),
            server_hostname.clone(),
        ));

        let rate_limiter = Arc::new(RateLimiter::new(&config.smtp_rate_limit));

        let server = SmtpServer::new(
            config.clone(),
            registry,
            metrics.clone(),
            rate_limiter,
            orchestrator,
            tls_config,
            tls_cache,
            server_hostname,
        );

        Ok(Self {
            config,
            metrics,
            store,
            events,
            server,
        })
    }

    /// Run the listener and the periodic sweeps until shutdown.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let sweeps = self.store.spawn_sweeps(shutdown.clone());
        let outcome = self.server.run(shutdown).await;
        sweeps.abort();
        outcome
    }

    /// Point-in-time metrics for the external metrics endpoint.
    pub async fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.store.metrics().await)
    }
}

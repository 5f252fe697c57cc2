//! SMTP listener and accept loop.

use crate::config::Config;
use crate::delivery::DeliveryOrchestrator;
use crate::error::{GatewayError, Result};
use crate::inbox::InboxRegistry;
use crate::metrics::GatewayMetrics;
use crate::security::{RateLimiter, TlsConfig, TlsInfoCache};
use crate::smtp::session::SmtpSession;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

/// Cadence of the TLS session-info leak sweep.
const TLS_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct SmtpServer {
    config: Arc<Config>,
    registry: Arc<dyn InboxRegistry>,
    metrics: Arc<GatewayMetrics>,
    rate_limiter: Arc<RateLimiter>,
    orchestrator: Arc<DeliveryOrchestrator>,
    tls_config: Option<TlsConfig>,
    tls_cache: Arc<TlsInfoCache>,
    server_hostname: String,
    connection_slots: Arc<Semaphore>,
}

impl SmtpServer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        registry: Arc<dyn InboxRegistry>,
        metrics: Arc<GatewayMetrics>,
        rate_limiter: Arc<RateLimiter>,
        orchestrator: Arc<DeliveryOrchestrator>,
        tls_config: Option<TlsConfig>,
        tls_cache: Arc<TlsInfoCache>,
        server_hostname: String,
    ) -> Self {
        let connection_slots = Arc::new(Semaphore::new(config.smtp.max_connections.max(1)));
        Self {
            config,
            registry,
            metrics,
            rate_limiter,
            orchestrator,
            tls_config,
            tls_cache,
            server_hostname,
            connection_slots,
        }
    }

    /// Bind the configured address. Split from [`run_with_listener`] so
    /// tests can bind an ephemeral port first.
    pub async fn bind(&self) -> Result<TcpListener> {
        let address = format!("{}:{}", self.config.smtp.host, self.config.smtp.port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| GatewayError::Config(format!("cannot bind {}: {}", address, e)))?;
        info!(
            address,
            secure = self.config.smtp.secure,
            "SMTP server listening"
        );
        Ok(listener)
    }

    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener = self.bind().await?;
        self.run_with_listener(listener, shutdown).await
    }

    pub async fn run_with_listener(
        &self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        if self.tls_config.is_some() {
            info!("TLS material loaded (STARTTLS offered)");
        }

        let sweeper = self.spawn_tls_sweeper(shutdown.clone());

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((socket, address)) => self.dispatch(socket, address).await,
                        Err(e) => error!(error = %e, "failed to accept connection"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("SMTP server shutting down");
                        break;
                    }
                }
            }
        }

        sweeper.abort();

        // Give in-flight sessions a bounded window to finish.
        let close_timeout = Duration::from_millis(self.config.smtp.close_timeout_ms.max(1));
        let slots = self.connection_slots.clone();
        let all = self.config.smtp.max_connections.max(1) as u32;
        if tokio::time::timeout(close_timeout, slots.acquire_many(all))
            .await
            .is_err()
        {
            warn!("close timeout elapsed with sessions still active");
        }

        Ok(())
    }

    async fn dispatch(&self, socket: tokio::net::TcpStream, address: std::net::SocketAddr) {
        debug!(%address, "new connection");

        let Ok(permit) = self.connection_slots.clone().try_acquire_owned() else {
            self.metrics.connection_rejected();
            warn!(%address, "connection limit reached");
            let mut socket = socket;
            tokio::spawn(async move {
                let _ = socket
                    .write_all(b"421 4.3.2 Too many connections, try again later\r\n")
                    .await;
            });
            return;
        };

        let session = SmtpSession::new(
            self.config.clone(),
            self.registry.clone(),
            self.metrics.clone(),
            self.rate_limiter.clone(),
            self.orchestrator.clone(),
            self.tls_config.clone(),
            self.tls_cache.clone(),
            self.server_hostname.clone(),
        );

        tokio::spawn(async move {
            if let Err(e) = session.handle(socket).await {
                debug!(error = %e, "session ended with error");
            }
            drop(permit);
        });
    }

    fn spawn_tls_sweeper(&self, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let cache = self.tls_cache.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TLS_SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cache.sweep().await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

use anyhow::Context as _;
use async_trait::async_trait;
use clap::Parser;
use gateway_rs::config::Config;
use gateway_rs::error::GatewayError;
use gateway_rs::inbox::{ClientCrypto, EncryptedBlob, InMemoryInboxRegistry, Inbox, InboxRegistry};
use gateway_rs::spam::{RspamdScanner, SpamScanner};
use gateway_rs::utils::inbox_key;
use gateway_rs::Gateway;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gateway-rs", about = "Receive-only SMTP gateway")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

/// Key registration lives in the control plane; the dev binary serves
/// plain inboxes only, so any encrypted delivery is a hard failure.
struct NoClientCrypto;

#[async_trait]
impl ClientCrypto for NoClientCrypto {
    async fn encrypt_for_client(
        &self,
        _client_kem_public_key: &[u8],
        _plaintext: &[u8],
        _aad: &[u8],
    ) -> gateway_rs::Result<EncryptedBlob> {
        Err(GatewayError::Crypto(
            "no client crypto backend configured".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = if args.config.exists() {
        Config::from_file(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?
    } else {
        info!("no config file found, using defaults");
        Config::default()
    };

    init_tracing(&config);
    info!("starting gateway-rs");
    info!(
        "  SMTP listening on {}:{}",
        config.smtp.host, config.smtp.port
    );
    info!(
        "  allowed recipient domains: {:?}",
        config.smtp.allowed_recipient_domains
    );
    info!("  memory budget: {} MB", config.smtp.max_memory_mb);

    let registry = Arc::new(InMemoryInboxRegistry::new());
    for email in &config.local.inboxes {
        let key = inbox_key(email);
        registry.register(Inbox::plain(&key)).await;
        info!(inbox = key, "seeded inbox");
    }

    let scanner: Option<Arc<dyn SpamScanner>> = if config.spam_analysis.enabled {
        info!("  spam analysis via {}", config.spam_analysis.rspamd.url);
        Some(Arc::new(RspamdScanner::new(&config.spam_analysis.rspamd)))
    } else {
        None
    };

    let registry_dyn: Arc<dyn InboxRegistry> = registry;
    let gateway = Gateway::new(config, registry_dyn, Arc::new(NoClientCrypto), scanner, None)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    gateway.run(shutdown_rx).await?;
    info!("gateway stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

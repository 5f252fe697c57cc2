//! gateway-rs: receive-only SMTP gateway with per-inbox encryption.
//!
//! The gateway accepts mail for a fixed set of recipient domains,
//! authenticates senders (SPF/DKIM/DMARC/reverse DNS), optionally scores
//! messages through Rspamd, injects configurable fault behavior, and
//! delivers into a bounded in-memory store with FIFO eviction. Messages
//! for inboxes with a registered client key are encrypted end-to-end;
//! everything else is stored as plain payloads. A restart loses all
//! stored mail by design.
//!
//! # Modules
//!
//! - [`config`]: strongly-typed configuration, loaded once at startup
//! - [`smtp`]: connection lifecycle and the SMTP state machine
//! - [`authentication`]: SPF, DKIM, DMARC and reverse-DNS verdicts
//! - [`chaos`]: per-inbox fault injection and greylisting
//! - [`store`]: the bounded FIFO store and its sweeps
//! - [`delivery`]: payload assembly, encryption fan-out and events
//! - [`inbox`]: collaborator interfaces (registry, crypto, certificates)
//! - [`metrics`]: in-process counters and the snapshot shape

pub mod authentication;
pub mod chaos;
pub mod config;
pub mod delivery;
pub mod error;
pub mod events;
pub mod gateway;
pub mod inbox;
pub mod metrics;
pub mod mime;
pub mod security;
pub mod smtp;
pub mod spam;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{GatewayError, Result};
pub use gateway::Gateway;

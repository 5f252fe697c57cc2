//! In-process metrics.
//!
//! Every counter the gateway tracks is a named field on a closed struct, so
//! a misspelled metric is a compile error rather than a silently-created
//! series. The HTTP metrics endpoint (external to this crate) consumes
//! [`MetricsSnapshot`] via [`GatewayMetrics::snapshot`].

use crate::store::StorageMetrics;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ConnectionCounters {
    pub total: AtomicU64,
    pub active: AtomicU64,
    pub rejected: AtomicU64,
}

#[derive(Debug, Default)]
pub struct RejectionCounters {
    pub invalid_commands: AtomicU64,
    pub sender_rejected: AtomicU64,
    pub recipient_rejected: AtomicU64,
    pub data_size: AtomicU64,
    pub hard_mode: AtomicU64,
    pub rate_limit: AtomicU64,
}

#[derive(Debug, Default)]
pub struct AuthCounters {
    pub spf_pass: AtomicU64,
    pub spf_fail: AtomicU64,
    pub dkim_pass: AtomicU64,
    pub dkim_fail: AtomicU64,
    pub dmarc_pass: AtomicU64,
    pub dmarc_fail: AtomicU64,
}

#[derive(Debug, Default)]
pub struct SpamCounters {
    pub analyzed: AtomicU64,
    pub skipped: AtomicU64,
    pub errors: AtomicU64,
    pub detected: AtomicU64,
    /// Accumulated scan time across all analyzed messages.
    pub processing_time_ms: AtomicU64,
}

#[derive(Debug, Default)]
pub struct ChaosCounters {
    pub events: AtomicU64,
    pub latency_injected_ms: AtomicU64,
    pub errors_returned: AtomicU64,
    pub connections_dropped: AtomicU64,
    pub greylist_rejections: AtomicU64,
    pub blackhole: AtomicU64,
}

/// Shared counter registry. Cheap to clone behind an `Arc`; increments are
/// relaxed atomics and reads return a point-in-time snapshot (small skew
/// across distinct counters is acceptable).
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    pub connections: ConnectionCounters,
    pub rejections: RejectionCounters,
    pub auth: AuthCounters,
    pub spam: SpamCounters,
    pub chaos: ChaosCounters,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections.total.fetch_add(1, Ordering::Relaxed);
        self.connections.active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        // Saturating: a close without a matching open must not wrap.
        let _ = self
            .connections
            .active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn connection_rejected(&self) {
        self.connections.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, storage: StorageMetrics) -> MetricsSnapshot {
        MetricsSnapshot {
            connections: ConnectionSnapshot {
                total: self.connections.total.load(Ordering::Relaxed),
                active: self.connections.active.load(Ordering::Relaxed),
                rejected: self.connections.rejected.load(Ordering::Relaxed),
            },
            rejections: RejectionSnapshot {
                invalid_commands: self.rejections.invalid_commands.load(Ordering::Relaxed),
                sender_rejected: self.rejections.sender_rejected.load(Ordering::Relaxed),
                recipient_rejected: self.rejections.recipient_rejected.load(Ordering::Relaxed),
                data_size: self.rejections.data_size.load(Ordering::Relaxed),
                hard_mode: self.rejections.hard_mode.load(Ordering::Relaxed),
                rate_limit: self.rejections.rate_limit.load(Ordering::Relaxed),
            },
            auth: AuthSnapshot {
                spf_pass: self.auth.spf_pass.load(Ordering::Relaxed),
                spf_fail: self.auth.spf_fail.load(Ordering::Relaxed),
                dkim_pass: self.auth.dkim_pass.load(Ordering::Relaxed),
                dkim_fail: self.auth.dkim_fail.load(Ordering::Relaxed),
                dmarc_pass: self.auth.dmarc_pass.load(Ordering::Relaxed),
                dmarc_fail: self.auth.dmarc_fail.load(Ordering::Relaxed),
            },
            spam: SpamSnapshot {
                analyzed: self.spam.analyzed.load(Ordering::Relaxed),
                skipped: self.spam.skipped.load(Ordering::Relaxed),
                errors: self.spam.errors.load(Ordering::Relaxed),
                detected: self.spam.detected.load(Ordering::Relaxed),
                processing_time_ms: self.spam.processing_time_ms.load(Ordering::Relaxed),
            },
            chaos: ChaosSnapshot {
                events: self.chaos.events.load(Ordering::Relaxed),
                latency_injected_ms: self.chaos.latency_injected_ms.load(Ordering::Relaxed),
                errors_returned: self.chaos.errors_returned.load(Ordering::Relaxed),
                connections_dropped: self.chaos.connections_dropped.load(Ordering::Relaxed),
                greylist_rejections: self.chaos.greylist_rejections.load(Ordering::Relaxed),
                blackhole: self.chaos.blackhole.load(Ordering::Relaxed),
            },
            storage,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub connections: ConnectionSnapshot,
    pub rejections: RejectionSnapshot,
    pub auth: AuthSnapshot,
    pub spam: SpamSnapshot,
    pub chaos: ChaosSnapshot,
    pub storage: StorageMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSnapshot {
    pub total: u64,
    pub active: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectionSnapshot {
    pub invalid_commands: u64,
    pub sender_rejected: u64,
    pub recipient_rejected: u64,
    pub data_size: u64,
    pub hard_mode: u64,
    pub rate_limit: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSnapshot {
    pub spf_pass: u64,
    pub spf_fail: u64,
    pub dkim_pass: u64,
    pub dkim_fail: u64,
    pub dmarc_pass: u64,
    pub dmarc_fail: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpamSnapshot {
    pub analyzed: u64,
    pub skipped: u64,
    pub errors: u64,
    pub detected: u64,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChaosSnapshot {
    pub events: u64,
    pub latency_injected_ms: u64,
    pub errors_returned: u64,
    pub connections_dropped: u64,
    pub greylist_rejections: u64,
    pub blackhole: u64,
}

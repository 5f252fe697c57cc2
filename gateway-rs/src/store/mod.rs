//! Bounded in-memory email store.
//!
//! The store owns the global FIFO index and the memory accounting; the
//! inbox collaborator owns the per-inbox message sequences. Eviction is
//! oldest-first and leaves a tombstone in the index slot until the hourly
//! compaction, so deletion stays O(1) for the hot path.

use crate::error::{GatewayError, Result};
use crate::inbox::{InboxRegistry, StoredMessage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Cadence of the compaction and age sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct IndexEntry {
    message_id: String,
    inbox_key: String,
    size: u64,
    received_at: DateTime<Utc>,
    tombstone: bool,
}

#[derive(Debug, Default)]
struct StoreInner {
    index: VecDeque<IndexEntry>,
    current_memory_usage: u64,
    evicted_count: u64,
}

/// Storage gauges surfaced through the metrics snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageMetrics {
    pub configured_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub utilization_percent: f64,
    pub total_stored: u64,
    pub total_evicted: u64,
    pub tombstones: u64,
    pub oldest_age_ms: Option<u64>,
    pub newest_age_ms: Option<u64>,
    pub max_age_ms: u64,
}

pub struct EmailStore {
    max_memory_bytes: u64,
    max_age_ms: u64,
    registry: Arc<dyn InboxRegistry>,
    inner: Mutex<StoreInner>,
}

impl EmailStore {
    pub fn new(max_memory_bytes: u64, max_age_ms: u64, registry: Arc<dyn InboxRegistry>) -> Self {
        Self {
            max_memory_bytes,
            max_age_ms,
            registry,
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// Store a message for an inbox, evicting oldest-first until the
    /// global budget holds.
    pub async fn store(&self, inbox_key: &str, message: StoredMessage) -> Result<()> {
        let size = message.size_bytes();
        if size > self.max_memory_bytes {
            warn!(
                inbox = inbox_key,
                size,
                budget = self.max_memory_bytes,
                "message larger than the whole memory budget"
            );
            return Err(GatewayError::SizeExceeded {
                limit: self.max_memory_bytes as usize,
            });
        }

        let message_id = message.id().to_string();
        let mut inner = self.inner.lock().await;

        while inner.current_memory_usage + size > self.max_memory_bytes {
            let Some(position) = inner.index.iter().position(|entry| !entry.tombstone) else {
                // Accounting says we are over budget but nothing is left
                // to evict.
                warn!(inbox = inbox_key, "store over budget with nothing evictable");
                return Err(GatewayError::StoreFull);
            };

            let (evict_inbox, evict_id, evict_size) = {
                let entry = &inner.index[position];
                (
                    entry.inbox_key.clone(),
                    entry.message_id.clone(),
                    entry.size,
                )
            };

            // Tombstone regardless of what the collaborator says; a
            // missing inbox or message must not live-lock eviction.
            if !self.registry.evict_email(&evict_inbox, &evict_id).await {
                warn!(
                    inbox = %evict_inbox,
                    message_id = %evict_id,
                    "evicted message already missing from inbox"
                );
            }

            let entry = &mut inner.index[position];
            entry.tombstone = true;
            inner.current_memory_usage -= evict_size;
            inner.evicted_count += 1;
            debug!(
                inbox = %evict_inbox,
                message_id = %evict_id,
                freed = evict_size,
                "evicted oldest message"
            );
        }

        self.registry.add_email(inbox_key, message).await?;

        inner.index.push_back(IndexEntry {
            message_id,
            inbox_key: inbox_key.to_string(),
            size,
            received_at: Utc::now(),
            tombstone: false,
        });
        inner.current_memory_usage += size;

        Ok(())
    }

    /// A user deleted a message: release its memory and drop the index
    /// slot entirely.
    pub async fn on_email_deleted(&self, inbox_key: &str, message_id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(position) = inner
            .index
            .iter()
            .position(|entry| entry.message_id == message_id && entry.inbox_key == inbox_key)
        {
            if let Some(entry) = inner.index.remove(position) {
                if !entry.tombstone {
                    inner.current_memory_usage -= entry.size;
                }
            }
        }
    }

    /// An inbox was deleted: drop all of its index entries.
    pub async fn on_inbox_deleted(&self, inbox_key: &str) {
        let mut inner = self.inner.lock().await;
        let mut freed = 0;
        inner.index.retain(|entry| {
            if entry.inbox_key == inbox_key {
                if !entry.tombstone {
                    freed += entry.size;
                }
                false
            } else {
                true
            }
        });
        inner.current_memory_usage -= freed;
    }

    /// Drop tombstoned slots from the index.
    pub async fn compact(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let before = inner.index.len();
        inner.index.retain(|entry| !entry.tombstone);
        let dropped = before - inner.index.len();
        if dropped > 0 {
            info!(dropped, "compacted store index");
        }
        dropped
    }

    /// Tombstone (and evict from inboxes) everything older than the age
    /// budget. No-op when the budget is disabled.
    pub async fn sweep_aged(&self) -> usize {
        if self.max_age_ms == 0 {
            return 0;
        }

        let cutoff = Utc::now() - chrono::Duration::milliseconds(self.max_age_ms as i64);
        let mut inner = self.inner.lock().await;
        let mut expired = Vec::new();
        for (position, entry) in inner.index.iter().enumerate() {
            if !entry.tombstone && entry.received_at < cutoff {
                expired.push((position, entry.inbox_key.clone(), entry.message_id.clone()));
            }
        }

        for (position, inbox_key, message_id) in &expired {
            if !self.registry.evict_email(inbox_key, message_id).await {
                warn!(
                    inbox = %inbox_key,
                    message_id = %message_id,
                    "aged-out message already missing from inbox"
                );
            }
            let entry = &mut inner.index[*position];
            entry.tombstone = true;
            inner.current_memory_usage -= entry.size;
            inner.evicted_count += 1;
        }

        if !expired.is_empty() {
            info!(expired = expired.len(), "age sweep tombstoned messages");
        }
        expired.len()
    }

    pub async fn metrics(&self) -> StorageMetrics {
        let inner = self.inner.lock().await;
        let now = Utc::now();

        let mut total_stored = 0u64;
        let mut tombstones = 0u64;
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut newest: Option<DateTime<Utc>> = None;
        for entry in &inner.index {
            if entry.tombstone {
                tombstones += 1;
                continue;
            }
            total_stored += 1;
            oldest = Some(oldest.map_or(entry.received_at, |t| t.min(entry.received_at)));
            newest = Some(newest.map_or(entry.received_at, |t| t.max(entry.received_at)));
        }

        let age_ms = |t: DateTime<Utc>| (now - t).num_milliseconds().max(0) as u64;

        StorageMetrics {
            configured_bytes: self.max_memory_bytes,
            used_bytes: inner.current_memory_usage,
            available_bytes: self.max_memory_bytes.saturating_sub(inner.current_memory_usage),
            utilization_percent: if self.max_memory_bytes == 0 {
                0.0
            } else {
                inner.current_memory_usage as f64 / self.max_memory_bytes as f64 * 100.0
            },
            total_stored,
            total_evicted: inner.evicted_count,
            tombstones,
            oldest_age_ms: oldest.map(age_ms),
            newest_age_ms: newest.map(age_ms),
            max_age_ms: self.max_age_ms,
        }
    }

    /// Spawn the periodic compaction and age sweeps. The task ends when
    /// `shutdown` flips to true.
    pub fn spawn_sweeps(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        store.sweep_aged().await;
                        store.compact().await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            debug!("store sweeps shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }
}

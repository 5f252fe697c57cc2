//! Process-wide greylist substate.
//!
//! Tracks `(sender_ip, sender_email)` pairs. A pair seen for the first
//! time is rejected temporarily; retries inside the delay window are
//! rejected again; a retry after the window is allowed, and the entry is
//! kept for replay defense.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct GreylistEntry {
    first_seen: Instant,
    last_attempt: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreylistDecision {
    /// Reject with a 4xx; the sender should retry after the window.
    TemporaryReject,
    Allow,
}

pub struct GreylistState {
    delay_window: Duration,
    entries: RwLock<HashMap<(String, String), GreylistEntry>>,
}

impl GreylistState {
    pub fn new(delay_window: Duration) -> Self {
        Self {
            delay_window,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn check(&self, sender_ip: &str, sender_email: &str) -> GreylistDecision {
        let key = (sender_ip.to_string(), sender_email.to_string());
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        match entries.get_mut(&key) {
            None => {
                entries.insert(
                    key,
                    GreylistEntry {
                        first_seen: now,
                        last_attempt: now,
                    },
                );
                debug!(sender_ip, sender_email, "greylist: first attempt");
                GreylistDecision::TemporaryReject
            }
            Some(entry) => {
                entry.last_attempt = now;
                if now.duration_since(entry.first_seen) < self.delay_window {
                    debug!(sender_ip, sender_email, "greylist: retry inside window");
                    GreylistDecision::TemporaryReject
                } else {
                    // Entry stays put so replays keep passing immediately.
                    debug!(sender_ip, sender_email, "greylist: window elapsed");
                    GreylistDecision::Allow
                }
            }
        }
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_attempt_rejected() {
        let state = GreylistState::new(Duration::from_secs(300));
        let decision = state.check("192.0.2.1", "s@ex.org").await;
        assert_eq!(decision, GreylistDecision::TemporaryReject);
        assert_eq!(state.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_retry_inside_window_rejected() {
        let state = GreylistState::new(Duration::from_secs(300));
        state.check("192.0.2.1", "s@ex.org").await;
        let decision = state.check("192.0.2.1", "s@ex.org").await;
        assert_eq!(decision, GreylistDecision::TemporaryReject);
    }

    #[tokio::test]
    async fn test_retry_after_window_allowed() {
        let state = GreylistState::new(Duration::from_millis(50));
        state.check("192.0.2.1", "s@ex.org").await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let decision = state.check("192.0.2.1", "s@ex.org").await;
        assert_eq!(decision, GreylistDecision::Allow);

        // Replays keep passing.
        let decision = state.check("192.0.2.1", "s@ex.org").await;
        assert_eq!(decision, GreylistDecision::Allow);
    }

    #[tokio::test]
    async fn test_pairs_tracked_independently() {
        let state = GreylistState::new(Duration::from_secs(300));
        state.check("192.0.2.1", "s@ex.org").await;

        let decision = state.check("192.0.2.2", "s@ex.org").await;
        assert_eq!(decision, GreylistDecision::TemporaryReject);
        assert_eq!(state.entry_count().await, 2);
    }
}

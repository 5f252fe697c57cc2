use serde::{Deserialize, Serialize};

/// Where in the SMTP transaction a chaos entry may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChaosTrigger {
    OnConnect,
    OnMailFrom,
    OnRcptTo,
    OnData,
}

/// Per-inbox fault injection configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChaosConfig {
    pub enabled: bool,
    #[serde(default)]
    pub entries: Vec<ChaosEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChaosEntry {
    /// Trigger points this entry applies to. Empty matches any trigger.
    #[serde(default)]
    pub types: Vec<ChaosTrigger>,
    /// Probability in `[0, 1]` that the entry fires when its trigger
    /// matches.
    pub probability: f64,
    pub action: ChaosAction,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChaosAction {
    /// Reject with a caller-supplied SMTP response.
    Error {
        code: u16,
        enhanced: String,
        message: String,
    },
    /// Close the socket, optionally after a polite goodbye.
    Drop { graceful: bool },
    /// Defer the final positive response.
    Delay { delay_ms: u64 },
    /// Accept at SMTP level but never store.
    Blackhole { trigger_webhooks: bool },
    /// Temporarily reject first-seen senders.
    Greylist,
    Continue,
}

/// Non-rejecting outcome of chaos evaluation, applied later by the
/// delivery orchestrator. Rejections surface as typed errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaosOutcome {
    Continue,
    Delay { delay_ms: u64 },
    Blackhole { trigger_webhooks: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserializes_from_json() {
        let json = r#"{
            "enabled": true,
            "entries": [
                {
                    "types": ["on_data"],
                    "probability": 1.0,
                    "action": {"kind": "error", "code": 550, "enhanced": "5.7.1", "message": "blocked"}
                },
                {
                    "probability": 0.5,
                    "action": {"kind": "delay", "delay_ms": 1500}
                }
            ]
        }"#;

        let config: ChaosConfig = serde_json::from_str(json).unwrap();
        assert!(config.enabled);
        assert_eq!(config.entries.len(), 2);
        assert_eq!(config.entries[0].types, vec![ChaosTrigger::OnData]);
        assert!(matches!(
            config.entries[0].action,
            ChaosAction::Error { code: 550, .. }
        ));
        assert!(config.entries[1].types.is_empty());
    }
}

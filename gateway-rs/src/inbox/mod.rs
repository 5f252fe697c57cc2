//! Inbox records and the collaborator seams.
//!
//! Inbox lifecycle (creation, key registration, deletion) belongs to an
//! external collaborator; the gateway only reads inbox records and appends
//! or removes stored messages through [`InboxRegistry`]. Encryption is
//! equally opaque: [`ClientCrypto`] hands back sealed blobs and the
//! gateway never sees key material beyond the registered public key.

use crate::chaos::ChaosConfig;
use crate::error::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Sealed payload produced by `encrypt_for_client`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub ct_kem: Vec<u8>,
    pub nonce: Vec<u8>,
    pub aad: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub sig: Vec<u8>,
    pub server_sig_pk: Vec<u8>,
}

/// Fixed accounting overhead per blob for the envelope structure around
/// the six byte strings.
const BLOB_OVERHEAD: u64 = 100;

impl EncryptedBlob {
    pub fn size_bytes(&self) -> u64 {
        (self.ct_kem.len()
            + self.nonce.len()
            + self.aad.len()
            + self.ciphertext.len()
            + self.sig.len()
            + self.server_sig_pk.len()) as u64
            + BLOB_OVERHEAD
    }

    /// Wire form used in event payloads.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "ct_kem": BASE64.encode(&self.ct_kem),
            "nonce": BASE64.encode(&self.nonce),
            "aad": BASE64.encode(&self.aad),
            "ciphertext": BASE64.encode(&self.ciphertext),
            "sig": BASE64.encode(&self.sig),
            "server_sig_pk": BASE64.encode(&self.server_sig_pk),
        })
    }
}

/// A delivered message as held by the inbox collaborator.
#[derive(Debug, Clone)]
pub enum StoredMessage {
    Encrypted {
        id: String,
        encrypted_metadata: EncryptedBlob,
        encrypted_parsed: EncryptedBlob,
        encrypted_raw: EncryptedBlob,
        is_read: bool,
    },
    Plain {
        id: String,
        metadata_bytes: Vec<u8>,
        parsed_bytes: Vec<u8>,
        raw_bytes: Vec<u8>,
        is_read: bool,
    },
}

impl StoredMessage {
    pub fn id(&self) -> &str {
        match self {
            StoredMessage::Encrypted { id, .. } | StoredMessage::Plain { id, .. } => id,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        match self {
            StoredMessage::Encrypted {
                encrypted_metadata,
                encrypted_parsed,
                encrypted_raw,
                ..
            } => {
                encrypted_metadata.size_bytes()
                    + encrypted_parsed.size_bytes()
                    + encrypted_raw.size_bytes()
            }
            StoredMessage::Plain {
                metadata_bytes,
                parsed_bytes,
                raw_bytes,
                ..
            } => (metadata_bytes.len() + parsed_bytes.len() + raw_bytes.len()) as u64,
        }
    }
}

/// Inbox record as read from the collaborator.
#[derive(Debug, Clone)]
pub struct Inbox {
    /// Normalized base email, the lookup key.
    pub email: String,
    /// Opaque subscription key for notifications.
    pub inbox_hash: String,
    pub encrypted: bool,
    pub client_kem_public_key: Option<Vec<u8>>,
    /// Per-inbox toggles; `None` falls back to the global default.
    pub email_auth_enabled: Option<bool>,
    pub spam_analysis_enabled: Option<bool>,
    pub chaos_config: Option<ChaosConfig>,
}

impl Inbox {
    pub fn plain(email: &str) -> Self {
        Self {
            email: email.to_string(),
            inbox_hash: inbox_hash(email),
            encrypted: false,
            client_kem_public_key: None,
            email_auth_enabled: None,
            spam_analysis_enabled: None,
            chaos_config: None,
        }
    }

    pub fn encrypted(email: &str, client_kem_public_key: Vec<u8>) -> Self {
        Self {
            email: email.to_string(),
            inbox_hash: inbox_hash(email),
            encrypted: true,
            client_kem_public_key: Some(client_kem_public_key),
            email_auth_enabled: None,
            spam_analysis_enabled: None,
            chaos_config: None,
        }
    }
}

/// Derive the opaque subscription key for an inbox address.
pub fn inbox_hash(email: &str) -> String {
    format!("{:x}", Sha256::digest(email.to_lowercase().as_bytes()))
}

/// Inbox collaborator surface consumed by the gateway core.
#[async_trait]
pub trait InboxRegistry: Send + Sync {
    async fn get_inbox_by_email(&self, base_email: &str) -> Option<Inbox>;
    async fn get_inbox(&self, inbox_key: &str) -> Option<Inbox>;
    async fn get_inbox_count(&self) -> usize;
    async fn add_email(&self, inbox_key: &str, message: StoredMessage) -> Result<()>;
    /// Remove a message from inbox-visible storage. Returns false when the
    /// inbox or message is already gone.
    async fn evict_email(&self, inbox_key: &str, message_id: &str) -> bool;
}

/// Crypto collaborator: KEM + AEAD + signature, used as one opaque
/// operation.
#[async_trait]
pub trait ClientCrypto: Send + Sync {
    async fn encrypt_for_client(
        &self,
        client_kem_public_key: &[u8],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<EncryptedBlob>;
}

/// PEM material handed over by the certificate collaborator.
#[derive(Debug, Clone)]
pub struct CertificateMaterial {
    pub certificate: Vec<u8>,
    pub private_key: Vec<u8>,
}

pub trait CertificateProvider: Send + Sync {
    fn get_current_certificate(&self) -> Option<CertificateMaterial>;
}

struct InboxSlot {
    inbox: Inbox,
    messages: Vec<StoredMessage>,
}

/// Registry used by local mode and the test suite. Messages live in
/// insertion order per inbox.
#[derive(Default)]
pub struct InMemoryInboxRegistry {
    slots: RwLock<HashMap<String, InboxSlot>>,
}

impl InMemoryInboxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, inbox: Inbox) {
        let mut slots = self.slots.write().await;
        slots.insert(
            inbox.email.clone(),
            InboxSlot {
                inbox,
                messages: Vec::new(),
            },
        );
    }

    pub async fn remove_inbox(&self, inbox_key: &str) {
        let mut slots = self.slots.write().await;
        slots.remove(inbox_key);
    }

    /// Stored messages for an inbox, in insertion order.
    pub async fn messages(&self, inbox_key: &str) -> Vec<StoredMessage> {
        let slots = self.slots.read().await;
        slots
            .get(inbox_key)
            .map(|slot| slot.messages.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl InboxRegistry for InMemoryInboxRegistry {
    async fn get_inbox_by_email(&self, base_email: &str) -> Option<Inbox> {
        let slots = self.slots.read().await;
        slots.get(base_email).map(|slot| slot.inbox.clone())
    }

    async fn get_inbox(&self, inbox_key: &str) -> Option<Inbox> {
        self.get_inbox_by_email(inbox_key).await
    }

    async fn get_inbox_count(&self) -> usize {
        self.slots.read().await.len()
    }

    async fn add_email(&self, inbox_key: &str, message: StoredMessage) -> Result<()> {
        let mut slots = self.slots.write().await;
        match slots.get_mut(inbox_key) {
            Some(slot) => {
                slot.messages.push(message);
                Ok(())
            }
            None => Err(crate::error::GatewayError::InboxNotFound(
                inbox_key.to_string(),
            )),
        }
    }

    async fn evict_email(&self, inbox_key: &str, message_id: &str) -> bool {
        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.get_mut(inbox_key) {
            let before = slot.messages.len();
            slot.messages.retain(|message| message.id() != message_id);
            return slot.messages.len() != before;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_message(id: &str, payload: &[u8]) -> StoredMessage {
        StoredMessage::Plain {
            id: id.to_string(),
            metadata_bytes: payload.to_vec(),
            parsed_bytes: payload.to_vec(),
            raw_bytes: payload.to_vec(),
            is_read: false,
        }
    }

    #[test]
    fn test_blob_size_includes_overhead() {
        let blob = EncryptedBlob {
            ct_kem: vec![0; 32],
            nonce: vec![0; 12],
            aad: b"vaultsandbox:metadata".to_vec(),
            ciphertext: vec![0; 100],
            sig: vec![0; 64],
            server_sig_pk: vec![0; 32],
        };
        assert_eq!(blob.size_bytes(), 32 + 12 + 21 + 100 + 64 + 32 + 100);
    }

    #[test]
    fn test_plain_message_size_is_buffer_sum() {
        let message = plain_message("id", &[0u8; 10]);
        assert_eq!(message.size_bytes(), 30);
    }

    #[test]
    fn test_inbox_hash_is_stable_and_case_insensitive() {
        assert_eq!(inbox_hash("User@Example.com"), inbox_hash("user@example.com"));
        assert_eq!(inbox_hash("user@example.com").len(), 64);
    }

    #[tokio::test]
    async fn test_registry_roundtrip() {
        let registry = InMemoryInboxRegistry::new();
        registry.register(Inbox::plain("user@example.com")).await;

        assert_eq!(registry.get_inbox_count().await, 1);
        assert!(registry.get_inbox_by_email("user@example.com").await.is_some());
        assert!(registry.get_inbox_by_email("other@example.com").await.is_none());

        registry
            .add_email("user@example.com", plain_message("m1", b"abc"))
            .await
            .unwrap();
        registry
            .add_email("user@example.com", plain_message("m2", b"def"))
            .await
            .unwrap();

        let messages = registry.messages("user@example.com").await;
        assert_eq!(messages.len(), 2);
        // Insertion order.
        assert_eq!(messages[0].id(), "m1");
        assert_eq!(messages[1].id(), "m2");

        assert!(registry.evict_email("user@example.com", "m1").await);
        assert!(!registry.evict_email("user@example.com", "m1").await);
        assert_eq!(registry.messages("user@example.com").await.len(), 1);
    }

    #[tokio::test]
    async fn test_add_email_to_missing_inbox_errors() {
        let registry = InMemoryInboxRegistry::new();
        let result = registry
            .add_email("ghost@example.com", plain_message("m1", b"x"))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_blob_event_json_is_base64() {
        let blob = EncryptedBlob {
            ct_kem: b"kem".to_vec(),
            nonce: b"nonce".to_vec(),
            aad: b"aad".to_vec(),
            ciphertext: b"ct".to_vec(),
            sig: b"sig".to_vec(),
            server_sig_pk: b"pk".to_vec(),
        };
        let json = blob.to_json();
        assert_eq!(json["ct_kem"], BASE64.encode(b"kem"));
        assert_eq!(json["aad"], BASE64.encode(b"aad"));
    }
}

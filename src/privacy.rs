use crate::config::PrivacyConfig;
use crate::message::{Message, Payload};
use crate::{Error, Result};
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Opaque key material handed back by the encryption service.
pub struct EncryptionKey(Vec<u8>);

impl EncryptionKey {
    pub fn new(material: Vec<u8>) -> Self {
        Self(material)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Encryption/key-retrieval contract consumed by the privacy gate.
///
/// The concrete key-sourcing mechanism is external; retrieval may fail and
/// the gate treats that as a policy drop, never as a reason to publish the
/// payload unencrypted.
pub trait EncryptionService: Send + Sync {
    fn retrieve_key(&self) -> Result<EncryptionKey>;
    fn encrypt(&self, key: &EncryptionKey, plaintext: &[u8]) -> Result<Vec<u8>>;
}

/// Encryption service for deployments with no key source configured.
///
/// Key retrieval always fails, so every PII message that reaches the
/// encryption step is dropped.
pub struct UnconfiguredEncryption;

impl EncryptionService for UnconfiguredEncryption {
    fn retrieve_key(&self) -> Result<EncryptionKey> {
        Err(Error::Encryption(
            "no encryption service configured".to_string(),
        ))
    }

    fn encrypt(&self, _key: &EncryptionKey, _plaintext: &[u8]) -> Result<Vec<u8>> {
        Err(Error::Encryption(
            "no encryption service configured".to_string(),
        ))
    }
}

/// Why the gate discarded a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    PiiSkipped,
    UnauthorizedUser,
    KeyUnavailable,
    EncryptFailed,
}

/// Outcome of gating one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// No PII; message continues untouched.
    Pass,
    /// PII payload was replaced in place with its encrypted form.
    Encrypted,
    /// Message must not be buffered; no position accounting occurs.
    Dropped(DropReason),
}

/// Decides, for each message carrying PII, whether to drop it or encrypt it
/// in place before it may be buffered.
pub struct PrivacyGate {
    skip_messages_with_pii: bool,
    user: String,
    authorized_users: HashSet<String>,
    encryption: Arc<dyn EncryptionService>,
}

impl PrivacyGate {
    pub fn new(config: &PrivacyConfig, encryption: Arc<dyn EncryptionService>) -> Self {
        Self {
            skip_messages_with_pii: config.skip_messages_with_pii,
            user: config.user.clone(),
            authorized_users: config.authorized_users.iter().cloned().collect(),
            encryption,
        }
    }

    pub fn evaluate(&self, message: &mut Message) -> GateDecision {
        if !message.contains_pii {
            return GateDecision::Pass;
        }

        if self.skip_messages_with_pii {
            return GateDecision::Dropped(DropReason::PiiSkipped);
        }

        if !self.authorized_users.contains(&self.user) {
            return GateDecision::Dropped(DropReason::UnauthorizedUser);
        }

        let key = match self.encryption.retrieve_key() {
            Ok(key) => key,
            Err(e) => {
                warn!(topic = %message.topic, error = %e, "encryption key retrieval failed, dropping message");
                return GateDecision::Dropped(DropReason::KeyUnavailable);
            }
        };

        match self.encrypt_in_place(&key, message) {
            Ok(()) => GateDecision::Encrypted,
            Err(e) => {
                warn!(topic = %message.topic, error = %e, "payload encryption failed, dropping message");
                GateDecision::Dropped(DropReason::EncryptFailed)
            }
        }
    }

    /// Replaces the payload with its ciphertext, exactly once.
    ///
    /// Ciphertext is opaque bytes, so whichever representation was present
    /// ends up as `Payload::Raw`.
    fn encrypt_in_place(&self, key: &EncryptionKey, message: &mut Message) -> Result<()> {
        let plaintext = match &message.payload {
            Payload::Raw(bytes) => bytes.to_vec(),
            Payload::Data(value) => serde_json::to_vec(value)?,
        };
        let ciphertext = self.encryption.encrypt(key, &plaintext)?;
        message.payload = Payload::Raw(Bytes::from(ciphertext));
        Ok(())
    }
}

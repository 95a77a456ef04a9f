use crate::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;

/// Payload of a domain event: either opaque bytes or structured data.
///
/// Exactly one representation is present per message. The privacy gate may
/// replace the payload in place with its encrypted form, which is always
/// opaque bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Raw(Bytes),
    Data(serde_json::Value),
}

/// A domain event bound for one broker topic.
#[derive(Debug, Clone)]
pub struct Message {
    pub topic: String,
    /// Application-level type tag, carried in the envelope.
    pub kind: String,
    pub payload: Payload,
    /// Routing keys; an empty map means the message is unkeyed.
    pub keys: BTreeMap<String, String>,
    pub contains_pii: bool,
}

impl Message {
    pub fn new(topic: impl Into<String>, kind: impl Into<String>, payload: Payload) -> Self {
        Self {
            topic: topic.into(),
            kind: kind.into(),
            payload,
            keys: BTreeMap::new(),
            contains_pii: false,
        }
    }

    pub fn with_keys(mut self, keys: BTreeMap<String, String>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_pii(mut self, contains_pii: bool) -> Self {
        self.contains_pii = contains_pii;
        self
    }
}

/// The envelope-encoded wire form of a [`Message`].
///
/// Derived exactly once per accepted message and owned by the buffer slot it
/// occupies. `Bytes` keeps clones cheap when requests are rebuilt for retry.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedMessage {
    pub payload: Bytes,
    pub key: Option<Bytes>,
}

/// Envelope codec contract: serializes a message and its keys to bytes.
///
/// The concrete codec is chosen once at producer construction; the producer
/// holds it as an explicit field rather than creating one lazily.
pub trait Envelope: Send + Sync {
    fn pack(&self, message: &Message) -> Result<Bytes>;
    fn pack_keys(&self, keys: &BTreeMap<String, String>) -> Result<Bytes>;
}

/// JSON envelope codec.
///
/// Structured payloads are embedded as-is; raw payloads (including encrypted
/// ones) are base64-encoded under a separate field so the envelope stays
/// valid JSON.
pub struct JsonEnvelope;

#[derive(Serialize)]
struct WireEnvelope<'a> {
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_bytes: Option<String>,
}

impl Envelope for JsonEnvelope {
    fn pack(&self, message: &Message) -> Result<Bytes> {
        let wire = match &message.payload {
            Payload::Data(value) => WireEnvelope {
                kind: &message.kind,
                payload: Some(value),
                payload_bytes: None,
            },
            Payload::Raw(bytes) => WireEnvelope {
                kind: &message.kind,
                payload: None,
                payload_bytes: Some(BASE64.encode(bytes)),
            },
        };
        let encoded = serde_json::to_vec(&wire)?;
        Ok(Bytes::from(encoded))
    }

    fn pack_keys(&self, keys: &BTreeMap<String, String>) -> Result<Bytes> {
        // BTreeMap iteration makes the joined key deterministic
        let joined = keys.values().cloned().collect::<Vec<_>>().join(":");
        Ok(Bytes::from(joined.into_bytes()))
    }
}

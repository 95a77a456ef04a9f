use async_trait::async_trait;
use event_publish::buffer::FlushPolicy;
use event_publish::config::PrivacyConfig;
use event_publish::kafka::{
    BrokerTransport, LiveExecutor, ProduceRequest, RequiredAcks, TopicResponse,
};
use event_publish::message::{Envelope, JsonEnvelope, Message, Payload};
use event_publish::position::{PositionCallback, PositionData};
use event_publish::privacy::{EncryptionKey, EncryptionService, PrivacyGate};
use event_publish::producer::NoopHooks;
use event_publish::{Error, Producer, Result};
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted behavior for one produce round of the mock transport.
pub enum Round {
    AckAll { base_offset: i64 },
    FailTopic(String),
    TransportError,
}

/// Transport double: records every produce round and replays a script of
/// responses. Once the script is exhausted, every round is acknowledged.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Round>>,
    rounds: Mutex<Vec<Vec<ProduceRequest>>>,
    closed: AtomicBool,
}

impl MockTransport {
    pub fn acking() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(script: Vec<Round>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    /// Requests observed, one entry per produce round.
    pub fn rounds(&self) -> Vec<Vec<ProduceRequest>> {
        self.rounds.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerTransport for MockTransport {
    async fn send_produce_requests(
        &self,
        requests: &[ProduceRequest],
        _required_acks: RequiredAcks,
    ) -> Result<Vec<TopicResponse>> {
        self.rounds.lock().unwrap().push(requests.to_vec());

        let round = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Round::AckAll { base_offset: 0 });

        match round {
            Round::AckAll { base_offset } => Ok(requests
                .iter()
                .map(|request| TopicResponse {
                    topic: request.topic.clone(),
                    offset: base_offset,
                    error_code: 0,
                })
                .collect()),
            Round::FailTopic(failing) => Ok(requests
                .iter()
                .map(|request| TopicResponse {
                    topic: request.topic.clone(),
                    offset: if request.topic == failing { -1 } else { 0 },
                    error_code: if request.topic == failing { 7 } else { 0 },
                })
                .collect()),
            Round::TransportError => Err(Error::Transport("broker unavailable".to_string())),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Position callback that collects every snapshot it receives.
pub struct RecordingCallback(pub Arc<Mutex<Vec<PositionData>>>);

#[async_trait]
impl PositionCallback for RecordingCallback {
    async fn on_position_update(&mut self, position: PositionData) -> Result<()> {
        self.0.lock().unwrap().push(position);
        Ok(())
    }
}

/// Reversible fake cipher: XOR with a single key byte.
pub const XOR_KEY: u8 = 0x5A;

pub struct XorEncryption;

impl EncryptionService for XorEncryption {
    fn retrieve_key(&self) -> Result<EncryptionKey> {
        Ok(EncryptionKey::new(vec![XOR_KEY]))
    }

    fn encrypt(&self, key: &EncryptionKey, plaintext: &[u8]) -> Result<Vec<u8>> {
        let k = key.as_bytes()[0];
        Ok(plaintext.iter().map(|b| b ^ k).collect())
    }
}

/// Envelope that fails to pack anything, for encoding-failure tests.
pub struct FailingEnvelope;

impl Envelope for FailingEnvelope {
    fn pack(&self, _message: &Message) -> Result<bytes::Bytes> {
        Err(serde_json::from_str::<serde_json::Value>("").unwrap_err().into())
    }

    fn pack_keys(&self, _keys: &BTreeMap<String, String>) -> Result<bytes::Bytes> {
        Err(serde_json::from_str::<serde_json::Value>("").unwrap_err().into())
    }
}

pub fn privacy_config(skip_messages_with_pii: bool, user: &str) -> PrivacyConfig {
    PrivacyConfig {
        skip_messages_with_pii,
        user: user.to_string(),
        authorized_users: vec!["batch".to_string()],
    }
}

pub fn event(topic: &str, body: serde_json::Value) -> Message {
    Message::new(topic, "test.event", Payload::Data(body))
}

pub fn pii_event(topic: &str) -> Message {
    event(topic, json!({"ssn": "000-11-2222"})).with_pii(true)
}

/// Producer wired to a mock transport with zero retry backoff and a
/// recording position callback.
pub async fn live_producer(
    transport: Arc<MockTransport>,
    privacy: PrivacyConfig,
    policy: FlushPolicy,
    positions: Arc<Mutex<Vec<PositionData>>>,
) -> Producer {
    Producer::new(
        Arc::new(JsonEnvelope),
        PrivacyGate::new(&privacy, Arc::new(XorEncryption)),
        policy,
        Box::new(LiveExecutor::new(transport, 3, Duration::ZERO)),
        Box::new(RecordingCallback(positions)),
        Box::new(NoopHooks),
    )
    .await
    .unwrap()
}

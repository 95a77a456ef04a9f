use crate::config::KafkaConfig;
use crate::kafka::request::ProduceRequest;
use crate::{Error, Result};
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{debug, warn};

/// Acknowledgement level required from the broker before a produce request
/// is considered durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredAcks {
    None,
    Leader,
    All,
}

impl RequiredAcks {
    pub fn as_config_value(&self) -> &'static str {
        match self {
            RequiredAcks::None => "0",
            RequiredAcks::Leader => "1",
            RequiredAcks::All => "all",
        }
    }
}

/// Per-topic acknowledgement from one produce round.
///
/// `error_code` 0 means the topic's batch was accepted; any other value is
/// a broker-side rejection.
#[derive(Debug, Clone)]
pub struct TopicResponse {
    pub topic: String,
    pub offset: i64,
    pub error_code: i32,
}

/// Broker transport contract consumed by the publish executors.
///
/// Implementations own connection management and the wire protocol; the
/// executor only sees per-topic acknowledgements.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    async fn send_produce_requests(
        &self,
        requests: &[ProduceRequest],
        required_acks: RequiredAcks,
    ) -> Result<Vec<TopicResponse>>;

    async fn close(&self) -> Result<()>;
}

/// rdkafka-backed broker transport.
pub struct KafkaTransport {
    producer: FutureProducer,
    message_timeout: Duration,
}

impl KafkaTransport {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("acks", &config.acks)
            .set("compression.type", &config.compression)
            .set("linger.ms", config.linger_ms.to_string())
            .set("batch.size", config.batch_size.to_string())
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .create()
            .map_err(Error::Kafka)?;

        Ok(Self {
            producer,
            message_timeout: Duration::from_millis(config.message_timeout_ms),
        })
    }
}

#[async_trait]
impl BrokerTransport for KafkaTransport {
    /// Sends each request's messages in order and synthesizes one response
    /// per topic: the offset of the topic's first delivered message, and a
    /// non-zero error code if any delivery in the batch failed.
    ///
    /// librdkafka pins the acks level at client construction, so the
    /// `required_acks` argument must match the configured `acks` value.
    async fn send_produce_requests(
        &self,
        requests: &[ProduceRequest],
        _required_acks: RequiredAcks,
    ) -> Result<Vec<TopicResponse>> {
        let mut responses = Vec::with_capacity(requests.len());

        for request in requests {
            let mut first_offset: i64 = -1;
            let mut error_code = 0;

            for prepared in &request.messages {
                let key: &[u8] = prepared.key.as_deref().unwrap_or(&[]);
                let record = FutureRecord::to(&request.topic)
                    .partition(request.partition)
                    .payload(prepared.payload.as_ref())
                    .key(key);

                match self
                    .producer
                    .send(record, Timeout::After(self.message_timeout))
                    .await
                {
                    Ok((_partition, offset)) => {
                        if first_offset < 0 {
                            first_offset = offset;
                        }
                    }
                    Err((err, _message)) => {
                        warn!(
                            topic = %request.topic,
                            error = %err,
                            "delivery failed, remainder of batch abandoned for retry"
                        );
                        error_code = 1;
                        break;
                    }
                }
            }

            debug!(
                topic = %request.topic,
                offset = first_offset,
                error_code,
                "produce round response"
            );
            responses.push(TopicResponse {
                topic: request.topic.clone(),
                offset: first_offset,
                error_code,
            });
        }

        Ok(responses)
    }

    async fn close(&self) -> Result<()> {
        self.producer.flush(Timeout::After(Duration::from_secs(30)))?;
        Ok(())
    }
}

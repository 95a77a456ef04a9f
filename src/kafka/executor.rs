use crate::kafka::request::ProduceRequest;
use crate::kafka::transport::{BrokerTransport, RequiredAcks};
use crate::position::PositionTracker;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Offset recorded by the dry-run executor in place of a broker-assigned
/// offset.
pub const DRY_RUN_OFFSET: i64 = -1;

/// Per-topic result of a successful publish.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub topic: String,
    pub offset: i64,
    pub acknowledged: u64,
}

/// Strategy for executing the produce requests of one flush.
#[async_trait]
pub trait PublishExecutor: Send + Sync {
    /// Publishes the requests and records positions for every acknowledged
    /// topic. Returns only once every buffered message is accounted for:
    /// the sum of acknowledged counts equals the total message count of
    /// `requests`, or the call fails.
    async fn publish(
        &self,
        requests: Vec<ProduceRequest>,
        tracker: &mut PositionTracker,
    ) -> Result<Vec<PublishOutcome>>;

    /// Releases the underlying transport, if any.
    async fn close(&self) -> Result<()>;
}

/// Live executor: delegates to the broker transport with durable acks and
/// retries unacknowledged topics a bounded number of times.
pub struct LiveExecutor {
    transport: Arc<dyn BrokerTransport>,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl LiveExecutor {
    pub fn new(transport: Arc<dyn BrokerTransport>, max_attempts: u32, retry_backoff: Duration) -> Self {
        Self {
            transport,
            max_attempts,
            retry_backoff,
        }
    }
}

#[async_trait]
impl PublishExecutor for LiveExecutor {
    async fn publish(
        &self,
        requests: Vec<ProduceRequest>,
        tracker: &mut PositionTracker,
    ) -> Result<Vec<PublishOutcome>> {
        let mut outcomes = Vec::with_capacity(requests.len());
        let mut outstanding = requests;
        let mut attempt = 0;

        while !outstanding.is_empty() {
            attempt += 1;

            // A transport-level failure leaves every outstanding request
            // unacknowledged for this round; it is retried like a partial
            // failure rather than aborting outright.
            let responses = match self
                .transport
                .send_produce_requests(&outstanding, RequiredAcks::All)
                .await
            {
                Ok(responses) => responses,
                Err(e) => {
                    warn!(attempt, error = %e, "produce round failed");
                    Vec::new()
                }
            };

            let mut by_topic: HashMap<String, _> = responses
                .into_iter()
                .map(|response| (response.topic.clone(), response))
                .collect();

            let mut still_outstanding = Vec::new();
            for request in outstanding {
                match by_topic.remove(&request.topic) {
                    Some(response) if response.error_code == 0 => {
                        // The response only carries an offset; the count is
                        // the number of messages buffered for the topic.
                        let count = request.message_count() as u64;
                        tracker.record_messages_published(&request.topic, response.offset, count);
                        outcomes.push(PublishOutcome {
                            topic: request.topic,
                            offset: response.offset,
                            acknowledged: count,
                        });
                    }
                    Some(response) => {
                        warn!(
                            topic = %request.topic,
                            error_code = response.error_code,
                            "topic batch rejected"
                        );
                        still_outstanding.push(request);
                    }
                    None => {
                        warn!(topic = %request.topic, "topic batch not acknowledged");
                        still_outstanding.push(request);
                    }
                }
            }

            outstanding = still_outstanding;
            if outstanding.is_empty() {
                break;
            }

            if attempt >= self.max_attempts {
                let unacknowledged: usize =
                    outstanding.iter().map(ProduceRequest::message_count).sum();
                error!(
                    attempts = attempt,
                    unacknowledged, "publish retries exhausted, aborting flush"
                );
                return Err(Error::PublishAborted {
                    attempts: attempt,
                    unacknowledged,
                });
            }

            tokio::time::sleep(self.retry_backoff).await;
        }

        Ok(outcomes)
    }

    async fn close(&self) -> Result<()> {
        self.transport.close().await
    }
}

/// Dry-run executor: never contacts a broker.
///
/// Records the [`DRY_RUN_OFFSET`] sentinel with each request's message
/// count so position accounting stays exercised, and emits a diagnostic of
/// what would have been published.
pub struct DryRunExecutor;

#[async_trait]
impl PublishExecutor for DryRunExecutor {
    async fn publish(
        &self,
        requests: Vec<ProduceRequest>,
        tracker: &mut PositionTracker,
    ) -> Result<Vec<PublishOutcome>> {
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            let count = request.message_count() as u64;
            tracker.record_messages_published(&request.topic, DRY_RUN_OFFSET, count);
            debug!(
                topic = %request.topic,
                messages = count,
                "dry run: would have published"
            );
            outcomes.push(PublishOutcome {
                topic: request.topic,
                offset: DRY_RUN_OFFSET,
                acknowledged: count,
            });
        }
        Ok(outcomes)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::transport::TopicResponse;
    use crate::message::{Message, Payload, PreparedMessage};
    use bytes::Bytes;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// One scripted produce round.
    enum Round {
        AckAll { base_offset: i64 },
        FailTopic(&'static str),
        TransportError,
    }

    struct ScriptedTransport {
        script: Mutex<VecDeque<Round>>,
        rounds_sent: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Round>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                rounds_sent: Mutex::new(Vec::new()),
            }
        }

        fn topics_per_round(&self) -> Vec<Vec<String>> {
            self.rounds_sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrokerTransport for ScriptedTransport {
        async fn send_produce_requests(
            &self,
            requests: &[ProduceRequest],
            _required_acks: RequiredAcks,
        ) -> Result<Vec<TopicResponse>> {
            let mut topics: Vec<String> = requests.iter().map(|r| r.topic.clone()).collect();
            topics.sort();
            self.rounds_sent.lock().unwrap().push(topics);

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
                        offset: if request.topic == failing { -1 } else { 5 },
                        error_code: if request.topic == failing { 7 } else { 0 },
                    })
                    .collect()),
                Round::TransportError => {
                    Err(Error::Transport("broker unavailable".to_string()))
                }
            }
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn request(topic: &str, count: usize) -> ProduceRequest {
        ProduceRequest {
            topic: topic.to_string(),
            partition: 0,
            messages: (0..count)
                .map(|_| PreparedMessage {
                    payload: Bytes::from_static(b"{}"),
                    key: None,
                })
                .collect(),
        }
    }

    fn tracker_with_buffered(counts: &[(&str, usize)]) -> PositionTracker {
        let mut tracker = PositionTracker::new();
        for (topic, count) in counts {
            for _ in 0..*count {
                tracker.record_message_buffered(&Message::new(
                    *topic,
                    "test.event",
                    Payload::Data(json!({})),
                ));
            }
        }
        tracker
    }

    #[tokio::test]
    async fn test_live_all_acknowledged_first_round() {
        let transport = Arc::new(ScriptedTransport::new(vec![Round::AckAll { base_offset: 40 }]));
        let executor = LiveExecutor::new(transport, 3, Duration::ZERO);
        let mut tracker = tracker_with_buffered(&[("t1", 2), ("t2", 1)]);

        let outcomes = executor
            .publish(vec![request("t1", 2), request("t2", 1)], &mut tracker)
            .await
            .unwrap();

        let acknowledged: u64 = outcomes.iter().map(|o| o.acknowledged).sum();
        assert_eq!(acknowledged, 3);

        let data = tracker.get_position_data();
        assert_eq!(data.topic("t1").unwrap().published_count, 2);
        assert_eq!(data.topic("t1").unwrap().published_offset, 40);
        assert_eq!(data.topic("t2").unwrap().unpublished_count, 0);
    }

    #[tokio::test]
    async fn test_live_retries_only_unacknowledged_requests() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Round::FailTopic("t2"),
            Round::AckAll { base_offset: 9 },
        ]));
        let executor = LiveExecutor::new(transport.clone(), 3, Duration::ZERO);
        let mut tracker = tracker_with_buffered(&[("t1", 1), ("t2", 2)]);

        let requests = vec![request("t1", 1), request("t2", 2)];
        let outcomes = executor.publish(requests, &mut tracker).await.unwrap();

        let acknowledged: u64 = outcomes.iter().map(|o| o.acknowledged).sum();
        assert_eq!(acknowledged, 3);

        // Second round carried only the failed topic
        let rounds = transport.topics_per_round();
        assert_eq!(rounds.len(), 2);
        assert_eq!(rounds[0], vec!["t1".to_string(), "t2".to_string()]);
        assert_eq!(rounds[1], vec!["t2".to_string()]);
    }

    #[tokio::test]
    async fn test_live_transport_error_is_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Round::TransportError,
            Round::AckAll { base_offset: 1 },
        ]));
        let executor = LiveExecutor::new(transport.clone(), 3, Duration::ZERO);
        let mut tracker = tracker_with_buffered(&[("t1", 1)]);

        let outcomes = executor
            .publish(vec![request("t1", 1)], &mut tracker)
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(transport.topics_per_round().len(), 2);
    }

    #[tokio::test]
    async fn test_live_exhausted_retries_abort() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Round::FailTopic("t1"),
            Round::FailTopic("t1"),
        ]));
        let executor = LiveExecutor::new(transport, 2, Duration::ZERO);
        let mut tracker = tracker_with_buffered(&[("t1", 3)]);

        let err = executor
            .publish(vec![request("t1", 3)], &mut tracker)
            .await
            .unwrap_err();

        match err {
            Error::PublishAborted {
                attempts,
                unacknowledged,
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(unacknowledged, 3);
            }
            other => panic!("expected PublishAborted, got {other}"),
        }

        // Nothing was claimed as published
        assert_eq!(
            tracker.get_position_data().topic("t1").unwrap().published_count,
            0
        );
    }

    #[tokio::test]
    async fn test_dry_run_records_sentinel_offset() {
        let mut tracker = tracker_with_buffered(&[("t", 2)]);

        let outcomes = DryRunExecutor
            .publish(vec![request("t", 2)], &mut tracker)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].offset, DRY_RUN_OFFSET);
        assert_eq!(outcomes[0].acknowledged, 2);

        let position = tracker.get_position_data();
        assert_eq!(position.topic("t").unwrap().published_offset, DRY_RUN_OFFSET);
        assert_eq!(position.topic("t").unwrap().published_count, 2);
    }
}

use crate::buffer::MessageBuffer;
use crate::message::PreparedMessage;

/// All requests target one partition per topic.
pub const DEFAULT_PARTITION: i32 = 0;

/// A batch of prepared messages destined for one topic/partition.
#[derive(Debug, Clone)]
pub struct ProduceRequest {
    pub topic: String,
    pub partition: i32,
    pub messages: Vec<PreparedMessage>,
}

impl ProduceRequest {
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// Converts the current buffer contents into broker-ready produce requests,
/// one per topic, preserving message order. No filtering, no coalescing
/// across topics.
pub fn build_produce_requests(buffer: &MessageBuffer) -> Vec<ProduceRequest> {
    buffer
        .topics()
        .map(|(topic, messages)| ProduceRequest {
            topic: topic.to_string(),
            partition: DEFAULT_PARTITION,
            messages: messages.to_vec(),
        })
        .collect()
}

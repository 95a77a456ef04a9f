use crate::message::PreparedMessage;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Pure flush decision over buffer age and buffered message count.
///
/// Both comparisons are inclusive: a message that brings the count exactly
/// to the size limit triggers a flush on the same call that added it.
#[derive(Debug, Clone, Copy)]
pub struct FlushPolicy {
    pub time_limit: Duration,
    pub size_limit: usize,
}

impl FlushPolicy {
    pub fn new(time_limit: Duration, size_limit: usize) -> Self {
        Self {
            time_limit,
            size_limit,
        }
    }

    pub fn should_flush(&self, buffer_age: Duration, buffered: usize) -> bool {
        buffer_age >= self.time_limit || buffered >= self.size_limit
    }
}

/// Ordered, per-topic accumulation of prepared messages.
///
/// Invariants: the total count equals the sum of per-topic sequence lengths,
/// and insertion order within a topic is preserved. The buffer is replaced
/// wholesale on flush rather than drained piecemeal.
#[derive(Debug)]
pub struct MessageBuffer {
    topics: HashMap<String, Vec<PreparedMessage>>,
    total: usize,
    started_at: Instant,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self {
            topics: HashMap::new(),
            total: 0,
            started_at: Instant::now(),
        }
    }

    /// Appends to the topic's sequence, creating the topic entry if absent.
    pub fn append(&mut self, topic: &str, message: PreparedMessage) {
        self.topics.entry(topic.to_string()).or_default().push(message);
        self.total += 1;
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Time elapsed since this buffer was created.
    pub fn age(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn topics(&self) -> impl Iterator<Item = (&str, &[PreparedMessage])> {
        self.topics
            .iter()
            .map(|(topic, messages)| (topic.as_str(), messages.as_slice()))
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

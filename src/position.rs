use crate::message::Message;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Publish position for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPosition {
    /// Broker offset of the most recent acknowledged batch, or -1 when no
    /// real offset has been recorded (fresh topic, or dry-run mode).
    pub published_offset: i64,
    pub published_count: u64,
    pub unpublished_count: u64,
}

impl Default for TopicPosition {
    fn default() -> Self {
        Self {
            published_offset: -1,
            published_count: 0,
            unpublished_count: 0,
        }
    }
}

/// Snapshot of publish positions, sufficient to resume after a restart.
///
/// Produced by [`PositionTracker::get_position_data`] and handed to the
/// owning [`PositionCallback`] exactly once per buffer lifecycle, at the
/// creation of each fresh buffer. It is never produced while a flush is
/// outstanding, so a persisted snapshot always reflects a fully committed
/// state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionData {
    pub topics: HashMap<String, TopicPosition>,
    pub captured_at: DateTime<Utc>,
}

impl PositionData {
    pub fn topic(&self, topic: &str) -> Option<&TopicPosition> {
        self.topics.get(topic)
    }
}

/// Records buffered-but-unpublished and published counts/offsets per topic.
#[derive(Debug, Default)]
pub struct PositionTracker {
    topics: HashMap<String, TopicPosition>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message_buffered(&mut self, message: &Message) {
        let state = self.topics.entry(message.topic.clone()).or_default();
        state.unpublished_count += 1;
    }

    pub fn record_messages_published(&mut self, topic: &str, offset: i64, count: u64) {
        let state = self.topics.entry(topic.to_string()).or_default();
        state.published_offset = offset;
        state.published_count += count;
        state.unpublished_count = state.unpublished_count.saturating_sub(count);
    }

    pub fn get_position_data(&self) -> PositionData {
        PositionData {
            topics: self.topics.clone(),
            captured_at: Utc::now(),
        }
    }
}

/// Owner callback invoked with the current [`PositionData`] once per fresh
/// buffer. Supplied at producer construction.
#[async_trait]
pub trait PositionCallback: Send {
    async fn on_position_update(&mut self, position: PositionData) -> Result<()>;
}

//! The producer composition root.
//!
//! Owns the message buffer, flush policy, privacy gate, publish executor
//! and position tracker, and drives the publish → buffer → flush → reset
//! cycle. One producer instance is driven by one caller at a time; all
//! methods take `&mut self` and run strictly sequentially.

use crate::buffer::{FlushPolicy, MessageBuffer};
use crate::kafka::executor::{PublishExecutor, PublishOutcome};
use crate::kafka::request::build_produce_requests;
use crate::message::{Envelope, Message, PreparedMessage};
use crate::position::{PositionCallback, PositionTracker};
use crate::privacy::{GateDecision, PrivacyGate};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle hooks around flush and reset.
///
/// Injected at construction; any strategy (plain, logging,
/// metrics-emitting) is an interchangeable implementation.
pub trait ProducerHooks: Send + Sync {
    fn pre_flush(&self, request_count: usize, message_count: usize) {
        let _ = (request_count, message_count);
    }

    fn post_flush(&self, outcomes: &[PublishOutcome]) {
        let _ = outcomes;
    }

    fn pre_reset(&self) {}
}

/// Hooks that do nothing.
pub struct NoopHooks;

impl ProducerHooks for NoopHooks {}

/// Hooks that emit structured lifecycle events.
pub struct LoggingHooks;

impl ProducerHooks for LoggingHooks {
    fn pre_flush(&self, request_count: usize, message_count: usize) {
        info!(
            requests = request_count,
            messages = message_count,
            "flushing buffered messages"
        );
    }

    fn post_flush(&self, outcomes: &[PublishOutcome]) {
        info!(topics = outcomes.len(), "all messages published");
    }

    fn pre_reset(&self) {
        info!("resetting message buffer");
    }
}

/// Buffered, policy-gated publisher.
///
/// `publish` runs the privacy gate, encodes and buffers accepted messages,
/// and flushes when the policy's time or size threshold is reached. `wake`
/// re-checks the policy without a new message so an external timer can
/// force time-based flushes through idle periods.
pub struct Producer {
    envelope: Arc<dyn Envelope>,
    gate: PrivacyGate,
    buffer: MessageBuffer,
    policy: FlushPolicy,
    executor: Box<dyn PublishExecutor>,
    tracker: PositionTracker,
    position_callback: Box<dyn PositionCallback>,
    hooks: Box<dyn ProducerHooks>,
    closed: bool,
}

impl Producer {
    /// Creates the producer with a fresh buffer and hands the initial
    /// position snapshot to the callback, matching the snapshot delivered
    /// at every later buffer creation.
    pub async fn new(
        envelope: Arc<dyn Envelope>,
        gate: PrivacyGate,
        policy: FlushPolicy,
        executor: Box<dyn PublishExecutor>,
        mut position_callback: Box<dyn PositionCallback>,
        hooks: Box<dyn ProducerHooks>,
    ) -> Result<Self> {
        let tracker = PositionTracker::new();
        position_callback
            .on_position_update(tracker.get_position_data())
            .await?;

        Ok(Self {
            envelope,
            gate,
            buffer: MessageBuffer::new(),
            policy,
            executor,
            tracker,
            position_callback,
            hooks,
            closed: false,
        })
    }

    /// Gates, encodes and buffers one message, then flushes if the policy
    /// triggers.
    ///
    /// Messages the privacy gate drops are discarded without buffering or
    /// position accounting; this returns `Ok` for them. Encoding failures
    /// propagate, since a message that cannot be packed must never occupy
    /// a buffer slot.
    pub async fn publish(&mut self, mut message: Message) -> Result<()> {
        self.ensure_open()?;

        match self.gate.evaluate(&mut message) {
            GateDecision::Dropped(reason) => {
                debug!(topic = %message.topic, ?reason, "message dropped by privacy gate");
                return Ok(());
            }
            GateDecision::Pass | GateDecision::Encrypted => {}
        }

        let prepared = self.prepare(&message)?;
        self.buffer.append(&message.topic, prepared);
        self.tracker.record_message_buffered(&message);

        self.flush_if_necessary().await
    }

    /// Re-checks the flush policy without appending a message.
    ///
    /// Intended to be called periodically by an external scheduler so that
    /// low-traffic topics still flush within the time limit.
    pub async fn wake(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.flush_if_necessary().await
    }

    /// Publishes everything currently buffered, then resets the buffer.
    ///
    /// Flushing an empty buffer skips the executor but still refreshes the
    /// buffer's start timestamp. On a fatal publish error the buffer is
    /// left intact and the error propagates.
    pub async fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.flush_inner().await
    }

    /// Final flush of any remaining buffered messages, then releases the
    /// broker transport. Calling `publish`, `wake` or `flush` afterwards
    /// returns [`Error::ProducerClosed`]; a second `close` is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush_inner().await?;
        self.executor.close().await?;
        self.closed = true;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::ProducerClosed)
        } else {
            Ok(())
        }
    }

    async fn flush_if_necessary(&mut self) -> Result<()> {
        if self
            .policy
            .should_flush(self.buffer.age(), self.buffer.total())
        {
            self.flush_inner().await
        } else {
            Ok(())
        }
    }

    async fn flush_inner(&mut self) -> Result<()> {
        let requests = build_produce_requests(&self.buffer);
        self.hooks.pre_flush(requests.len(), self.buffer.total());

        let outcomes = if requests.is_empty() {
            Vec::new()
        } else {
            self.executor.publish(requests, &mut self.tracker).await?
        };

        self.hooks.post_flush(&outcomes);
        self.reset_buffer().await
    }

    fn prepare(&self, message: &Message) -> Result<PreparedMessage> {
        let payload = self.envelope.pack(message)?;
        let key = if message.keys.is_empty() {
            None
        } else {
            Some(self.envelope.pack_keys(&message.keys)?)
        };
        Ok(PreparedMessage { payload, key })
    }

    /// Replaces the buffer with a fresh one, handing the position snapshot
    /// to the owning callback first. Called only after a successful flush,
    /// so the snapshot always reflects a fully committed state.
    async fn reset_buffer(&mut self) -> Result<()> {
        self.hooks.pre_reset();
        self.position_callback
            .on_position_update(self.tracker.get_position_data())
            .await?;
        self.buffer = MessageBuffer::new();
        Ok(())
    }
}

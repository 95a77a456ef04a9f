//! Error types and result handling for event-publish.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! # Example
//!
//! ```rust
//! use event_publish::{Error, Result};
//!
//! fn publish_batch() -> Result<()> {
//!     // Simulating a retry-exhausted publish
//!     Err(Error::PublishAborted { attempts: 4, unacknowledged: 12 })
//! }
//!
//! match publish_batch() {
//!     Ok(()) => println!("Published"),
//!     Err(Error::PublishAborted { attempts, .. }) => {
//!         eprintln!("Gave up after {} attempts", attempts)
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for event-publish operations.
///
/// This enum represents all possible errors that can occur while buffering
/// and publishing events, from configuration issues to runtime failures.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, typically from an invalid file or environment.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Kafka client or producer error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// JSON serialization error when packing an envelope or snapshot.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error, typically from position snapshot file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Broker transport failure not covered by the Kafka client error type.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Key retrieval or payload encryption failure.
    ///
    /// The privacy gate converts this into a policy drop; it never reaches
    /// callers of `publish`.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// A flush gave up with messages still unconfirmed by the broker.
    ///
    /// Raised after the bounded retry loop exhausts its attempts. The
    /// buffered messages are neither claimed as published nor silently
    /// dropped; the buffer is left intact for the caller to decide.
    #[error("Publish aborted after {attempts} attempts, {unacknowledged} messages unacknowledged")]
    PublishAborted {
        /// Number of produce rounds attempted
        attempts: u32,
        /// Messages never acknowledged by the broker
        unacknowledged: usize,
    },

    /// `publish`, `wake` or `flush` was called after `close`.
    #[error("Producer is closed")]
    ProducerClosed,
}

/// A convenient Result type alias for event-publish operations.
///
/// This is equivalent to `std::result::Result<T, event_publish::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

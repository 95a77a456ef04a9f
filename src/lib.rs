pub mod buffer;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod message;
pub mod position;
pub mod privacy;
pub mod producer;

pub mod kafka;

pub use config::Config;
pub use error::{Error, Result};
pub use message::{Message, Payload};
pub use producer::Producer;

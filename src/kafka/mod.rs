pub mod executor;
pub mod request;
pub mod transport;

pub use executor::{DryRunExecutor, LiveExecutor, PublishExecutor, PublishOutcome, DRY_RUN_OFFSET};
pub use request::{build_produce_requests, ProduceRequest};
pub use transport::{BrokerTransport, KafkaTransport, RequiredAcks, TopicResponse};

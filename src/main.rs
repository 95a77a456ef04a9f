use async_trait::async_trait;
use clap::Parser;
use event_publish::buffer::FlushPolicy;
use event_publish::checkpoint::PositionStore;
use event_publish::kafka::{DryRunExecutor, KafkaTransport, LiveExecutor, PublishExecutor};
use event_publish::message::{JsonEnvelope, Message, Payload};
use event_publish::position::{PositionCallback, PositionData};
use event_publish::privacy::{PrivacyGate, UnconfiguredEncryption};
use event_publish::producer::{LoggingHooks, Producer};
use event_publish::{Config, Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "event-publish")]
#[command(about = "Buffered, policy-gated event publisher for Kafka", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,

    #[arg(short, long, help = "Simulate publication without contacting the broker")]
    dry_run: bool,
}

/// One JSONL event record read from stdin.
#[derive(Debug, Deserialize)]
struct EventRecord {
    topic: String,
    #[serde(default = "default_kind")]
    kind: String,
    payload: serde_json::Value,
    #[serde(default)]
    keys: BTreeMap<String, String>,
    #[serde(default)]
    contains_pii: bool,
}

fn default_kind() -> String {
    "event".to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Starting event-publish");
    info!("Loading configuration from {:?}", args.config);

    let mut config = match Config::from_file(&args.config) {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(Error::Config(e));
        }
    };

    if args.dry_run {
        config.producer.dry_run = true;
    }

    info!(
        kafka_brokers = ?config.kafka.brokers,
        flush_time_limit_secs = config.producer.flush_time_limit_secs,
        flush_size_limit = config.producer.flush_size_limit,
        dry_run = config.producer.dry_run,
        skip_messages_with_pii = config.privacy.skip_messages_with_pii,
        "Configuration summary"
    );

    run(config).await
}

async fn run(config: Config) -> Result<()> {
    let executor: Box<dyn PublishExecutor> = if config.producer.dry_run {
        Box::new(DryRunExecutor)
    } else {
        let transport = KafkaTransport::new(&config.kafka)?;
        Box::new(LiveExecutor::new(
            Arc::new(transport),
            config.producer.max_publish_retries,
            Duration::from_millis(config.producer.retry_backoff_ms),
        ))
    };

    let position_callback: Box<dyn PositionCallback> = match &config.producer.position_file {
        Some(path) => Box::new(PositionStore::new(path)),
        None => Box::new(LogPositions),
    };

    let gate = PrivacyGate::new(&config.privacy, Arc::new(UnconfiguredEncryption));
    let policy = FlushPolicy::new(
        Duration::from_secs(config.producer.flush_time_limit_secs),
        config.producer.flush_size_limit,
    );

    let mut producer = Producer::new(
        Arc::new(JsonEnvelope),
        gate,
        policy,
        executor,
        position_callback,
        Box::new(LoggingHooks),
    )
    .await?;

    info!("Reading event records from stdin, one JSON object per line");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut wake_interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match parse_event(&line) {
                            Ok(message) => producer.publish(message).await?,
                            Err(e) => warn!(error = %e, "skipping malformed event record"),
                        }
                    }
                    None => break,
                }
            }
            _ = wake_interval.tick() => {
                producer.wake().await?;
            }
        }
    }

    producer.close().await?;
    info!("All buffered messages published, shutting down");
    Ok(())
}

fn parse_event(line: &str) -> Result<Message> {
    let record: EventRecord = serde_json::from_str(line)?;
    Ok(
        Message::new(record.topic, record.kind, Payload::Data(record.payload))
            .with_keys(record.keys)
            .with_pii(record.contains_pii),
    )
}

/// Position callback for runs without a configured position file.
struct LogPositions;

#[async_trait]
impl PositionCallback for LogPositions {
    async fn on_position_update(&mut self, position: PositionData) -> Result<()> {
        debug!(topics = position.topics.len(), "position snapshot");
        Ok(())
    }
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("event_publish=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("event_publish=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

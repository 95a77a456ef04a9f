use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub kafka: KafkaConfig,
    pub producer: ProducerConfig,
    pub privacy: PrivacyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default = "default_acks")]
    pub acks: String,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProducerConfig {
    #[serde(default = "default_flush_time_limit_secs")]
    pub flush_time_limit_secs: u64,
    #[serde(default = "default_flush_size_limit")]
    pub flush_size_limit: usize,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_max_publish_retries")]
    pub max_publish_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default)]
    pub position_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrivacyConfig {
    #[serde(default)]
    pub skip_messages_with_pii: bool,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_authorized_users")]
    pub authorized_users: Vec<String>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("EVENT_PUBLISH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_compression() -> String {
    "snappy".to_string()
}

fn default_linger_ms() -> u32 {
    100
}

fn default_batch_size() -> usize {
    16384
}

fn default_message_timeout_ms() -> u64 {
    30_000
}

fn default_flush_time_limit_secs() -> u64 {
    10
}

fn default_flush_size_limit() -> usize {
    1000
}

fn default_max_publish_retries() -> u32 {
    4
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_user() -> String {
    "batch".to_string()
}

fn default_authorized_users() -> Vec<String> {
    vec!["batch".to_string()]
}

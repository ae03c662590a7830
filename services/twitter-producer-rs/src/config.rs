use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::ConfigError;
use crate::kafka::{DeliveryOrdering, ProducerSettings};
use crate::twitter::SearchQuery;

/// Largest in-flight bound librdkafka accepts with idempotence enabled.
pub const MAX_IDEMPOTENT_IN_FLIGHT: u32 = 5;

const COMPRESSION_CODECS: &[&str] = &["none", "gzip", "snappy", "lz4", "zstd"];

/// All configuration loaded from environment variables.
/// Built once at startup and handed to the source, sink and publisher.
#[derive(Clone, Deserialize)]
pub struct Config {
    pub twitter_bearer_token: String,
    #[serde(default = "default_api_base_url")]
    pub twitter_api_base_url: String,
    #[serde(default = "default_search_query")]
    pub twitter_search_query: String,
    #[serde(default = "default_max_results")]
    pub twitter_max_results: u32,
    #[serde(default = "default_tweet_fields")]
    pub twitter_tweet_fields: Vec<String>,
    #[serde(default = "default_http_timeout_secs")]
    pub twitter_http_timeout_secs: u64,

    #[serde(default = "default_bootstrap_servers")]
    pub kafka_bootstrap_servers: String,
    #[serde(default = "default_topic")]
    pub kafka_topic: String,
    #[serde(default)]
    pub kafka_ordering: DeliveryOrdering,
    #[serde(default = "default_max_in_flight")]
    pub kafka_max_in_flight: u32,
    #[serde(default = "default_compression")]
    pub kafka_compression: String,
    #[serde(default = "default_batch_size_bytes")]
    pub kafka_batch_size_bytes: u32,
    #[serde(default = "default_linger_ms")]
    pub kafka_linger_ms: u64,
    #[serde(default = "default_message_timeout_ms")]
    pub kafka_message_timeout_ms: u64,
    #[serde(default = "default_flush_timeout_secs")]
    pub kafka_flush_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api.twitter.com".to_string()
}

fn default_search_query() -> String {
    "apache kafka".to_string()
}

fn default_max_results() -> u32 {
    10
}

fn default_tweet_fields() -> Vec<String> {
    vec!["author_id".into(), "geo".into(), "source".into()]
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_topic() -> String {
    "twitter_tweets".to_string()
}

fn default_max_in_flight() -> u32 {
    MAX_IDEMPOTENT_IN_FLIGHT
}

fn default_compression() -> String {
    "snappy".to_string()
}

fn default_batch_size_bytes() -> u32 {
    32 * 1024
}

fn default_linger_ms() -> u64 {
    20
}

fn default_message_timeout_ms() -> u64 {
    120_000
}

fn default_flush_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_iter(std::env::vars())
    }

    /// Same as [`Config::from_env`] but reads from an explicit set of variables.
    pub fn from_iter<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Config = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.twitter_bearer_token.trim().is_empty() {
            return Err(invalid("TWITTER_BEARER_TOKEN must not be empty"));
        }
        if !(10..=100).contains(&self.twitter_max_results) {
            return Err(invalid(format!(
                "TWITTER_MAX_RESULTS must be within 10..=100, got {}",
                self.twitter_max_results
            )));
        }
        if self.kafka_bootstrap_servers.trim().is_empty() {
            return Err(invalid("KAFKA_BOOTSTRAP_SERVERS must not be empty"));
        }
        if self.kafka_topic.trim().is_empty() {
            return Err(invalid("KAFKA_TOPIC must not be empty"));
        }
        if self.kafka_max_in_flight == 0 || self.kafka_max_in_flight > MAX_IDEMPOTENT_IN_FLIGHT {
            return Err(invalid(format!(
                "KAFKA_MAX_IN_FLIGHT must be within 1..={MAX_IDEMPOTENT_IN_FLIGHT} with idempotence enabled, got {}",
                self.kafka_max_in_flight
            )));
        }
        if !COMPRESSION_CODECS.contains(&self.kafka_compression.as_str()) {
            return Err(invalid(format!(
                "KAFKA_COMPRESSION must be one of {COMPRESSION_CODECS:?}, got {:?}",
                self.kafka_compression
            )));
        }
        Ok(())
    }

    pub fn search_query(&self) -> SearchQuery {
        SearchQuery {
            query: self.twitter_search_query.clone(),
            max_results: self.twitter_max_results,
            tweet_fields: self
                .twitter_tweet_fields
                .iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect::<BTreeSet<_>>(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.twitter_http_timeout_secs)
    }

    pub fn producer_settings(&self) -> ProducerSettings {
        ProducerSettings {
            bootstrap_servers: self.kafka_bootstrap_servers.clone(),
            ordering: self.kafka_ordering,
            max_in_flight: self.kafka_max_in_flight,
            compression: self.kafka_compression.clone(),
            batch_size_bytes: self.kafka_batch_size_bytes,
            linger_ms: self.kafka_linger_ms,
            message_timeout_ms: self.kafka_message_timeout_ms,
            flush_timeout: Duration::from_secs(self.kafka_flush_timeout_secs),
        }
    }
}

// Bearer token stays out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("twitter_bearer_token", &"<redacted>")
            .field("twitter_api_base_url", &self.twitter_api_base_url)
            .field("twitter_search_query", &self.twitter_search_query)
            .field("twitter_max_results", &self.twitter_max_results)
            .field("twitter_tweet_fields", &self.twitter_tweet_fields)
            .field("twitter_http_timeout_secs", &self.twitter_http_timeout_secs)
            .field("kafka_bootstrap_servers", &self.kafka_bootstrap_servers)
            .field("kafka_topic", &self.kafka_topic)
            .field("kafka_ordering", &self.kafka_ordering)
            .field("kafka_max_in_flight", &self.kafka_max_in_flight)
            .field("kafka_compression", &self.kafka_compression)
            .field("kafka_batch_size_bytes", &self.kafka_batch_size_bytes)
            .field("kafka_linger_ms", &self.kafka_linger_ms)
            .field("kafka_message_timeout_ms", &self.kafka_message_timeout_ms)
            .field("kafka_flush_timeout_secs", &self.kafka_flush_timeout_secs)
            .finish()
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

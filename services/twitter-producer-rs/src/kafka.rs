use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::SinkError;
use crate::models::{OutboundMessage, SendOutcome};

/// Pending acknowledgement for one submitted message.
pub type Delivery = Pin<Box<dyn Future<Output = SendOutcome> + Send + 'static>>;

/// Destination for outbound messages.
///
/// `submit` only enqueues: it must return before the broker acknowledges so
/// the client can batch and pipeline. `close` flushes everything still queued.
#[async_trait]
pub trait MessageSink: Send + Sync {
    fn submit(&self, message: OutboundMessage) -> Delivery;

    async fn close(&self) -> Result<(), SinkError>;
}

/// How strictly the producer preserves per-partition ordering across retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOrdering {
    /// Up to the configured number of in-flight requests per connection.
    /// The idempotent producer still keeps partition order for bounds <= 5.
    #[default]
    Pipelined,
    /// A single in-flight request per connection.
    Strict,
}

impl DeliveryOrdering {
    pub fn in_flight_limit(self, configured: u32) -> u32 {
        match self {
            Self::Pipelined => configured,
            Self::Strict => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub bootstrap_servers: String,
    pub ordering: DeliveryOrdering,
    pub max_in_flight: u32,
    pub compression: String,
    pub batch_size_bytes: u32,
    pub linger_ms: u64,
    pub message_timeout_ms: u64,
    pub flush_timeout: Duration,
}

impl ProducerSettings {
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            // idempotence
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("retries", i32::MAX.to_string())
            .set(
                "max.in.flight.requests.per.connection",
                self.ordering.in_flight_limit(self.max_in_flight).to_string(),
            )
            // batching
            .set("compression.type", &self.compression)
            .set("batch.size", self.batch_size_bytes.to_string())
            .set("linger.ms", self.linger_ms.to_string())
            .set("message.timeout.ms", self.message_timeout_ms.to_string());
        config
    }
}

/// Kafka-backed sink using the idempotent producer.
pub struct KafkaSink {
    producer: FutureProducer,
    flush_timeout: Duration,
}

impl KafkaSink {
    pub fn new(settings: &ProducerSettings) -> Result<Self, SinkError> {
        let producer: FutureProducer = settings.client_config().create()?;
        tracing::info!(
            bootstrap = %settings.bootstrap_servers,
            ordering = ?settings.ordering,
            "kafka producer ready"
        );
        Ok(Self {
            producer,
            flush_timeout: settings.flush_timeout,
        })
    }
}

#[async_trait]
impl MessageSink for KafkaSink {
    fn submit(&self, message: OutboundMessage) -> Delivery {
        let record = FutureRecord::to(message.topic.as_str())
            .key(message.key.as_str())
            .payload(message.value.as_str());

        match self.producer.send_result(record) {
            Ok(delivery) => Box::pin(async move {
                match delivery.await {
                    Ok(Ok((partition, offset))) => SendOutcome::Acked { partition, offset },
                    Ok(Err((err, _))) => SendOutcome::failed(err.to_string()),
                    Err(_) => SendOutcome::failed("delivery canceled: producer dropped"),
                }
            }),
            // Rejected locally before reaching the queue (queue full, too large, ...).
            // Not retried here: the default queue holds 100000 messages, far
            // beyond one search page, so only oversized payloads land here.
            Err((err, _)) => Box::pin(std::future::ready(SendOutcome::failed(err.to_string()))),
        }
    }

    async fn close(&self) -> Result<(), SinkError> {
        let producer = self.producer.clone();
        let timeout = self.flush_timeout;
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout))).await??;
        Ok(())
    }
}

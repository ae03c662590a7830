//! At-least-once fan-out of a fetched batch onto a single topic.
//!
//! ```text
//! records ──▶ OutboundMessage ──▶ sink.submit ──▶ Delivery ──▶ ack task
//!   (in order)                      (enqueue only)           (logs failures)
//!                                                  │
//!                        after last submit: sink.close (flush) ──▶ join acks
//! ```
//!
//! The publisher never retries. Retries and duplicate suppression belong to
//! the sink (the idempotent Kafka producer).

use tokio::task::JoinHandle;

use crate::kafka::MessageSink;
use crate::metrics::PublisherMetrics;
use crate::models::{BatchReport, DeliveryFailure, OutboundMessage, Record, SendOutcome};

pub struct BatchPublisher {
    topic: String,
    metrics: PublisherMetrics,
}

impl BatchPublisher {
    pub fn new(topic: impl Into<String>, metrics: PublisherMetrics) -> Self {
        Self {
            topic: topic.into(),
            metrics,
        }
    }

    /// Submit every record as its own message, then close the sink.
    ///
    /// Never fails: delivery errors are logged and counted in the report.
    /// The sink is consumed and closed exactly once, even for an empty batch.
    pub async fn publish<S: MessageSink>(
        &self,
        records: Option<Vec<Record>>,
        sink: S,
    ) -> BatchReport {
        let records = records.unwrap_or_default();
        if records.is_empty() {
            tracing::info!(topic = %self.topic, "no records");
            self.release(&sink).await;
            return BatchReport::default();
        }

        let mut acks: Vec<JoinHandle<(String, SendOutcome)>> = Vec::with_capacity(records.len());
        for record in records {
            let message = OutboundMessage::from_record(&self.topic, record);
            tracing::info!(
                topic = %message.topic,
                key = %message.key,
                value = %message.value,
                "sending record"
            );
            let key = message.key.clone();
            let delivery = sink.submit(message);
            self.metrics.messages_submitted_total.inc();
            acks.push(tokio::spawn(track_delivery(key, delivery, self.metrics.clone())));
        }

        self.release(&sink).await;

        let mut report = BatchReport {
            submitted: acks.len(),
            ..BatchReport::default()
        };
        for ack in acks {
            let (key, outcome) = match ack.await {
                Ok(settled) => settled,
                Err(e) => {
                    tracing::error!("delivery task aborted: {e}");
                    self.metrics.deliveries_failed_total.inc();
                    let reason = format!("delivery task aborted: {e}");
                    (String::new(), SendOutcome::failed(reason))
                }
            };
            match outcome {
                SendOutcome::Acked { .. } => report.acked += 1,
                SendOutcome::Failed { reason } => {
                    report.failed += 1;
                    report.failures.push(DeliveryFailure { key, reason });
                }
            }
        }

        tracing::info!(
            topic = %self.topic,
            submitted = report.submitted,
            acked = report.acked,
            failed = report.failed,
            "batch published"
        );
        report
    }

    async fn release<S: MessageSink>(&self, sink: &S) {
        if let Err(e) = sink.close().await {
            tracing::error!(topic = %self.topic, "sink close failed: {e}");
        }
    }
}

/// Acknowledgement callback for one message. Runs concurrently with later
/// submissions and with other acknowledgements.
async fn track_delivery(
    key: String,
    delivery: crate::kafka::Delivery,
    metrics: PublisherMetrics,
) -> (String, SendOutcome) {
    let outcome = delivery.await;
    match &outcome {
        SendOutcome::Acked { partition, offset } => {
            metrics.deliveries_acked_total.inc();
            tracing::debug!(key = %key, partition, offset, "record acknowledged");
        }
        SendOutcome::Failed { reason } => {
            metrics.deliveries_failed_total.inc();
            tracing::error!(key = %key, reason = %reason, "record delivery failed");
        }
    }
    (key, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::kafka::Delivery;
    use async_trait::async_trait;
    use prometheus::Registry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FailingClose {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MessageSink for FailingClose {
        fn submit(&self, _message: OutboundMessage) -> Delivery {
            Box::pin(async {
                SendOutcome::Acked {
                    partition: 0,
                    offset: 0,
                }
            })
        }

        async fn close(&self) -> Result<(), SinkError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Err(SinkError::Kafka(rdkafka::error::KafkaError::Flush(
                rdkafka::error::RDKafkaErrorCode::OperationTimedOut,
            )))
        }
    }

    #[tokio::test]
    async fn close_failure_is_swallowed() {
        let closes = Arc::new(AtomicUsize::new(0));
        let metrics = PublisherMetrics::new(&Registry::new()).unwrap();
        let publisher = BatchPublisher::new("topic_x", metrics);
        let report = publisher
            .publish(
                Some(vec![Record::new("1", "hello kafka")]),
                FailingClose {
                    closes: Arc::clone(&closes),
                },
            )
            .await;

        assert_eq!(report.acked, 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn metrics_track_outcomes() {
        let metrics = PublisherMetrics::new(&Registry::new()).unwrap();
        let publisher = BatchPublisher::new("topic_x", metrics.clone());
        publisher
            .publish(
                Some(vec![Record::new("1", "a"), Record::new("2", "b")]),
                FailingClose {
                    closes: Arc::new(AtomicUsize::new(0)),
                },
            )
            .await;

        assert_eq!(metrics.messages_submitted_total.get(), 2);
        assert_eq!(metrics.deliveries_acked_total.get(), 2);
        assert_eq!(metrics.deliveries_failed_total.get(), 0);
    }
}

use prometheus::{IntCounter, Opts, Registry};

/// Counters for one producer process. Cheap to clone; clones share values.
#[derive(Clone)]
pub struct PublisherMetrics {
    pub records_fetched_total: IntCounter,
    pub messages_submitted_total: IntCounter,
    pub deliveries_acked_total: IntCounter,
    pub deliveries_failed_total: IntCounter,
}

impl PublisherMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let fetched = IntCounter::with_opts(Opts::new(
            "twitter_producer_records_fetched_total",
            "Records returned by the search API",
        ))?;
        let submitted = IntCounter::with_opts(Opts::new(
            "twitter_producer_messages_submitted_total",
            "Messages handed to the Kafka producer",
        ))?;
        let acked = IntCounter::with_opts(Opts::new(
            "twitter_producer_deliveries_acked_total",
            "Messages acknowledged by the broker",
        ))?;
        let failed = IntCounter::with_opts(Opts::new(
            "twitter_producer_deliveries_failed_total",
            "Messages whose delivery failed",
        ))?;

        registry.register(Box::new(fetched.clone()))?;
        registry.register(Box::new(submitted.clone()))?;
        registry.register(Box::new(acked.clone()))?;
        registry.register(Box::new(failed.clone()))?;

        Ok(Self {
            records_fetched_total: fetched,
            messages_submitted_total: submitted,
            deliveries_acked_total: acked,
            deliveries_failed_total: failed,
        })
    }
}

pub fn gather(registry: &Registry) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buf) {
        tracing::warn!("metrics encode failed: {e}");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_text_exposition() {
        let registry = Registry::new();
        let metrics = PublisherMetrics::new(&registry).unwrap();
        metrics.messages_submitted_total.inc_by(2);
        metrics.deliveries_failed_total.inc();

        let text = gather(&registry);
        assert!(text.contains("twitter_producer_messages_submitted_total 2"));
        assert!(text.contains("twitter_producer_deliveries_failed_total 1"));
    }

    #[test]
    fn double_registration_is_rejected() {
        let registry = Registry::new();
        PublisherMetrics::new(&registry).unwrap();
        assert!(PublisherMetrics::new(&registry).is_err());
    }
}

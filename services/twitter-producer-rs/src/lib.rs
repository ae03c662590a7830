//! Fetches recent tweets for a search query and republishes each one onto a
//! Kafka topic, keyed by tweet id, through the idempotent producer.

pub mod config;
pub mod error;
pub mod kafka;
pub mod metrics;
pub mod models;
pub mod publisher;
pub mod twitter;

use anyhow::Context;
use prometheus::Registry;

use crate::config::Config;
use crate::kafka::{KafkaSink, MessageSink};
use crate::metrics::PublisherMetrics;
use crate::models::BatchReport;
use crate::publisher::BatchPublisher;
use crate::twitter::{RecordSource, SearchQuery, TwitterSource};

/// One full pass: search, then publish whatever came back.
pub async fn run(config: &Config, registry: &Registry) -> anyhow::Result<Option<BatchReport>> {
    let metrics = PublisherMetrics::new(registry).context("registering metrics")?;
    let source = TwitterSource::new(
        config.twitter_api_base_url.as_str(),
        config.twitter_bearer_token.as_str(),
        config.http_timeout(),
    )?;
    let publisher = BatchPublisher::new(config.kafka_topic.as_str(), metrics.clone());
    let settings = config.producer_settings();

    run_with(&source, &config.search_query(), &publisher, &metrics, || {
        KafkaSink::new(&settings).context("creating kafka producer")
    })
    .await
}

/// Fetch from `source` and publish through a sink built by `make_sink`.
///
/// Fetch errors propagate. An absent or empty result ends the run without
/// building a sink and yields `Ok(None)`.
pub async fn run_with<R, S, F>(
    source: &R,
    query: &SearchQuery,
    publisher: &BatchPublisher,
    metrics: &PublisherMetrics,
    make_sink: F,
) -> anyhow::Result<Option<BatchReport>>
where
    R: RecordSource,
    S: MessageSink,
    F: FnOnce() -> anyhow::Result<S>,
{
    let records = source
        .fetch(query)
        .await
        .with_context(|| format!("searching tweets for {:?}", query.query))?;

    let records = match records {
        Some(records) if !records.is_empty() => records,
        _ => {
            tracing::info!(query = %query.query, "no records");
            return Ok(None);
        }
    };
    metrics.records_fetched_total.inc_by(records.len() as u64);

    let sink = make_sink()?;
    let report = publisher.publish(Some(records), sink).await;
    Ok(Some(report))
}

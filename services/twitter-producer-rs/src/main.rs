use prometheus::Registry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use twitter_producer::{config::Config, metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        topic = %config.kafka_topic,
        bootstrap = %config.kafka_bootstrap_servers,
        query = %config.twitter_search_query,
        "starting twitter-producer-rs"
    );

    let registry = Registry::new();
    match twitter_producer::run(&config, &registry).await? {
        Some(report) if !report.is_clean() => {
            tracing::warn!(
                failed = report.failed,
                submitted = report.submitted,
                "some records were not delivered"
            );
        }
        Some(report) => tracing::info!(submitted = report.submitted, "all records delivered"),
        None => tracing::info!("nothing to publish"),
    }

    tracing::debug!(metrics = %metrics::gather(&registry), "final metrics");
    Ok(())
}

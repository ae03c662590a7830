use thiserror::Error;

/// Failures of the upstream search call. All of them abort the run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("twitter request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("twitter returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("twitter reported errors: {0}")]
    Api(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("flush task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid environment: {0}")]
    Env(#[from] envy::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

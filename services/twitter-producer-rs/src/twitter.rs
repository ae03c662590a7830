use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::SourceError;
use crate::models::{Record, SearchResponse};

/// Parameters of one recent-search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: u32,
    pub tweet_fields: BTreeSet<String>,
}

impl SearchQuery {
    fn tweet_fields_param(&self) -> String {
        self.tweet_fields
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Upstream that yields the batch to republish.
/// `Ok(None)` means the call succeeded but matched nothing.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, query: &SearchQuery) -> Result<Option<Vec<Record>>, SourceError>;
}

/// Twitter API v2 recent search, authenticated with an app bearer token.
pub struct TwitterSource {
    base_url: String,
    bearer_token: String,
    http: reqwest::Client,
}

impl TwitterSource {
    pub fn new(
        base_url: impl Into<String>,
        bearer_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
            http,
        })
    }
}

#[async_trait]
impl RecordSource for TwitterSource {
    async fn fetch(&self, query: &SearchQuery) -> Result<Option<Vec<Record>>, SourceError> {
        let url = format!("{}/2/tweets/search/recent", self.base_url);
        let max_results = query.max_results.to_string();
        let fields = query.tweet_fields_param();

        let mut params = vec![
            ("query", query.query.as_str()),
            ("max_results", max_results.as_str()),
        ];
        if !fields.is_empty() {
            params.push(("tweet.fields", fields.as_str()));
        }

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }

        let body = resp.json::<SearchResponse>().await?;
        match (body.data, body.errors) {
            (Some(tweets), _) => {
                tracing::info!(query = %query.query, count = tweets.len(), "fetched tweets");
                Ok(Some(tweets.into_iter().map(Record::from).collect()))
            }
            (None, Some(errors)) if !errors.is_empty() => Err(SourceError::Api(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )),
            (None, _) => {
                let count = body.meta.map(|m| m.result_count).unwrap_or(0);
                tracing::info!(query = %query.query, result_count = count, "search matched no tweets");
                Ok(None)
            }
        }
    }
}

use serde::{Deserialize, Serialize};

// ── Publisher domain ──────────────────────────────────────────────────────────

/// One fetched unit of external data, republished as a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub body: String,
}

impl Record {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }
}

/// Broker-ready form of a [`Record`]: key is the record id, value is the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub key: String,
    pub value: String,
}

impl OutboundMessage {
    pub fn from_record(topic: &str, record: Record) -> Self {
        Self {
            topic: topic.to_string(),
            key: record.id,
            value: record.body,
        }
    }
}

/// Result of a single submission once the sink has settled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Acked { partition: i32, offset: i64 },
    Failed { reason: String },
}

impl SendOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Summary of one publish pass. Failures keep submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub submitted: usize,
    pub acked: usize,
    pub failed: usize,
    pub failures: Vec<DeliveryFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub key: String,
    pub reason: String,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

// ── Twitter v2 wire types ─────────────────────────────────────────────────────

/// Response body of `GET /2/tweets/search/recent`.
/// `data` is omitted by the API when nothing matched.
#[derive(Debug, Deserialize, Serialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Option<Vec<Tweet>>,
    #[serde(default)]
    pub meta: Option<SearchMeta>,
    #[serde(default)]
    pub errors: Option<Vec<ApiProblem>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchMeta {
    #[serde(default)]
    pub result_count: u32,
    #[serde(default)]
    pub newest_id: Option<String>,
    #[serde(default)]
    pub oldest_id: Option<String>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Problem object returned in the `errors` array of a v2 response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiProblem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl std::fmt::Display for ApiProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let title = self.title.as_deref().unwrap_or("unknown problem");
        match &self.detail {
            Some(detail) => write!(f, "{title}: {detail}"),
            None => f.write_str(title),
        }
    }
}

impl From<Tweet> for Record {
    fn from(tweet: Tweet) -> Self {
        Record::new(tweet.id, tweet.text)
    }
}

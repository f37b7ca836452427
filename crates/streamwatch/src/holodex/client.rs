//! Holodex `/live` endpoint client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::types::{StreamRecord, StreamStatus};
use crate::error::SourceError;

/// Default Holodex API base URL.
pub const DEFAULT_API_BASE: &str = "https://holodex.net/api/v2";

/// Header carrying the Holodex API key.
const API_KEY_HEADER: &str = "X-APIKEY";

/// One `/live` query: a status filter plus an optional mentioned channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamQuery {
    /// Status filter.
    pub status: StreamStatus,
    /// Only return streams that mention this channel.
    pub mentioned_channel_id: Option<String>,
}

impl StreamQuery {
    /// Unfiltered query for a status.
    #[must_use]
    pub const fn all(status: StreamStatus) -> Self {
        Self {
            status,
            mentioned_channel_id: None,
        }
    }

    /// Query for streams of a status that mention a channel.
    #[must_use]
    pub fn mentioning(status: StreamStatus, channel_id: impl Into<String>) -> Self {
        Self {
            status,
            mentioned_channel_id: Some(channel_id.into()),
        }
    }
}

impl fmt::Display for StreamQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mentioned_channel_id {
            Some(id) => write!(f, "status={} mentioned_channel_id={id}", self.status),
            None => write!(f, "status={}", self.status),
        }
    }
}

/// Source of raw stream records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Run one query against the source.
    async fn fetch(&self, query: &StreamQuery) -> Result<Vec<StreamRecord>, SourceError>;
}

/// HTTP client for the Holodex API.
pub struct HolodexClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HolodexClient {
    /// Create a client. `timeout` bounds each request end to end.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn live_url(&self) -> String {
        format!("{}/live", self.base_url)
    }
}

#[async_trait]
impl StreamSource for HolodexClient {
    async fn fetch(&self, query: &StreamQuery) -> Result<Vec<StreamRecord>, SourceError> {
        let mut request = self
            .client
            .get(self.live_url())
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("status", query.status.as_str())]);
        if let Some(channel_id) = &query.mentioned_channel_id {
            request = request.query(&[("mentioned_channel_id", channel_id.as_str())]);
        }

        debug!(query = %query, "Querying Holodex");

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let records = parse_streams(&body)?;
        debug!(query = %query, count = records.len(), "Holodex query complete");
        Ok(records)
    }
}

/// Parse a `/live` response body.
///
/// The body must be a JSON array; elements that do not decode as a stream
/// record are skipped individually.
pub(crate) fn parse_streams(body: &str) -> Result<Vec<StreamRecord>, SourceError> {
    let values: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let mut records = Vec::with_capacity(values.len());

    for value in values {
        match serde_json::from_value::<StreamRecord>(value) {
            Ok(record) => records.push(record),
            Err(e) => warn!(error = %e, "Skipping malformed stream record"),
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stream_json(id: &str, channel: &str, status: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "title": format!("{id} title"),
            "status": status,
            "channel": { "id": channel, "name": format!("{channel} name") },
        })
    }

    #[test]
    fn test_parse_skips_malformed_elements() {
        let body = serde_json::json!([
            stream_json("a", "UC1", "live"),
            { "id": "broken" },
            stream_json("b", "UC2", "upcoming"),
        ])
        .to_string();

        let records = parse_streams(&body).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(matches!(
            parse_streams(r#"{"message":"oops"}"#),
            Err(SourceError::Decode(_))
        ));
    }

    #[test]
    fn test_query_display() {
        assert_eq!(StreamQuery::all(StreamStatus::Live).to_string(), "status=live");
        assert_eq!(
            StreamQuery::mentioning(StreamStatus::Upcoming, "UC1").to_string(),
            "status=upcoming mentioned_channel_id=UC1"
        );
    }

    #[tokio::test]
    async fn test_fetch_sends_filters_and_api_key() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/live"))
            .and(query_param("status", "upcoming"))
            .and(query_param("mentioned_channel_id", "UC1"))
            .and(header("X-APIKEY", "secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([stream_json("s1", "UC9", "upcoming")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HolodexClient::new(server.uri(), "secret", Duration::from_secs(5)).unwrap();
        let records = client
            .fetch(&StreamQuery::mentioning(StreamStatus::Upcoming, "UC1"))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].channel.id, "UC9");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/live"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = HolodexClient::new(server.uri(), "wrong", Duration::from_secs(5)).unwrap();
        let err = client
            .fetch(&StreamQuery::all(StreamStatus::Live))
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::Status { status: 403, .. }));
    }
}

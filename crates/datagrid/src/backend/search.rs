//! HTTP search engine client (Elasticsearch-compatible `_search` API).

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{SearchClient, SearchResponse};
use crate::error::DatagridResult;

/// Posts search bodies to `{base_url}/{index}/_search`.
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSearchClient {
    /// Create a client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing reqwest client.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn search_url(&self, index: &str) -> String {
        format!("{}/{}/_search", self.base_url, index)
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn search(&self, index: &str, body: &Value) -> DatagridResult<SearchResponse> {
        let url = self.search_url(index);
        debug!(url = %url, body = %body, "sending search request");

        let response: Value = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(SearchResponse::from_body(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_strips_trailing_slash() {
        let client = HttpSearchClient::new("http://127.0.0.1:9200/");
        assert_eq!(
            client.search_url("articles"),
            "http://127.0.0.1:9200/articles/_search"
        );
    }
}

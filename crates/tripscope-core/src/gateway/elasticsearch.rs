//! Elasticsearch over HTTP

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{SearchGateway, SearchResponse};
use crate::config::ElasticsearchConfig;
use crate::error::{Error, Result};
use crate::query::QueryDocument;
use crate::telemetry;

#[derive(Debug, Clone)]
enum Auth {
    None,
    Basic { username: String, password: Option<String> },
    ApiKey(String),
}

/// [`SearchGateway`] backed by the `_search` REST endpoint
#[derive(Debug, Clone)]
pub struct ElasticsearchGateway {
    client: Client,
    endpoint: Url,
    auth: Auth,
    max_retries: u32,
}

impl ElasticsearchGateway {
    /// Build a gateway from connection settings
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let endpoint = config.endpoint()?;
        let endpoint = Url::parse(&format!("{endpoint}/"))
            .map_err(|e| Error::config(format!("invalid elasticsearch endpoint '{endpoint}': {e}")))?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        let auth = match (&config.api_key, &config.username) {
            (Some(key), _) => Auth::ApiKey(key.clone()),
            (None, Some(username)) => Auth::Basic {
                username: username.clone(),
                password: config.password.clone(),
            },
            (None, None) => Auth::None,
        };

        Ok(Self {
            client,
            endpoint,
            auth,
            max_retries: config.max_retries,
        })
    }

    fn search_url(&self, index: &str) -> Result<Url> {
        self.endpoint
            .join(&format!("{index}/_search"))
            .map_err(|e| Error::config(format!("invalid index name '{index}': {e}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::None => request,
            Auth::Basic { username, password } => request.basic_auth(username, password.as_ref()),
            Auth::ApiKey(key) => request.header("Authorization", format!("ApiKey {key}")),
        }
    }

    async fn send(&self, url: &Url, body: &Value, timeout: Duration) -> Result<reqwest::Response> {
        let timeout_error = || Error::SearchTimeout {
            timeout_ms: timeout.as_millis() as u64,
        };

        let mut attempt = 0;
        loop {
            let request = self
                .authorize(self.client.post(url.clone()))
                .timeout(timeout)
                .json(body);

            match request.send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_timeout() => return Err(timeout_error()),
                Err(e) if e.is_connect() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, max_retries = self.max_retries, "Search connection failed, retrying");
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
                }
                Err(e) => return Err(Error::backend(format!("search request failed: {e}"))),
            }
        }
    }

    async fn execute(&self, index: &str, query: &QueryDocument, timeout: Duration) -> Result<SearchResponse> {
        let url = self.search_url(index)?;
        let body = query.to_body()?;

        let response = self.send(&url, &body, timeout).await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => Error::SearchTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                },
                _ => Error::backend(format!("{index} search returned {status}: {detail}")),
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                Error::SearchTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                Error::backend(format!("unreadable search response: {e}"))
            }
        })?;

        SearchResponse::from_body(body)
    }
}

#[async_trait]
impl SearchGateway for ElasticsearchGateway {
    async fn search(
        &self,
        index: &str,
        query: &QueryDocument,
        timeout: Duration,
    ) -> Result<SearchResponse> {
        let started = Instant::now();
        let result = self.execute(index, query, timeout).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(response) => {
                telemetry::record_search(index, "ok", elapsed);
                debug!(
                    index,
                    took_ms = response.took,
                    total = response.total,
                    returned = response.hits.len(),
                    "Search completed"
                );
            }
            Err(e) => {
                telemetry::record_search(index, e.kind(), elapsed);
                warn!(index, error = %e, "Search failed");
            }
        }
        result
    }
}

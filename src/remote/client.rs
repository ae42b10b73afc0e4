use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::types::SearchResponse;
use crate::storage::Article;

/// Public HN search API.
pub const DEFAULT_BASE_URL: &str = "https://hn.algolia.com/api/v1";
/// Search term used when none is configured.
pub const DEFAULT_QUERY: &str = "android";

const MAX_RETRIES: u32 = 3;
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a page of articles.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Body was not a valid search page
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// Base URL could not be parsed
    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Plain HTTP is only allowed against localhost
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
}

impl FetchError {
    /// True when the failure says "the network is not there" rather than
    /// "the server answered badly".
    pub fn is_connectivity(&self) -> bool {
        match self {
            FetchError::Timeout => true,
            FetchError::Network(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

/// Source of fresh articles.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch the first page of results for `query`. No pagination.
    async fn fetch_articles(&self, query: &str) -> Result<Vec<Article>, FetchError>;
}

/// Client for the HN Algolia `search_by_date` endpoint.
#[derive(Clone)]
pub struct HnClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry_delay: Duration,
}

impl HnClient {
    /// Build a client for `base_url`.
    ///
    /// # Errors
    ///
    /// [`FetchError::InvalidUrl`] if `base_url` does not parse,
    /// [`FetchError::InsecureBaseUrl`] if it is plain HTTP to anything but
    /// localhost.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let parsed = Url::parse(base_url)?;
        if parsed.scheme() != "https" {
            let is_localhost = parsed.scheme() == "http"
                && matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1"));
            if !is_localhost {
                tracing::error!(base_url = %base_url, "Rejecting non-HTTPS base URL");
                return Err(FetchError::InsecureBaseUrl);
            }
            tracing::warn!(base_url = %base_url, "Using non-HTTPS base URL (localhost only)");
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("hn-reader/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Base delay for retry backoff (doubles per attempt). Default 1s.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn search_url(&self, query: &str) -> Result<Url, FetchError> {
        let endpoint = format!("{}/search_by_date", self.base_url);
        Ok(Url::parse_with_params(&endpoint, &[("query", query)])?)
    }

    /// Fetch and decode one page of search results.
    ///
    /// 429 and 5xx responses, as well as truncated bodies, are retried up
    /// to 3 times with exponential backoff; other 4xx fail immediately.
    pub async fn search(&self, query: &str) -> Result<SearchResponse, FetchError> {
        let url = self.search_url(query)?;
        let mut retry_count = 0;

        let bytes = loop {
            let response =
                tokio::time::timeout(self.timeout, self.client.get(url.clone()).send())
                    .await
                    .map_err(|_| FetchError::Timeout)?
                    .map_err(FetchError::Network)?;

            let status = response.status();
            let retryable =
                status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error();

            if retryable {
                if retry_count >= MAX_RETRIES {
                    return Err(if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        FetchError::RateLimited(MAX_RETRIES)
                    } else {
                        FetchError::HttpStatus(status.as_u16())
                    });
                }
                let delay = self.retry_delay * 2u32.pow(retry_count);
                tracing::warn!(
                    url = %url,
                    status = %status,
                    retry = retry_count + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Search request failed, backing off"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            match read_limited_bytes(response, MAX_RESPONSE_SIZE).await {
                Ok(bytes) => break bytes,
                Err(FetchError::IncompleteResponse { expected, received })
                    if retry_count < MAX_RETRIES =>
                {
                    let delay = self.retry_delay * 2u32.pow(retry_count);
                    tracing::debug!(
                        url = %url,
                        expected,
                        received,
                        attempt = retry_count + 1,
                        "Retrying incomplete download"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let page: SearchResponse = serde_json::from_slice(&bytes)?;
        tracing::debug!(
            query,
            hits = page.hits.len(),
            page = page.page,
            nb_pages = page.nb_pages,
            nb_hits = page.nb_hits,
            "Fetched search page"
        );
        Ok(page)
    }
}

#[async_trait]
impl RemoteSource for HnClient {
    async fn fetch_articles(&self, query: &str) -> Result<Vec<Article>, FetchError> {
        let page = self.search(query).await?;
        Ok(page.hits.into_iter().map(|hit| hit.into_article()).collect())
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

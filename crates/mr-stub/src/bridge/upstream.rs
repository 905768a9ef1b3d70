//! Outbound port to the upstream broker, plus its HTTP adapter.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Errors from an upstream call. All of them are retried by the relay.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Upstream broker as seen by the relay loops.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// POST `body` to `url`. Succeeds only on a 2xx answer.
    async fn post(&self, url: &str, content_type: &str, body: String) -> Result<(), UpstreamError>;

    /// GET `url` and return the body of a 2xx answer.
    async fn get(&self, url: &str) -> Result<String, UpstreamError>;
}

/// [`Upstream`] over HTTP.
pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    /// Create a client whose requests give up after `timeout`.
    ///
    /// The timeout must exceed the upstream's own long-poll window, or every
    /// idle read would surface as an error.
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { client })
    }
}

fn connect_error(url: &str, e: reqwest::Error) -> UpstreamError {
    if e.is_connect() {
        UpstreamError::Connection(format!("Cannot connect to {}", url))
    } else {
        UpstreamError::Http(e)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn post(&self, url: &str, content_type: &str, body: String) -> Result<(), UpstreamError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| connect_error(url, e))?;
        check_status(response).await?;
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<String, UpstreamError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| connect_error(url, e))?;
        Ok(check_status(response).await?.text().await?)
    }
}

use crate::cache::BatchView;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use thiserror::Error;

/// Static identification header sent with every request to the mothership.
pub const AGENT_HEADER: &str = "x-sse-reporter";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("could not encode batch: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },
    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },
}

/// Delivers one batch. Implementations only read the view; clearing the
/// cache afterwards is the scheduler's job.
#[allow(async_fn_in_trait)]
pub trait Reporter {
    async fn send(&mut self, batch: BatchView<'_>) -> Result<(), ReportError>;
}

/// Client shared by registration and reporting. No request timeout is set.
pub fn build_client(version: &str) -> Client {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(version) {
        headers.insert(AGENT_HEADER, value);
    }
    Client::builder()
        .user_agent(format!("sse-reporter/{version}"))
        .default_headers(headers)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// POSTs a JSON value and treats anything but 2xx as a failure.
async fn post_json(
    client: &Client,
    url: &str,
    body: Vec<u8>,
) -> Result<reqwest::Response, ReportError> {
    let response = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(|source| ReportError::Transport {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ReportError::Status {
            url: url.to_string(),
            status,
        });
    }
    Ok(response)
}

pub struct HttpReporter {
    client: Client,
    collector_url: String,
}

impl HttpReporter {
    pub fn new(client: Client, collector_url: impl Into<String>) -> Self {
        Self {
            client,
            collector_url: collector_url.into(),
        }
    }
}

impl Reporter for HttpReporter {
    async fn send(&mut self, batch: BatchView<'_>) -> Result<(), ReportError> {
        let body = serde_json::to_vec(&batch).map_err(ReportError::Encode)?;
        post_json(&self.client, &self.collector_url, body).await?;
        Ok(())
    }
}

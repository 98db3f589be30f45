//! Client for the IPQS bulk email validation API.
//!
//! Three service endpoints plus the result download. Each call is a single
//! request with no retry; failures surface immediately as [`ClientError`].
//! A response with `"success": false` is not an error here, it is returned
//! as data for the orchestrator to act on.
//!
//! ```rust,ignore
//! use ipqs_validation::client::{IpqsClient, ValidationApi};
//! use ipqs_validation::config::HttpTimeouts;
//!
//! let client = IpqsClient::new("API_KEY", &HttpTimeouts::default())?;
//! let submitted = client
//!     .submit_batch("ACME_leads.csv", &[vec!["a@x.com".into()]])
//!     .await?;
//! let status = client.poll_status(submitted.id.as_deref().unwrap_or_default()).await?;
//! ```

pub mod types;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::{HttpTimeouts, Settings, DEFAULT_BASE_URL};
use crate::error::{ClientError, ClientResult};
use crate::validation::{parse_results, ValidationRecord};

pub use types::{BatchSummary, Downloads, ListResponse, StatusResponse, SubmitResponse};

/// Operations the workflow needs from the validation service.
#[async_trait]
pub trait ValidationApi: Send + Sync {
    /// Submit a batch of single-element email rows under `file_name`.
    async fn submit_batch(&self, file_name: &str, rows: &[Vec<String>]) -> ClientResult<SubmitResponse>;

    /// Current status of a job.
    async fn poll_status(&self, job_id: &str) -> ClientResult<StatusResponse>;

    /// All batches previously submitted with this API key.
    async fn list_batches(&self) -> ClientResult<ListResponse>;

    /// Download and parse a result file.
    async fn fetch_results(&self, url: &str) -> ClientResult<Vec<ValidationRecord>>;
}

/// HTTP implementation of [`ValidationApi`].
#[derive(Clone)]
pub struct IpqsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl IpqsClient {
    /// Create a client against the public API.
    ///
    /// Every request is bounded by `timeouts`; a stalled service surfaces
    /// as [`ClientError::RequestFailed`].
    pub fn new(api_key: impl Into<String>, timeouts: &HttpTimeouts) -> ClientResult<Self> {
        let http = timeouts.client().map_err(|e| ClientError::Build(e.to_string()))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Create a client from loaded settings.
    pub fn from_settings(settings: &Settings) -> ClientResult<Self> {
        Ok(Self::new(settings.api_key.clone(), &settings.timeouts)?.with_base_url(&settings.base_url))
    }

    /// Point the client at another base URL (trailing `/` added if missing).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Read a response body, mapping non-2xx statuses to [`ClientError::HttpStatus`].
    async fn read_body(response: reqwest::Response) -> ClientResult<Vec<u8>> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body[..body.len().min(500)]).into_owned(),
            });
        }
        Ok(body.to_vec())
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let body = Self::read_body(response).await?;
        serde_json::from_slice(&body).map_err(|e| ClientError::InvalidJson(e.to_string()))
    }
}

#[async_trait]
impl ValidationApi for IpqsClient {
    async fn submit_batch(&self, file_name: &str, rows: &[Vec<String>]) -> ClientResult<SubmitResponse> {
        let body = json!({
            "type": "email",
            "file_name": file_name,
            "key": self.api_key,
            "input": rows,
        });

        let response = self
            .http
            .post(self.url("csv/upload"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        Self::read_json(response).await
    }

    async fn poll_status(&self, job_id: &str) -> ClientResult<StatusResponse> {
        let response = self
            .http
            .get(self.url(&format!("csv/{}/status/{}", self.api_key, job_id)))
            .send()
            .await
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        Self::read_json(response).await
    }

    async fn list_batches(&self) -> ClientResult<ListResponse> {
        let response = self
            .http
            .get(self.url(&format!("csv/{}/list", self.api_key)))
            .send()
            .await
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        Self::read_json(response).await
    }

    async fn fetch_results(&self, url: &str) -> ClientResult<Vec<ValidationRecord>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        let body = Self::read_body(response).await?;
        parse_results(&body)
    }
}

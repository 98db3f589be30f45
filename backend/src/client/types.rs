//! Wire types of the IPQS bulk validation API.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::JobStatus;

/// Job ids come back as numbers from some endpoints and strings from others.
fn id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Response to `POST csv/upload`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubmitResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "id_as_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub message: String,
}

/// Result file links of a finished job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Downloads {
    #[serde(default)]
    pub all: Option<String>,
}

/// Response to `GET csv/{key}/status/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub downloads: Option<Downloads>,
    #[serde(default)]
    pub request_id: String,
}

impl StatusResponse {
    /// Status string as sent, `""` when absent.
    pub fn status_str(&self) -> &str {
        self.status.as_ref().map(JobStatus::as_str).unwrap_or("")
    }

    /// Result file URL, only meaningful once the job is finished.
    pub fn download_link(&self) -> Option<&str> {
        self.downloads
            .as_ref()
            .and_then(|d| d.all.as_deref())
            .filter(|url| !url.trim().is_empty())
    }
}

/// One entry of `GET csv/{key}/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchSummary {
    pub file_name: String,
    pub status_url: String,
    pub status: JobStatus,
}

impl BatchSummary {
    /// Job id: the path segment after the last `/status/`.
    pub fn csv_id(&self) -> &str {
        self.status_url
            .rsplit_once("/status/")
            .map(|(_, id)| id)
            .unwrap_or(&self.status_url)
            .trim_end_matches('/')
    }
}

/// Response to `GET csv/{key}/list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub csvs: Vec<BatchSummary>,
    #[serde(default)]
    pub message: String,
}

//! Rediscovery of batches previously submitted for an account.

use serde::Serialize;

use crate::api::logs::{log_info, log_info_indent, log_warning};
use crate::client::ValidationApi;
use crate::error::{ClientError, WorkflowResult};
use crate::models::JobStatus;
use crate::validation::ValidationRecord;

/// A prior batch and, when finished, its results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub csv_id: String,
    pub file_name: String,
    pub status: JobStatus,
    pub download_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<ValidationRecord>>,
}

/// Whether a batch file name belongs to `account` (case-insensitive prefix).
pub fn belongs_to(file_name: &str, account: &str) -> bool {
    file_name
        .to_lowercase()
        .starts_with(&account.trim().to_lowercase())
}

/// List the account's batches, fetching results of finished ones.
///
/// Only the listing itself can fail, including a listing answered with
/// `"success": false`. A status check or download that fails
/// for one batch is logged and leaves that entry without results.
pub async fn fetch_history(api: &dyn ValidationApi, account: &str) -> WorkflowResult<Vec<HistoryEntry>> {
    let listing = api.list_batches().await?;
    if !listing.success {
        log_warning(&format!("Batch listing rejected: {}", listing.message));
        return Err(ClientError::Rejected(listing.message).into());
    }
    let mut entries = Vec::new();

    for batch in listing.csvs.iter().filter(|b| belongs_to(&b.file_name, account)) {
        let mut entry = HistoryEntry {
            csv_id: batch.csv_id().to_string(),
            file_name: batch.file_name.clone(),
            status: batch.status.clone(),
            download_link: None,
            records: None,
        };

        if batch.status == JobStatus::Finished {
            match api.poll_status(&entry.csv_id).await {
                Ok(status) => entry.download_link = status.download_link().map(str::to_string),
                Err(e) => log_warning(format!("Status check for {} failed: {}", entry.csv_id, e)),
            }
            if let Some(url) = &entry.download_link {
                match api.fetch_results(url).await {
                    Ok(records) => entry.records = Some(records),
                    Err(e) => log_warning(format!("Download for {} failed: {}", entry.csv_id, e)),
                }
            }
        }

        log_info_indent(
            format!("{} {} [{}]", entry.csv_id, entry.file_name, entry.status),
            1,
        );
        entries.push(entry);
    }

    if entries.is_empty() {
        log_warning(format!("No CSVs found with {} prefix.", account.trim().to_uppercase()));
    } else {
        log_info(format!("📋 {} batches for {}", entries.len(), account.trim().to_uppercase()));
    }

    Ok(entries)
}

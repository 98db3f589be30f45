use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ipqs_validation::client::{Downloads, ListResponse};
use ipqs_validation::error::ClientResult;
use ipqs_validation::server::{router, AppState};
use ipqs_validation::{
    JobStatus, MemoryAuditLog, PollPolicy, StatusResponse, SubmitResponse, ValidationApi, ValidationRecord,
};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;

/// Answers every status check with the same status.
struct ScriptedApi {
    status: JobStatus,
    link: Option<String>,
    results: Vec<ValidationRecord>,
}

impl ScriptedApi {
    fn finalizing() -> Self {
        Self { status: JobStatus::Finalizing, link: None, results: Vec::new() }
    }

    fn finished() -> Self {
        Self {
            status: JobStatus::Finished,
            link: Some("https://files.example/results.csv".into()),
            results: vec![
                ValidationRecord::new("a@x.com", Some(false), Some(true), Some(false), Some(false), Some("none".into())),
                ValidationRecord::new("b@x.com", Some(false), Some(false), Some(false), Some(false), Some("none".into())),
            ],
        }
    }
}

#[async_trait]
impl ValidationApi for ScriptedApi {
    async fn submit_batch(&self, _file_name: &str, _rows: &[Vec<String>]) -> ClientResult<SubmitResponse> {
        Ok(SubmitResponse { success: true, id: Some("7".into()), ..Default::default() })
    }

    async fn poll_status(&self, _job_id: &str) -> ClientResult<StatusResponse> {
        Ok(StatusResponse {
            success: true,
            status: Some(self.status.clone()),
            downloads: Some(Downloads { all: self.link.clone() }),
            ..Default::default()
        })
    }

    async fn list_batches(&self) -> ClientResult<ListResponse> {
        Ok(ListResponse { success: true, ..Default::default() })
    }

    async fn fetch_results(&self, _url: &str) -> ClientResult<Vec<ValidationRecord>> {
        Ok(self.results.clone())
    }
}

async fn spawn_with(api: ScriptedApi) -> String {
    let state = AppState::new(Arc::new(api), Arc::new(MemoryAuditLog::new()), PollPolicy::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn() -> String {
    spawn_with(ScriptedApi::finalizing()).await
}

fn upload(file_name: &str, body: impl Into<Vec<u8>>) -> Form {
    Form::new().part("file", Part::bytes(body.into()).file_name(file_name.to_string()))
}

async fn post(base: &str, route: &str, form: Form) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}{}", base, route))
        .multipart(form)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let base = spawn().await;
    let body: Value = reqwest::get(format!("{}/health", base)).await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "ipqs-validation");
}

#[tokio::test]
async fn status_endpoint_reports_progress() {
    let base = spawn().await;
    let body: Value = reqwest::get(format!("{}/api/status/7", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["jobId"], "7");
    assert_eq!(body["status"], "FINALIZING");
    assert_eq!(body["progress"], 80);
    assert_eq!(body["downloadLink"], Value::Null);
}

#[tokio::test]
async fn batches_require_account() {
    let base = spawn().await;
    let response = reqwest::get(format!("{}/api/batches", base)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = reqwest::get(format!("{}/api/batches?account=acme", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["account"], "ACME");
    assert_eq!(body["batches"], Value::Array(Vec::new()));
}

#[tokio::test]
async fn upload_previews_contacts() {
    let base = spawn().await;
    let csv = "Name,Work Email\nAda,a@x.com\nBob,b@x.com\nCy,a@x.com\n";

    let response = post(&base, "/api/upload", upload("leads.csv", csv)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["fileName"], "leads.csv");
    assert_eq!(body["emailColumn"], "Work Email");
    assert_eq!(body["rowCount"], 3);
    assert_eq!(body["uniqueEmails"], 2);
}

#[tokio::test]
async fn upload_rejects_unknown_extension() {
    let base = spawn().await;
    let response = post(&base, "/api/upload", upload("leads.pdf", "%PDF-1.4")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn upload_accepts_large_files() {
    let base = spawn().await;
    let mut csv = String::from("Name,Email\n");
    let mut n = 0;
    while csv.len() < 3 * 1024 * 1024 {
        csv.push_str(&format!("Contact {},contact{}@example.com\n", n, n));
        n += 1;
    }

    let response = post(&base, "/api/upload", upload("big.csv", csv)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["rowCount"], n);
    assert_eq!(body["uniqueEmails"], n);
}

#[tokio::test]
async fn validate_requires_account() {
    let base = spawn_with(ScriptedApi::finished()).await;
    let response = post(&base, "/api/validate", upload("leads.csv", "Email\na@x.com\n")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn validate_requires_email_column() {
    let base = spawn_with(ScriptedApi::finished()).await;
    let form = upload("leads.csv", "Name,Phone\nAda,555\n").text("account", "acme");
    let response = post(&base, "/api/validate", form).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn validate_runs_to_labelled_downloads() {
    let base = spawn_with(ScriptedApi::finished()).await;
    let csv = "Name,Email\nAda,a@x.com\nBob,b@x.com\nCy,\n";
    let form = upload("leads.csv", csv).text("account", "acme");

    let response = post(&base, "/api/validate", form).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "finished");
    assert_eq!(body["batchName"], "ACME_leads");
    assert_eq!(body["jobId"], "7");
    assert_eq!(body["submitted"], 2);
    assert_eq!(body["labels"]["valid"], 1);
    assert_eq!(body["labels"]["invalid"], 1);
    assert_eq!(body["labels"]["unlabelled"], 1);
    assert_eq!(body["resultError"], Value::Null);
    assert_eq!(body["audit"]["status"], "FINISHED");

    let downloads = body["downloads"].as_array().unwrap();
    assert_eq!(downloads.len(), 2);
    let raw = downloads[0]["fileName"].as_str().unwrap();
    assert!(raw.starts_with("[IPQS] ["));
    assert!(raw.ends_with("_Cleansed]_ACME_leads.xlsx"));
    let annotated = downloads[1]["fileName"].as_str().unwrap();
    assert!(annotated.ends_with("_IPQS] ACME_leads.xlsx"));

    for download in downloads {
        let bytes = STANDARD.decode(download["contentBase64"].as_str().unwrap()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}

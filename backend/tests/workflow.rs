use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ipqs_validation::client::{BatchSummary, Downloads, ListResponse};
use ipqs_validation::error::{ClientError, ClientResult};
use ipqs_validation::{
    fetch_history, load, poll_once, run, submit, JobStatus, Label, MemoryAuditLog, Phase, PollPolicy,
    StatusResponse, SubmitResponse, ValidationApi, ValidationRecord, ValidationSession, LABEL_COLUMN,
};

const RESULT_URL: &str = "https://files.example/results.csv";

/// Scripted validation service.
#[derive(Default)]
struct FakeApi {
    submit: Mutex<Option<ClientResult<SubmitResponse>>>,
    statuses: Mutex<VecDeque<ClientResult<StatusResponse>>>,
    results: Vec<ValidationRecord>,
    listing: ListResponse,
    download_error: Option<String>,
    submitted: Mutex<Vec<Vec<Vec<String>>>>,
    polls: Mutex<usize>,
    downloads: Mutex<usize>,
}

impl FakeApi {
    fn accepting(statuses: Vec<StatusResponse>) -> Self {
        Self {
            submit: Mutex::new(Some(Ok(SubmitResponse {
                success: true,
                id: Some("994454".into()),
                request_id: "req-1".into(),
                message: "Success.".into(),
            }))),
            statuses: Mutex::new(statuses.into_iter().map(Ok).collect()),
            ..Default::default()
        }
    }

    fn with_results(mut self, results: Vec<ValidationRecord>) -> Self {
        self.results = results;
        self
    }

    fn polls(&self) -> usize {
        *self.polls.lock().unwrap()
    }

    fn downloads(&self) -> usize {
        *self.downloads.lock().unwrap()
    }
}

#[async_trait]
impl ValidationApi for FakeApi {
    async fn submit_batch(&self, _file_name: &str, rows: &[Vec<String>]) -> ClientResult<SubmitResponse> {
        self.submitted.lock().unwrap().push(rows.to_vec());
        self.submit
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(ClientError::RequestFailed("submitted twice".into())))
    }

    async fn poll_status(&self, _job_id: &str) -> ClientResult<StatusResponse> {
        *self.polls.lock().unwrap() += 1;
        let mut statuses = self.statuses.lock().unwrap();
        match statuses.len() {
            0 => Err(ClientError::RequestFailed("script exhausted".into())),
            // Repeat the last scripted status forever
            1 => match statuses.front().unwrap() {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(ClientError::RequestFailed(e.to_string())),
            },
            _ => statuses.pop_front().unwrap(),
        }
    }

    async fn list_batches(&self) -> ClientResult<ListResponse> {
        Ok(self.listing.clone())
    }

    async fn fetch_results(&self, url: &str) -> ClientResult<Vec<ValidationRecord>> {
        assert_eq!(url, RESULT_URL);
        *self.downloads.lock().unwrap() += 1;
        match &self.download_error {
            Some(message) => Err(ClientError::HttpStatus { status: 404, body: message.clone() }),
            None => Ok(self.results.clone()),
        }
    }
}

fn status(s: &str) -> StatusResponse {
    StatusResponse {
        success: true,
        status: Some(JobStatus::parse(s)),
        message: format!("{} message", s),
        ..Default::default()
    }
}

fn finished(link: Option<&str>) -> StatusResponse {
    StatusResponse {
        downloads: Some(Downloads { all: link.map(str::to_string) }),
        ..status("FINISHED")
    }
}

fn clean(email: &str) -> ValidationRecord {
    ValidationRecord::new(email, Some(false), Some(true), Some(false), Some(false), Some("none".into()))
}

fn dirty(email: &str) -> ValidationRecord {
    ValidationRecord::new(email, Some(false), Some(true), Some(true), Some(false), Some("none".into()))
}

fn fast() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(1),
        max_attempts: Some(10),
    }
}

fn session() -> ValidationSession {
    let csv = "Name,Work Email\nAda, a@x.com\nBob,b@x.com\nCy,a@x.com\nDee,\n";
    let loaded = load("leads.csv", csv.as_bytes()).unwrap();
    ValidationSession::prepare("acme", "leads.csv", &loaded).unwrap()
}

#[tokio::test]
async fn finished_run_labels_every_row_and_audits_once() {
    let api = FakeApi::accepting(vec![status("NEW"), status("PROCESSING"), finished(Some(RESULT_URL))])
        .with_results(vec![clean("a@x.com"), dirty("b@x.com")]);
    let audit = MemoryAuditLog::new();

    let session = run(&api, &audit, session(), &fast()).await.unwrap();

    assert!(session.is_success());
    assert_eq!(session.phase, Phase::Finished { download_link: Some(RESULT_URL.into()) });
    assert_eq!(session.poll_attempts, 3);
    assert_eq!(session.merge_passes, 1);
    assert_eq!(api.downloads(), 1);

    // Deduplicated, trimmed, blank dropped
    let submitted = api.submitted.lock().unwrap().clone();
    assert_eq!(submitted, vec![vec![vec!["a@x.com".to_string()], vec!["b@x.com".to_string()]]]);

    let annotated = session.annotated.as_ref().unwrap();
    assert_eq!(annotated.len(), 4);
    assert_eq!(
        annotated.column_values(LABEL_COLUMN),
        vec!["Valid", "Invalid", "Valid", ""]
    );

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, "FINISHED");
    assert_eq!(entries[0].job_id, "994454");
    assert_eq!(entries[0].filename, "ACME_leads");
    assert_eq!(entries[0].poll_success, Some(true));
}

#[tokio::test]
async fn error_on_first_poll_stops_without_merge() {
    let api = FakeApi::accepting(vec![status("ERROR")]);
    let audit = MemoryAuditLog::new();

    let session = run(&api, &audit, session(), &fast()).await.unwrap();

    assert!(matches!(session.phase, Phase::Failed { .. }));
    assert_eq!(api.polls(), 1);
    assert_eq!(api.downloads(), 0);
    assert!(session.annotated.is_none());
    assert_eq!(session.merge_passes, 0);

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, "ERROR");
}

#[tokio::test]
async fn rejected_submission_never_polls() {
    let api = FakeApi {
        submit: Mutex::new(Some(Ok(SubmitResponse {
            success: false,
            id: None,
            request_id: "req-9".into(),
            message: "Invalid or unauthorized key.".into(),
        }))),
        ..Default::default()
    };
    let audit = MemoryAuditLog::new();

    let session = run(&api, &audit, session(), &fast()).await.unwrap();

    assert!(matches!(session.phase, Phase::Failed { .. }));
    assert_eq!(api.polls(), 0);

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].submit_success);
    assert_eq!(entries[0].job_id, "");
    assert_eq!(entries[0].poll_success, None);
    assert_eq!(entries[0].status, "");
    assert_eq!(entries[0].submit_message, "Invalid or unauthorized key.");
}

#[tokio::test]
async fn submission_transport_error_is_audited_as_failure() {
    let api = FakeApi {
        submit: Mutex::new(Some(Err(ClientError::RequestFailed("connection refused".into())))),
        ..Default::default()
    };
    let audit = MemoryAuditLog::new();

    let session = run(&api, &audit, session(), &fast()).await.unwrap();

    assert!(matches!(session.phase, Phase::Failed { .. }));
    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].submit_message.contains("connection refused"));
}

#[tokio::test]
async fn poll_bound_times_out() {
    let api = FakeApi::accepting(vec![status("PROCESSING")]);
    let audit = MemoryAuditLog::new();
    let policy = PollPolicy {
        interval: Duration::from_millis(1),
        max_attempts: Some(3),
    };

    let session = run(&api, &audit, session(), &policy).await.unwrap();

    assert_eq!(session.phase, Phase::TimedOut { attempts: 3 });
    assert_eq!(api.polls(), 3);

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, "TIMEOUT");
}

#[tokio::test]
async fn unknown_status_keeps_polling() {
    let api = FakeApi::accepting(vec![status("QUEUED"), finished(Some(RESULT_URL))])
        .with_results(vec![clean("a@x.com")]);
    let audit = MemoryAuditLog::new();

    let session = run(&api, &audit, session(), &fast()).await.unwrap();

    assert_eq!(session.poll_attempts, 2);
    assert!(session.is_success());
}

#[tokio::test]
async fn finished_without_link_does_not_merge() {
    let api = FakeApi::accepting(vec![finished(None)]);
    let audit = MemoryAuditLog::new();

    let session = run(&api, &audit, session(), &fast()).await.unwrap();

    assert_eq!(session.phase, Phase::Finished { download_link: None });
    assert!(!session.is_success());
    assert!(session.records.is_none());
    assert_eq!(api.downloads(), 0);
    assert_eq!(audit.entries().len(), 1);
}

#[tokio::test]
async fn rejected_status_check_ends_run() {
    let rejected = StatusResponse {
        success: false,
        message: "Invalid CSV id.".into(),
        ..Default::default()
    };
    let api = FakeApi::accepting(vec![rejected]);
    let audit = MemoryAuditLog::new();

    let session = run(&api, &audit, session(), &fast()).await.unwrap();

    assert!(matches!(session.phase, Phase::Failed { .. }));
    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].poll_success, Some(false));
    assert_eq!(entries[0].status_message, "Invalid CSV id.");
}

#[tokio::test]
async fn failed_download_keeps_finished_session() {
    let api = FakeApi {
        download_error: Some("expired link".into()),
        ..FakeApi::accepting(vec![finished(Some(RESULT_URL))])
    };
    let audit = MemoryAuditLog::new();

    let session = run(&api, &audit, session(), &fast()).await.unwrap();

    assert_eq!(session.phase, Phase::Finished { download_link: Some(RESULT_URL.into()) });
    assert_eq!(session.job_id(), Some("994454"));
    assert!(session.records.is_none());
    assert!(session.annotated.is_none());
    assert!(!session.is_success());
    assert!(session.result_error.as_deref().unwrap().contains("expired link"));
    assert_eq!(api.downloads(), 1);
    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, "FINISHED");
}

#[tokio::test]
async fn steps_can_be_driven_one_by_one() {
    let api = FakeApi::accepting(vec![status("NEW"), finished(Some(RESULT_URL))]);
    let audit = MemoryAuditLog::new();

    let session = submit(&api, &audit, session()).await.unwrap();
    assert_eq!(session.phase, Phase::Submitted { job_id: "994454".into() });

    // Persist and restore between polls
    let json = serde_json::to_string(&session).unwrap();
    let session: ValidationSession = serde_json::from_str(&json).unwrap();

    let session = poll_once(&api, &audit, session, &fast()).await.unwrap();
    assert_eq!(session.phase, Phase::Submitted { job_id: "994454".into() });
    assert!(audit.entries().is_empty());

    let session = poll_once(&api, &audit, session, &fast()).await.unwrap();
    assert!(matches!(session.phase, Phase::Finished { .. }));
    assert_eq!(audit.entries().len(), 1);

    let err = submit(&api, &audit, session).await.unwrap_err();
    assert!(err.to_string().contains("submit"));
}

#[tokio::test]
async fn history_filters_by_account_prefix() {
    let batch = |name: &str, id: &str, status: &str| BatchSummary {
        file_name: name.into(),
        status_url: format!("https://www.ipqualityscore.com/api/json/csv/KEY/status/{}", id),
        status: JobStatus::parse(status),
    };
    let api = FakeApi {
        statuses: Mutex::new(VecDeque::from(vec![Ok(finished(Some(RESULT_URL)))])),
        results: vec![clean("a@x.com")],
        listing: ListResponse {
            success: true,
            csvs: vec![
                batch("ACME_leads.csv", "994454", "FINISHED"),
                batch("OTHER_leads.csv", "991895", "FINISHED"),
                batch("acme_q2.csv", "989960", "PROCESSING"),
            ],
            message: String::new(),
        },
        ..Default::default()
    };

    let history = fetch_history(&api, "Acme").await.unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].csv_id, "994454");
    assert_eq!(history[0].records.as_ref().map(Vec::len), Some(1));
    assert_eq!(history[0].records.as_ref().unwrap()[0].label, Label::Valid);
    assert_eq!(history[1].csv_id, "989960");
    assert!(history[1].records.is_none());
    assert_eq!(api.polls(), 1);
}

#[tokio::test]
async fn history_without_matches_is_empty() {
    let api = FakeApi {
        listing: ListResponse { success: true, ..Default::default() },
        ..Default::default()
    };
    let history = fetch_history(&api, "acme").await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn rejected_listing_is_an_error() {
    let api = FakeApi {
        listing: ListResponse {
            success: false,
            csvs: Vec::new(),
            message: "Invalid or unauthorized key.".into(),
        },
        ..Default::default()
    };

    let err = fetch_history(&api, "acme").await.unwrap_err();

    assert!(err.to_string().contains("Invalid or unauthorized key."));
    assert_eq!(api.polls(), 0);
}

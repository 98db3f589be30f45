use std::time::{Duration, Instant};

use ipqs_validation::error::ClientError;
use ipqs_validation::{HttpTimeouts, IpqsClient, JobStatus, Label, ValidationApi};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_with(server: &MockServer, timeouts: &HttpTimeouts) -> IpqsClient {
    IpqsClient::new("KEY", timeouts)
        .unwrap()
        .with_base_url(&format!("{}/api/json", server.uri()))
}

fn client(server: &MockServer) -> IpqsClient {
    client_with(server, &HttpTimeouts::default())
}

#[tokio::test]
async fn submit_posts_email_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/json/csv/upload"))
        .and(body_partial_json(json!({
            "type": "email",
            "file_name": "ACME_leads.csv",
            "key": "KEY",
            "input": [["a@x.com"], ["b@x.com"]],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "id": 994454,
            "request_id": "req-1",
            "message": "Success.",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rows = vec![vec!["a@x.com".to_string()], vec!["b@x.com".to_string()]];
    let response = client(&server).submit_batch("ACME_leads.csv", &rows).await.unwrap();

    assert!(response.success);
    assert_eq!(response.id.as_deref(), Some("994454"));
    assert_eq!(response.request_id, "req-1");
}

#[tokio::test]
async fn rejected_submit_is_data_not_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/json/csv/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Invalid or unauthorized key.",
            "request_id": "req-2",
        })))
        .mount(&server)
        .await;

    let response = client(&server).submit_batch("x.csv", &[]).await.unwrap();
    assert!(!response.success);
    assert_eq!(response.id, None);
    assert_eq!(response.message, "Invalid or unauthorized key.");
}

#[tokio::test]
async fn poll_reads_status_and_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/json/csv/KEY/status/994454"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "status": "FINISHED",
            "message": "",
            "downloads": { "all": "https://files.example/r.csv" },
            "request_id": "req-3",
        })))
        .mount(&server)
        .await;

    let status = client(&server).poll_status("994454").await.unwrap();
    assert_eq!(status.status, Some(JobStatus::Finished));
    assert_eq!(status.download_link(), Some("https://files.example/r.csv"));
}

#[tokio::test]
async fn list_returns_batches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/json/csv/KEY/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "csvs": [{
                "file_name": "ACME_leads.csv",
                "status_url": "https://www.ipqualityscore.com/api/json/csv/KEY/status/994454",
                "status": "PROCESSING",
            }],
        })))
        .mount(&server)
        .await;

    let listing = client(&server).list_batches().await.unwrap();
    assert_eq!(listing.csvs.len(), 1);
    assert_eq!(listing.csvs[0].csv_id(), "994454");
    assert_eq!(listing.csvs[0].status, JobStatus::Processing);
}

#[tokio::test]
async fn fetch_results_parses_csv() {
    let server = MockServer::start().await;
    let body = "Date,Email Address,Valid,Disposable,Honeypot,Recent Abuse,Spam Trap Score,Fraud Score\n\
                2024-05-01,a@x.com,true,false,false,false,none,0\n\
                2024-05-01,b@x.com,false,false,false,false,none,85\n";
    Mock::given(method("GET"))
        .and(path("/results.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/csv"))
        .mount(&server)
        .await;

    let records = client(&server)
        .fetch_results(&format!("{}/results.csv", server.uri()))
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].label, Label::Valid);
    assert_eq!(records[0].date.as_deref(), Some("2024-05-01"));
    assert_eq!(records[1].label, Label::Invalid);
}

#[tokio::test]
async fn http_error_status_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/json/csv/KEY/status/1"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client(&server).poll_status("1").await.unwrap_err();
    assert!(matches!(err, ClientError::HttpStatus { status: 502, ref body } if body == "bad gateway"));
}

#[tokio::test]
async fn invalid_json_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/json/csv/KEY/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client(&server).list_batches().await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidJson(_)));
}

#[tokio::test]
async fn stalled_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/json/csv/KEY/status/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "status": "PROCESSING" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let timeouts = HttpTimeouts {
        connect: Duration::from_secs(1),
        request: Duration::from_millis(200),
    };
    let started = Instant::now();
    let err = client_with(&server, &timeouts).poll_status("1").await.unwrap_err();

    assert!(matches!(err, ClientError::RequestFailed(_)));
    assert!(started.elapsed() < Duration::from_secs(3));
}

//! HTTP server for the validation workflow.
//!
//! # API Endpoints
//!
//! | Method | Path                      | Description                              |
//! |--------|---------------------------|------------------------------------------|
//! | GET    | `/health`                 | Health check                             |
//! | POST   | `/api/upload`             | Preview an upload (`file`)               |
//! | POST   | `/api/validate`           | Full validation run (`file`, `account`)  |
//! | GET    | `/api/batches?account=`   | Prior batches for an account             |
//! | GET    | `/api/status/{id}`        | Current status of a job                  |
//! | GET    | `/api/logs`               | SSE stream for real-time logs            |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, LOG_BROADCASTER};
use super::types::{error_response, HistoryResponse, PreviewResponse, StatusView, ValidationResponse};
use crate::audit::{sink_from_settings, AuditSink};
use crate::client::{IpqsClient, ValidationApi};
use crate::config::Settings;
use crate::error::{ConfigError, ServerError, WorkflowError};
use crate::export::{session_downloads, ExportFormat};
use crate::parser::load;
use crate::workflow::{fetch_history, run, PollPolicy, ValidationSession};

type ApiError = (StatusCode, Json<Value>);

/// Largest accepted request body (uploads are sent whole in one multipart form).
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn ValidationApi>,
    pub audit: Arc<dyn AuditSink>,
    pub poll: PollPolicy,
}

impl AppState {
    pub fn new(api: Arc<dyn ValidationApi>, audit: Arc<dyn AuditSink>, poll: PollPolicy) -> Self {
        Self { api, audit, poll }
    }

    /// Real client and configured audit sink.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self::new(
            Arc::new(IpqsClient::from_settings(settings).map_err(|e| ConfigError::HttpClient(e.to_string()))?),
            sink_from_settings(settings)?,
            settings.poll,
        ))
    }
}

impl ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Workflow(WorkflowError::Input(_)) | ServerError::Workflow(WorkflowError::EmptyBatch) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServerError::Workflow(WorkflowError::Client(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServerError> for ApiErrorBody {
    fn from(err: ServerError) -> Self {
        eprintln!("❌ {}", err);
        ApiErrorBody((err.status_code(), Json(error_response(&err.to_string()))))
    }
}

/// Wrapper so `?` converts any [`ServerError`] into a JSON error response.
struct ApiErrorBody(ApiError);

impl axum::response::IntoResponse for ApiErrorBody {
    fn into_response(self) -> axum::response::Response {
        self.0.into_response()
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload_preview))
        .route("/api/validate", post(validate))
        .route("/api/batches", get(batches))
        .route("/api/status/{id}", get(status))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 IPQS validation server running on http://localhost:{}", port);
    println!("   POST /api/upload        - Preview an upload");
    println!("   POST /api/validate      - Validate an upload");
    println!("   GET  /api/batches       - Batch history");
    println!("   GET  /api/status/{{id}}   - Job status");
    println!("   GET  /api/logs          - SSE log stream");
    println!("   GET  /health            - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ipqs-validation",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /api/upload",
            "validate": "POST /api/validate",
            "batches": "GET /api/batches?account=",
            "status": "GET /api/status/{id}",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Fields of a multipart upload.
#[derive(Default)]
struct UploadForm {
    file_name: Option<String>,
    bytes: Option<Vec<u8>>,
    account: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ServerError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                form.file_name = field.file_name().map(|s| s.to_string());
                form.bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?
                        .to_vec(),
                );
            }
            "account" => {
                form.account = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    Ok(form)
}

impl UploadForm {
    fn file(&self) -> Result<(&str, &[u8]), ServerError> {
        let bytes = self
            .bytes
            .as_deref()
            .ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;
        Ok((self.file_name.as_deref().unwrap_or("upload.csv"), bytes))
    }

    fn account(&self) -> Result<&str, ServerError> {
        self.account
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ServerError::BadRequest("No account provided".into()))
    }
}

fn banner(title: &str) {
    println!("\n{}", "=".repeat(70));
    println!("{}", title);
    println!("{}\n", "=".repeat(70));
}

/// Upload preview endpoint
async fn upload_preview(multipart: Multipart) -> Result<Json<PreviewResponse>, ApiErrorBody> {
    let form = read_form(multipart).await?;
    let (file_name, bytes) = form.file()?;

    banner(&format!("📄 NEW UPLOAD: {} ({} bytes)", file_name, bytes.len()));

    let loaded = load(file_name, bytes).map_err(|e| ServerError::Workflow(e.into()))?;
    Ok(Json(PreviewResponse::new(file_name, &loaded)))
}

/// Validation run endpoint
async fn validate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ValidationResponse>, ApiErrorBody> {
    let form = read_form(multipart).await?;
    let (file_name, bytes) = form.file()?;
    let account = form.account()?;

    banner(&format!("📄 VALIDATION RUN: {} for {} ({} bytes)", file_name, account, bytes.len()));

    let loaded = load(file_name, bytes).map_err(|e| ServerError::Workflow(e.into()))?;
    let session = ValidationSession::prepare(account, file_name, &loaded).map_err(ServerError::from)?;
    let session = run(state.api.as_ref(), state.audit.as_ref(), session, &state.poll)
        .await
        .map_err(ServerError::from)?;

    let downloads = session_downloads(&session, chrono::Local::now().date_naive(), ExportFormat::Xlsx)
        .map_err(|e| ServerError::Workflow(e.into()))?;

    banner(&format!("📊 RUN {}: {}", session.run_id, session.phase));
    Ok(Json(ValidationResponse::new(&session, &downloads)))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    account: Option<String>,
}

/// Batch history endpoint
async fn batches(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiErrorBody> {
    let account = query
        .account
        .map(|a| a.trim().to_uppercase())
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ServerError::BadRequest("No account provided".into()))?;

    log_info(format!("🔎 Listing batches for {}", account));
    let batches = fetch_history(state.api.as_ref(), &account)
        .await
        .map_err(ServerError::from)?;

    Ok(Json(HistoryResponse { account, batches }))
}

/// Job status endpoint
async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusView>, ApiErrorBody> {
    let response = state
        .api
        .poll_status(&id)
        .await
        .map_err(|e| ServerError::Workflow(e.into()))?;

    Ok(Json(StatusView::new(&id, &response)))
}

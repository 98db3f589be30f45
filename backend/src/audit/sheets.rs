//! Google Sheets audit sink.
//!
//! Authenticates with a service account (JWT bearer grant, RS256) and appends
//! one row to the first worksheet of the configured spreadsheet.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{AuditEntry, AuditSink};
use crate::config::HttpTimeouts;
use crate::error::{AuditError, AuditResult, ConfigError};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SHEETS_API: &str = "https://sheets.googleapis.com/v4/";
const SCOPES: &str = "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";
const JWT_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Fields of a service account key file we need.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Appends audit rows to a Google spreadsheet.
pub struct SheetsAuditLog {
    http: reqwest::Client,
    account: ServiceAccount,
    key: EncodingKey,
    spreadsheet_id: String,
    api_base: String,
}

impl SheetsAuditLog {
    /// Parse the service account JSON. Invalid credentials are a startup error.
    pub fn from_json(
        credentials_json: &str,
        spreadsheet_id: &str,
        timeouts: &HttpTimeouts,
    ) -> Result<Self, ConfigError> {
        let account: ServiceAccount = serde_json::from_str(credentials_json)
            .map_err(|e| ConfigError::InvalidCredential(e.to_string()))?;
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| ConfigError::InvalidCredential(e.to_string()))?;
        let http = timeouts.client().map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            account,
            key,
            spreadsheet_id: spreadsheet_id.to_string(),
            api_base: SHEETS_API.to_string(),
        })
    }

    /// Use another Sheets API base URL.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.to_string();
        self
    }

    fn assertion(&self) -> AuditResult<String> {
        let iat = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.account.client_email,
            scope: SCOPES,
            aud: &self.account.token_uri,
            iat,
            exp: iat + TOKEN_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| AuditError::Credential(e.to_string()))
    }

    async fn access_token(&self) -> AuditResult<String> {
        let assertion = self.assertion()?;
        let response = self
            .http
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| AuditError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuditError::Request(format!("token exchange HTTP {}: {}", status, body)));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuditError::Request(e.to_string()))?;
        Ok(token.access_token)
    }

    fn endpoint(&self, segments: &[&str]) -> AuditResult<Url> {
        let mut url = Url::parse(&self.api_base).map_err(|e| AuditError::Request(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| AuditError::Request(format!("invalid API base: {}", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Title of the first worksheet.
    async fn first_sheet_title(&self, token: &str) -> AuditResult<String> {
        let mut url = self.endpoint(&["spreadsheets", &self.spreadsheet_id])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties");

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuditError::Request(e.to_string()))?;
        let body: Value = response
            .error_for_status()
            .map_err(|e| AuditError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuditError::Request(e.to_string()))?;

        body["sheets"][0]["properties"]["title"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AuditError::Request("spreadsheet has no worksheet".to_string()))
    }
}

/// A1 range addressing the top-left of a worksheet.
fn sheet_range(title: &str) -> String {
    format!("'{}'!A1", title.replace('\'', "''"))
}

#[async_trait]
impl AuditSink for SheetsAuditLog {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        let token = self.access_token().await?;
        let title = self.first_sheet_title(&token).await?;

        let target = format!("{}:append", sheet_range(&title));
        let mut url = self.endpoint(&["spreadsheets", &self.spreadsheet_id, "values", &target])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");

        self.http
            .post(url)
            .bearer_auth(&token)
            .json(&json!({ "values": [entry.row()] }))
            .send()
            .await
            .map_err(|e| AuditError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuditError::Request(e.to_string()))?;

        Ok(())
    }
}

//! Environment configuration.
//!
//! Read once at startup (after loading `.env` if present). Missing API key or
//! audit credential is fatal.
//!
//! | Variable                 | Default                                      |
//! |--------------------------|----------------------------------------------|
//! | `IPQS_API_KEY`           | required                                     |
//! | `IPQS_BASE_URL`          | `https://www.ipqualityscore.com/api/json/`   |
//! | `IPQS_POLL_INTERVAL_MS`  | `1000`                                       |
//! | `IPQS_MAX_POLL_ATTEMPTS` | `1800` (`0` = poll until terminal)           |
//! | `IPQS_CONNECT_TIMEOUT_MS`| `10000`                                      |
//! | `IPQS_REQUEST_TIMEOUT_MS`| `60000` (per HTTP request)                   |
//! | `GOOGLE_JSON`            | service account JSON for the audit sheet     |
//! | `IPQS_AUDIT_SHEET_ID`    | shared audit spreadsheet                     |
//! | `IPQS_AUDIT_LOG`         | JSON-lines audit file, used without Google   |

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::workflow::PollPolicy;

pub const DEFAULT_BASE_URL: &str = "https://www.ipqualityscore.com/api/json/";
pub const DEFAULT_AUDIT_SHEET_ID: &str = "11CZgEFDvJP7RzlD736WWiOaky7_VL1r3omX2lihNYAw";

/// Timeouts applied to every outgoing HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub connect: Duration,
    /// Whole request, body included
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(60),
        }
    }
}

impl HttpTimeouts {
    /// Build a `reqwest` client with these timeouts.
    pub fn client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .connect_timeout(self.connect)
            .timeout(self.request)
            .build()
    }
}

/// Where audit entries go.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditTarget {
    /// First worksheet of a Google spreadsheet.
    Sheets {
        credentials_json: String,
        spreadsheet_id: String,
    },
    /// Local JSON-lines file.
    File(PathBuf),
}

/// Runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub base_url: String,
    pub poll: PollPolicy,
    pub timeouts: HttpTimeouts,
    pub audit: AuditTarget,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = var("IPQS_API_KEY").ok_or(ConfigError::MissingApiKey)?;

        let mut base_url = var("IPQS_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let defaults = PollPolicy::default();
        let interval = match var("IPQS_POLL_INTERVAL_MS") {
            Some(v) => Duration::from_millis(parse_number("IPQS_POLL_INTERVAL_MS", &v)?),
            None => defaults.interval,
        };
        let max_attempts = match var("IPQS_MAX_POLL_ATTEMPTS") {
            Some(v) => match parse_number("IPQS_MAX_POLL_ATTEMPTS", &v)? {
                0 => None,
                n => Some(u32::try_from(n).map_err(|_| ConfigError::InvalidValue {
                    name: "IPQS_MAX_POLL_ATTEMPTS".into(),
                    value: v.clone(),
                })?),
            },
            None => defaults.max_attempts,
        };

        let millis = |name: &str, default: Duration| -> Result<Duration, ConfigError> {
            match var(name) {
                Some(v) => Ok(Duration::from_millis(parse_number(name, &v)?)),
                None => Ok(default),
            }
        };
        let default_timeouts = HttpTimeouts::default();
        let timeouts = HttpTimeouts {
            connect: millis("IPQS_CONNECT_TIMEOUT_MS", default_timeouts.connect)?,
            request: millis("IPQS_REQUEST_TIMEOUT_MS", default_timeouts.request)?,
        };

        let audit = match (var("GOOGLE_JSON"), var("IPQS_AUDIT_LOG")) {
            (Some(credentials_json), _) => AuditTarget::Sheets {
                credentials_json,
                spreadsheet_id: var("IPQS_AUDIT_SHEET_ID")
                    .unwrap_or_else(|| DEFAULT_AUDIT_SHEET_ID.to_string()),
            },
            (None, Some(path)) => AuditTarget::File(PathBuf::from(path)),
            (None, None) => return Err(ConfigError::MissingAuditCredential),
        };

        Ok(Self {
            api_key,
            base_url,
            poll: PollPolicy { interval, max_attempts },
            timeouts,
            audit,
        })
    }
}

fn parse_number(name: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

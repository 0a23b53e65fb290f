use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;

#[derive(Debug)]
pub enum ChatApiError {
    MissingApiKey,
    InvalidHeader(String),
    Request(reqwest::Error),
    /// Non-2xx response: status plus the raw body text.
    Status(StatusCode, String),
    Timeout {
        phase: &'static str,
        after: Duration,
    },
    /// A streamed line that was not valid JSON.
    MalformedChunk {
        line: String,
        source: JsonError,
    },
    MissingContent(String),
    Serde(JsonError),
}

impl ChatApiError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(status, _) => Some(*status),
            Self::Request(error) => error.status(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(rename = "error")]
    pub value: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayloadFields {
    pub message: Option<String>,
    pub code: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

impl ErrorPayloadFields {
    fn summary(&self) -> Option<String> {
        let message = self.message.as_deref().and_then(non_empty_string)?;
        let kind = self
            .type_
            .as_deref()
            .and_then(non_empty_string)
            .or_else(|| self.code.as_ref().and_then(|code| code.as_str()));
        Some(match kind {
            Some(kind) => format!("{message} ({kind})"),
            None => message.to_owned(),
        })
    }
}

impl fmt::Display for ChatApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(
                f,
                "Missing API_KEY: set $API_KEY in the environment or a .env file"
            ),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, body) => {
                write!(f, "HTTP {} : {}", status.as_u16(), parse_error_message(*status, body))
            }
            Self::Timeout { phase, after } => {
                write!(f, "timed out after {}s while {phase}", after.as_secs_f64())
            }
            Self::MalformedChunk { line, source } => {
                write!(f, "malformed stream chunk {line:?}: {source}")
            }
            Self::MissingContent(body) => {
                write!(f, "response did not contain choices[0].message.content: {body}")
            }
            Self::Serde(error) => write!(f, "serialization error: {error}"),
        }
    }
}

impl std::error::Error for ChatApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(error) => Some(error),
            Self::MalformedChunk { source, .. } => Some(source),
            Self::Serde(error) => Some(error),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChatApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for ChatApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

/// Human-oriented one-liner for an error response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.to_string()
        }
    };

    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(ErrorPayload { value: Some(error) }) => error.summary().unwrap_or_else(fallback),
        _ => fallback(),
    }
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

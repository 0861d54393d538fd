use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally before anything was sent.
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("{message}")]
    Http {
        status: StatusCode,
        message: String,
        body: Value,
    },

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The refresh token was rejected; the session is already cleared.
    #[error("session expired, please log in again: {0}")]
    AuthRefresh(#[source] Box<ClientError>),

    #[error("unexpected response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("request body could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("token storage: {0}")]
    Storage(#[source] anyhow::Error),

    /// Reading a local input file (a dish photo) failed.
    #[error("file access: {0}")]
    Io(#[from] std::io::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ClientError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Builds an `Http` error from a raw response body.
    pub fn from_response(status: StatusCode, raw: &[u8]) -> Self {
        let body = if raw.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice::<Value>(raw)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(raw).into_owned()))
        };
        let message = extract_message(&body)
            .unwrap_or_else(|| format!("request failed with status {}", status));
        ClientError::Http {
            status,
            message,
            body,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            ClientError::Network(e) => e.status(),
            ClientError::AuthRefresh(inner) => inner.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Http { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Http { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    /// Text to show next to the control that triggered the request.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation { message, .. } | ClientError::Http { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

/// Pulls a human readable message out of an error body.
///
/// Looks at `detail`, then `error`, then joins every field message of a
/// validation payload (`{"weight": ["..."], "name": "..."}`).
pub fn extract_message(body: &Value) -> Option<String> {
    match body {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(map) => {
            for key in ["detail", "error"] {
                if let Some(Value::String(s)) = map.get(key) {
                    return Some(s.clone());
                }
            }
            let mut parts = Vec::new();
            for value in map.values() {
                collect_strings(value, &mut parts);
            }
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Array(items) => {
            let mut parts = Vec::new();
            for value in items {
                collect_strings(value, &mut parts);
            }
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

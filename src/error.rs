use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

pub type Result<T, E = AdapterError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("{0}")]
    CredentialsMissing(String),

    #[error("upstream unavailable after {attempts} attempt(s) for url ({url}): {reason}")]
    TransientUpstream {
        url: String,
        attempts: usize,
        status: Option<u16>,
        reason: String,
    },

    #[error("upstream request failed: HTTP {status} {status_text} for url ({url})\n{body}")]
    Upstream {
        url: String,
        status: u16,
        status_text: String,
        body: String,
        dropped: Vec<String>,
    },

    #[error("provider rejected parameters {parameters:?}: {message}")]
    ParameterRejected {
        parameters: Vec<String>,
        dropped: Vec<String>,
        message: String,
    },

    #[error("all requested parameters are unavailable (dropped: {dropped:?})")]
    AllParametersUnavailable { dropped: Vec<String> },

    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error(transparent)]
    Config(#[from] anyhow::Error),
}

/// Caller-facing error payload: `{ error, message, details? }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl AdapterError {
    pub fn code(&self) -> &'static str {
        match self {
            AdapterError::MissingArgument(_) => "missing_argument",
            AdapterError::InvalidArgument { .. } => "invalid_argument",
            AdapterError::CredentialsMissing(_) => "credentials_missing",
            AdapterError::TransientUpstream { .. } => "upstream_unavailable",
            AdapterError::Upstream { .. } => "upstream_error",
            AdapterError::ParameterRejected { .. } => "parameter_rejected",
            AdapterError::AllParametersUnavailable { .. } => "parameters_unavailable",
            AdapterError::HttpClient(_) => "http_client",
            AdapterError::Config(_) => "config",
        }
    }

    /// Parameters that were dropped before the request finally failed.
    pub fn dropped_parameters(&self) -> &[String] {
        match self {
            AdapterError::Upstream { dropped, .. }
            | AdapterError::ParameterRejected { dropped, .. }
            | AdapterError::AllParametersUnavailable { dropped } => dropped,
            _ => &[],
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let details = match self {
            AdapterError::MissingArgument(name) => Some(json!({ "argument": name })),
            AdapterError::InvalidArgument { name, .. } => Some(json!({ "argument": name })),
            AdapterError::TransientUpstream {
                url,
                attempts,
                status,
                ..
            } => Some(json!({ "url": url, "attempts": attempts, "status": status })),
            AdapterError::Upstream {
                url,
                status,
                dropped,
                ..
            } => {
                let mut d = json!({ "url": url, "status": status, "droppedParameters": dropped });
                if let Some(hint) = status_hint(*status) {
                    d["hint"] = Value::String(hint.to_string());
                }
                Some(d)
            }
            AdapterError::ParameterRejected {
                parameters,
                dropped,
                ..
            } => Some(json!({ "parameters": parameters, "droppedParameters": dropped })),
            AdapterError::AllParametersUnavailable { dropped } => {
                Some(json!({ "droppedParameters": dropped }))
            }
            AdapterError::CredentialsMissing(_)
            | AdapterError::HttpClient(_)
            | AdapterError::Config(_) => None,
        };

        ErrorBody {
            error: self.code(),
            message: DisplayChain(self).to_string(),
            details,
        }
    }
}

struct DisplayChain<'a>(&'a AdapterError);

impl std::fmt::Display for DisplayChain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = std::error::Error::source(self.0);
        while let Some(s) = source {
            write!(f, ": {}", s)?;
            source = s.source();
        }
        Ok(())
    }
}

/// Remediation hint for status codes that usually mean a setup problem.
pub(crate) fn status_hint(status: u16) -> Option<&'static str> {
    match status {
        401 => Some(
            "authentication failed: check METEOMATICS_USERNAME / METEOMATICS_PASSWORD or the \
             `username:` / `password:` entries in .meteomaticsrc",
        ),
        403 => Some(
            "access denied: the account may have expired (see `valid_until`) or the \
             subscription does not include the requested parameters or time range",
        ),
        404 => Some(
            "endpoint not found: the configured base URL may be wrong \
             (expected https://api.meteomatics.com or https://power.larc.nasa.gov)",
        ),
        _ => None,
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct ProviderErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    title: Option<String>,
    // Meteomatics reports {"status":"error","message":...}; some gateways use {"error":...}
    #[serde(default)]
    error: Option<Value>,
    // NASA POWER: {"header":..., "messages":[...]}
    #[serde(default)]
    messages: Vec<Value>,
}

/// Extracts the human-readable part of an error body.
///
/// JSON bodies are reduced to their message fields; anything else is returned
/// trimmed as-is.
pub(crate) fn provider_error_text(body: &str) -> String {
    let Ok(e) = serde_json::from_str::<ProviderErrorResponse>(body) else {
        return body.trim().to_string();
    };

    let mut parts: Vec<String> = Vec::new();
    for s in [&e.title, &e.message, &e.detail].into_iter().flatten() {
        if !s.trim().is_empty() {
            parts.push(s.trim().to_string());
        }
    }
    match &e.error {
        Some(Value::String(s)) if !s.trim().is_empty() => parts.push(s.trim().to_string()),
        Some(Value::Object(o)) => {
            if let Some(Value::String(s)) = o.get("message") {
                parts.push(s.trim().to_string());
            }
        }
        _ => {}
    }
    for m in &e.messages {
        match m {
            Value::String(s) => parts.push(s.trim().to_string()),
            other => parts.push(other.to_string()),
        }
    }

    if parts.is_empty() {
        body.trim().to_string()
    } else {
        parts.join("; ")
    }
}

use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use thiserror::Error;

use crate::config::Credentials;
use crate::error::{AdapterError, Result};

/// Status line and body of a completed HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
            .to_string();
        Self {
            status,
            status_text,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response (DNS, connect, TLS, timeout, body read).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct NetworkError(pub String);

impl From<reqwest::Error> for NetworkError {
    fn from(e: reqwest::Error) -> Self {
        let mut msg = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(s) = source {
            msg.push_str(": ");
            msg.push_str(&s.to_string());
            source = s.source();
        }
        NetworkError(msg)
    }
}

/// Issues GET requests. Implemented over HTTP by [`HttpTransport`]; tests
/// substitute scripted fakes.
pub trait Transport {
    fn get(
        &self,
        url: &str,
        auth: Option<&Credentials>,
    ) -> std::result::Result<RawResponse, NetworkError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(
        &self,
        url: &str,
        auth: Option<&Credentials>,
    ) -> std::result::Result<RawResponse, NetworkError> {
        (**self).get(url, auth)
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("eo-adapter/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("eo-adapter")),
        );

        let http = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .map_err(AdapterError::HttpClient)?;

        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn get(
        &self,
        url: &str,
        auth: Option<&Credentials>,
    ) -> std::result::Result<RawResponse, NetworkError> {
        let mut req = self.http.get(url);
        if let Some(c) = auth {
            req = req.basic_auth(&c.username, Some(&c.password));
        }
        let resp = req.send()?;
        let status = resp.status();
        let body = resp.text()?;
        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_response_status_classes() {
        let ok = RawResponse::new(200, "{}");
        assert!(ok.is_success());
        assert_eq!(ok.status_text, "OK");

        let bad = RawResponse::new(400, "Incorrect URL");
        assert!(!bad.is_success());
        assert_eq!(bad.status_text, "Bad Request");

        assert_eq!(RawResponse::new(503, "").status_text, "Service Unavailable");
    }
}

//! Adaptive fetch loop.
//!
//! Every logical request walks a small state machine:
//!
//! - transient failures (5xx, network) are retried with exponential backoff up
//!   to `retry_max` times;
//! - `Parameter X not available` removes `X` from the active set and restarts
//!   the retry counter;
//! - a request-level rejection strips all unit suffixes once, if that changes
//!   the set, and restarts;
//! - anything else fails.
//!
//! Each restart either removes a parameter or consumes the one-time suffix
//! strip, so a request with `N` parameters restarts at most `N + 1` times.

use serde::Serialize;
use serde_json::{Value, json};
use std::thread;

use crate::catalog::strip_unit_suffix;
use crate::classify::{Rejection, classify_rejection};
use crate::config::{Credentials, FetchConfig};
use crate::error::{AdapterError, Result, provider_error_text};
use crate::transport::{RawResponse, Transport};
use crate::util::{backoff, excerpt, retriable_status};

/// Request-scoped parameter bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FallbackState {
    pending: Vec<String>,
    dropped: Vec<String>,
    suffixes_stripped: bool,
}

impl FallbackState {
    pub(crate) fn new(codes: Vec<String>) -> Self {
        Self {
            pending: codes,
            dropped: Vec::new(),
            suffixes_stripped: false,
        }
    }

    /// Removes `code` (or the pending code it names without its unit).
    /// Returns `false` when nothing matched.
    pub(crate) fn drop_parameter(&mut self, code: &str) -> bool {
        let idx = self
            .pending
            .iter()
            .position(|p| p == code)
            .or_else(|| {
                let bare = strip_unit_suffix(code);
                self.pending.iter().position(|p| strip_unit_suffix(p) == bare)
            });
        match idx {
            Some(i) => {
                let removed = self.pending.remove(i);
                self.dropped.push(removed);
                true
            }
            None => false,
        }
    }

    /// Strips unit suffixes from every pending code, once. Returns `false` if
    /// already done or if nothing would change.
    ///
    /// Codes that collapse onto an earlier one (`t_2m:C`, `t_2m:F`) keep the
    /// first; the others are recorded as dropped.
    pub(crate) fn strip_suffixes(&mut self) -> bool {
        if self.suffixes_stripped {
            return false;
        }
        let mut stripped: Vec<String> = Vec::with_capacity(self.pending.len());
        let mut merged: Vec<String> = Vec::new();
        for p in &self.pending {
            let s = strip_unit_suffix(p).to_string();
            if stripped.contains(&s) {
                merged.push(p.clone());
            } else {
                stripped.push(s);
            }
        }
        if stripped == self.pending {
            return false;
        }
        self.pending = stripped;
        self.dropped.extend(merged);
        self.suffixes_stripped = true;
        true
    }

    pub(crate) fn pending(&self) -> &[String] {
        &self.pending
    }

    pub(crate) fn dropped(&self) -> &[String] {
        &self.dropped
    }
}

/// Where and how a successful payload was obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchMeta {
    pub request_url: String,
    /// Codes actually sent in the successful request.
    pub parameters: Vec<String>,
    #[serde(rename = "droppedParameters")]
    pub dropped_parameters: Vec<String>,
    /// HTTP calls made, across all retries and fallbacks.
    pub attempts: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub body: Value,
    pub meta: FetchMeta,
}

#[derive(Debug, Clone)]
pub struct FetchClient<T> {
    transport: T,
    credentials: Option<Credentials>,
    config: FetchConfig,
}

impl<T: Transport> FetchClient<T> {
    pub fn new(transport: T, credentials: Option<Credentials>, config: FetchConfig) -> Self {
        Self {
            transport,
            credentials,
            config,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut FetchConfig {
        &mut self.config
    }

    pub(crate) fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Runs the adaptive loop for `codes`, building each URL with `build_url`.
    pub fn fetch<F>(&self, codes: Vec<String>, build_url: F) -> Result<FetchOutcome>
    where
        F: Fn(&[String]) -> Result<String>,
    {
        if codes.is_empty() {
            return Err(AdapterError::MissingArgument("parameters"));
        }
        let mut state = FallbackState::new(codes);
        let mut calls = 0usize;

        'request: loop {
            let url = build_url(state.pending())?;
            let mut attempt = 0usize;

            loop {
                calls += 1;
                log::debug!("GET {} (attempt {})", url, attempt + 1);

                let resp = match self.transport.get(&url, self.credentials.as_ref()) {
                    Ok(resp) => resp,
                    Err(e) => {
                        if attempt < self.config.retry_max {
                            self.pause(attempt, &format!("network error: {}", e));
                            attempt += 1;
                            continue;
                        }
                        return Err(AdapterError::TransientUpstream {
                            url,
                            attempts: attempt + 1,
                            status: None,
                            reason: e.to_string(),
                        });
                    }
                };

                if resp.is_success() {
                    return Ok(FetchOutcome {
                        body: parse_body(&resp.body),
                        meta: FetchMeta {
                            request_url: url,
                            parameters: state.pending().to_vec(),
                            dropped_parameters: state.dropped().to_vec(),
                            attempts: calls,
                        },
                    });
                }

                if retriable_status(resp.status) {
                    if attempt < self.config.retry_max {
                        self.pause(attempt, &format!("HTTP {}", resp.status));
                        attempt += 1;
                        continue;
                    }
                    return Err(AdapterError::TransientUpstream {
                        url,
                        attempts: attempt + 1,
                        status: Some(resp.status),
                        reason: format!("HTTP {} {}", resp.status, resp.status_text),
                    });
                }

                let text = provider_error_text(&resp.body);
                match classify_rejection(&format!("{}\n{}", resp.status_text, text)) {
                    Some(Rejection::ParameterUnavailable(code)) => {
                        if state.drop_parameter(&code) {
                            log::warn!(
                                "provider reports `{}` unavailable; retrying without it ({} left)",
                                code,
                                state.pending().len()
                            );
                            if state.pending().is_empty() {
                                return Err(AdapterError::AllParametersUnavailable {
                                    dropped: state.dropped().to_vec(),
                                });
                            }
                            continue 'request;
                        }
                        return Err(AdapterError::ParameterRejected {
                            parameters: state.pending().to_vec(),
                            dropped: state.dropped().to_vec(),
                            message: text,
                        });
                    }
                    Some(Rejection::MalformedRequest) => {
                        let before = state.pending().to_vec();
                        if state.strip_suffixes() {
                            log::warn!(
                                "provider rejected {:?} ({}); retrying with unit suffixes stripped: {:?}",
                                before,
                                excerpt(&text, 120),
                                state.pending()
                            );
                            continue 'request;
                        }
                        return Err(self.upstream_error(url, resp, &state));
                    }
                    None => return Err(self.upstream_error(url, resp, &state)),
                }
            }
        }
    }

    fn pause(&self, attempt: usize, reason: &str) {
        let delay = backoff(self.config.base_delay, attempt, self.config.max_delay);
        log::warn!(
            "transient failure ({}); retry {}/{} in {:?}",
            reason,
            attempt + 1,
            self.config.retry_max,
            delay
        );
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    fn upstream_error(&self, url: String, resp: RawResponse, state: &FallbackState) -> AdapterError {
        log::debug!(
            "request failed with HTTP {}: {}",
            resp.status,
            excerpt(&resp.body, 200)
        );
        AdapterError::Upstream {
            url,
            status: resp.status,
            status_text: resp.status_text,
            body: resp.body,
            dropped: state.dropped().to_vec(),
        }
    }
}

/// Parses a success body; non-JSON text is wrapped as `{"raw": text}`.
pub(crate) fn parse_body(body: &str) -> Value {
    match serde_json::from_str::<Value>(body) {
        Ok(v) => v,
        Err(e) => {
            log::debug!("response body is not JSON ({}); wrapping raw text", e);
            json!({ "raw": body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn drop_matches_with_or_without_suffix() {
        let mut s = FallbackState::new(codes(&["t_2m:C", "precip_1h:mm"]));
        assert!(s.drop_parameter("precip_1h"));
        assert_eq!(s.pending(), ["t_2m:C"]);
        assert_eq!(s.dropped(), ["precip_1h:mm"]);
        assert!(!s.drop_parameter("nope"));
    }

    #[test]
    fn strip_happens_once_and_only_if_it_changes_something() {
        let mut plain = FallbackState::new(codes(&["a", "b"]));
        assert!(!plain.strip_suffixes());

        let mut s = FallbackState::new(codes(&["t_2m:C", "t_2m:F", "wind_speed_10m:ms"]));
        assert!(s.strip_suffixes());
        assert_eq!(s.pending(), ["t_2m", "wind_speed_10m"]);
        assert_eq!(s.dropped(), ["t_2m:F"]);
        assert!(!s.strip_suffixes());
    }

    #[test]
    fn non_json_success_body_is_wrapped() {
        assert_eq!(parse_body("validdate;t_2m:C\n"), json!({ "raw": "validdate;t_2m:C\n" }));
        assert_eq!(parse_body(r#"{"a":1}"#), json!({ "a": 1 }));
    }
}

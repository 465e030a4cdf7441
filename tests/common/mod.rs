#![allow(dead_code)]

use eo_adapter::{Credentials, FetchConfig, NetworkError, RawResponse, Transport};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

pub type Reply = Result<RawResponse, NetworkError>;

/// Answers from a queue of canned replies, or from a closure over the URL,
/// and records every URL it was asked for.
pub struct ScriptedTransport {
    replies: RefCell<VecDeque<Reply>>,
    responder: Option<Box<dyn Fn(&str) -> Reply>>,
    pub calls: RefCell<Vec<String>>,
    pub saw_auth: RefCell<Vec<bool>>,
}

impl ScriptedTransport {
    pub fn queue(replies: Vec<Reply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            responder: None,
            calls: RefCell::new(Vec::new()),
            saw_auth: RefCell::new(Vec::new()),
        }
    }

    pub fn responder(f: impl Fn(&str) -> Reply + 'static) -> Self {
        Self {
            replies: RefCell::new(VecDeque::new()),
            responder: Some(Box::new(f)),
            calls: RefCell::new(Vec::new()),
            saw_auth: RefCell::new(Vec::new()),
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &str, auth: Option<&Credentials>) -> Result<RawResponse, NetworkError> {
        self.calls.borrow_mut().push(url.to_string());
        self.saw_auth.borrow_mut().push(auth.is_some());
        if let Some(f) = &self.responder {
            return f(url);
        }
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(NetworkError("script exhausted".into())))
    }
}

pub fn ok(body: &str) -> Reply {
    Ok(RawResponse::new(200, body))
}

pub fn status(code: u16, body: &str) -> Reply {
    Ok(RawResponse::new(code, body))
}

pub fn network(msg: &str) -> Reply {
    Err(NetworkError(msg.to_string()))
}

pub fn fast_config(retry_max: usize) -> FetchConfig {
    FetchConfig {
        retry_max,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        timeout: Duration::from_secs(5),
    }
}

pub fn creds() -> Credentials {
    Credentials::new("user", "pass")
}

pub fn codes(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

/// Path segment holding the comma-joined parameter list of a Meteomatics-style URL.
pub fn param_segment(url: &str) -> String {
    let path = url.split("://").nth(1).unwrap_or(url);
    path.split('/').nth(2).unwrap_or_default().to_string()
}

//! Scripted transport shared by the unit tests of this crate.

use crate::retry::{HttpRequest, HttpResponse, HttpTransport};
use crate::{CareError, CareResult};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

#[derive(Clone, Debug)]
pub(crate) enum Reply {
    Status(u16, String),
    Fail(String),
    /// Never completes.
    Hang,
}

impl Reply {
    pub(crate) fn status(code: u16, body: &str) -> Self {
        Reply::Status(code, body.to_string())
    }

    pub(crate) fn fail(message: &str) -> Self {
        Reply::Fail(message.to_string())
    }

    pub(crate) fn json(value: serde_json::Value) -> Self {
        Reply::Status(200, value.to_string())
    }
}

/// Transport that plays back queued replies, then repeats `fallback` forever.
#[derive(Debug)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    seen: Mutex<Vec<(Instant, HttpRequest)>>,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn always(reply: Reply) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(reply),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn attempt_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub(crate) fn attempt_instants(&self) -> Vec<Instant> {
        self.seen.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(_, req)| req.clone())
            .collect()
    }

    fn next_reply(&self, request: &HttpRequest) -> Reply {
        self.seen
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .expect("scripted transport ran out of replies")
    }
}

impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: &HttpRequest) -> CareResult<HttpResponse> {
        match self.next_reply(request) {
            Reply::Status(status, body) => Ok(HttpResponse {
                status,
                body: body.into_bytes(),
            }),
            Reply::Fail(message) => Err(CareError::Transport(message)),
            Reply::Hang => std::future::pending().await,
        }
    }
}

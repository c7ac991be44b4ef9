//! In-memory recording transport.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use o11y::{ApiRequest, ApiResponse, O11yError, O11yResult, Transport};
use parking_lot::Mutex;

/// A scripted answer.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with this status and body.
    Response(StatusCode, Bytes),
    /// Fail at the connection level.
    TransportError(String),
}

impl Reply {
    fn to_result(&self) -> O11yResult<ApiResponse> {
        match self {
            Self::Response(status, body) => Ok(ApiResponse::new(*status, body.clone())),
            Self::TransportError(message) => Err(O11yError::transport(message.clone())),
        }
    }
}

#[derive(Debug)]
struct State {
    requests: Vec<ApiRequest>,
    replies: VecDeque<Reply>,
    fallback: Reply,
}

/// Transport that records requests and replays scripted replies.
///
/// Clones share state, so a test can keep one handle and give another to the
/// client.
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    state: Arc<Mutex<State>>,
}

impl RecordingTransport {
    /// A transport answering `200 {}` once its script runs out.
    pub fn new() -> Self {
        Self::with_fallback(Reply::Response(StatusCode::OK, Bytes::from_static(b"{}")))
    }

    /// A transport answering `fallback` once its script runs out.
    pub fn with_fallback(fallback: Reply) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                requests: Vec::new(),
                replies: VecDeque::new(),
                fallback,
            })),
        }
    }

    /// Queue a raw response.
    pub fn push_response(&self, status: u16, body: impl Into<Bytes>) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.state
            .lock()
            .replies
            .push_back(Reply::Response(status, body.into()));
    }

    /// Queue a JSON response.
    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push_response(status, body.to_string());
    }

    /// Queue a connection failure.
    pub fn push_transport_error(&self, message: impl Into<String>) {
        self.state
            .lock()
            .replies
            .push_back(Reply::TransportError(message.into()));
    }

    /// Every request seen so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of requests seen so far.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<ApiRequest> {
        self.state.lock().requests.last().cloned()
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for RecordingTransport {
    async fn send(&self, request: ApiRequest) -> O11yResult<ApiResponse> {
        let reply = {
            let mut state = self.state.lock();
            state.requests.push(request);
            let next = state.replies.pop_front();
            next.unwrap_or_else(|| state.fallback.clone())
        };
        reply.to_result()
    }
}

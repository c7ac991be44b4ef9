//! Loopback mock of the AI training backend.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A request as received by the mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: Method,
    /// Request path.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
}

impl RecordedRequest {
    /// The body as JSON, or `Null` if it is not JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }

    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Default)]
struct Shared {
    requests: Vec<RecordedRequest>,
    replies: VecDeque<(StatusCode, Bytes)>,
    registered: u64,
}

/// HTTP/1 server on `127.0.0.1` mimicking `/api/v1/process/...`.
///
/// Unscripted requests succeed: `POST .../process/new` returns a fresh
/// `process-N` id, everything else `200 {"status":"success"}`. The server
/// stops when the value is dropped.
pub struct MockBackend {
    addr: SocketAddr,
    shared: Arc<Mutex<Shared>>,
    task: JoinHandle<()>,
}

impl MockBackend {
    /// Bind an ephemeral port and start serving.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shared = Arc::new(Mutex::new(Shared::default()));
        let task = tokio::spawn(serve(listener, shared.clone()));

        Ok(Self { addr, shared, task })
    }

    /// Base URL, e.g. `http://127.0.0.1:41234`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A connection string with embedded userinfo.
    pub fn credentials(&self, principal: &str, secret: &str) -> String {
        format!("http://{principal}:{secret}@{}", self.addr)
    }

    /// Queue a response for the next request.
    pub fn push_response(&self, status: u16, body: impl Into<Bytes>) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.shared.lock().replies.push_back((status, body.into()));
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared.lock().requests.clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.shared.lock().requests.len()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(listener: TcpListener, shared: Arc<Mutex<Shared>>) {
    loop {
        let (stream, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("mock backend failed to accept connection: {}", e);
                continue;
            }
        };

        let shared = shared.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let shared = shared.clone();
                async move { Ok::<_, Infallible>(handle(req, &shared).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("mock backend connection error: {}", e);
            }
        });
    }
}

async fn handle(req: Request<Incoming>, shared: &Mutex<Shared>) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let body = body
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();
    let path = parts.uri.path().to_string();

    let (status, reply) = {
        let mut state = shared.lock();
        let scripted = state.replies.pop_front();
        let reply = scripted.unwrap_or_else(|| default_reply(&mut state, &parts.method, &path));
        state.requests.push(RecordedRequest {
            method: parts.method,
            path,
            headers: parts.headers,
            body,
        });
        reply
    };

    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(reply))
        .expect("valid response")
}

fn default_reply(state: &mut Shared, method: &Method, path: &str) -> (StatusCode, Bytes) {
    if *method == Method::POST && path.ends_with("/api/v1/process/new") {
        state.registered += 1;
        let body = serde_json::json!({
            "status": "success",
            "data": {"process_uuid": format!("process-{}", state.registered)},
        });
        return (StatusCode::OK, Bytes::from(body.to_string()));
    }
    (
        StatusCode::OK,
        Bytes::from_static(br#"{"status":"success","data":{}}"#),
    )
}

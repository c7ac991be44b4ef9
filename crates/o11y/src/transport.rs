//! HTTP exchange with the backend.
//!
//! [`LifecycleClient`](crate::LifecycleClient) builds a fully formed
//! [`ApiRequest`] and hands it to a [`Transport`], which performs exactly one
//! round trip. [`HttpTransport`] is the reqwest-backed implementation; tests
//! substitute their own.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use http::header::HeaderMap;
use http::StatusCode;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{O11yError, O11yResult};

/// Performs one HTTP POST round trip.
pub trait Transport: Send + Sync {
    /// Send `request` and return whatever the backend answered.
    ///
    /// Only connection-level failures are errors; non-2xx responses are
    /// returned as-is.
    fn send(&self, request: ApiRequest) -> impl Future<Output = O11yResult<ApiResponse>> + Send;
}

/// A JSON POST to the backend.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Absolute URL.
    pub url: String,
    /// Request headers, including `Content-Type` and any `Authorization`.
    pub headers: HeaderMap,
    /// Serialized JSON body.
    pub body: Bytes,
}

impl ApiRequest {
    /// Parse the body back into JSON.
    pub fn body_json<T: DeserializeOwned>(&self) -> O11yResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The backend's answer.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response body.
    pub body: Bytes,
}

impl ApiResponse {
    /// Create a response.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Get the response body as a string.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Get the response body as JSON.
    pub fn body_json<T: DeserializeOwned>(&self) -> O11yResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Text worth logging for a failed call.
    ///
    /// Prefers the `error` field of the backend's `{"status":"error","error":..}`
    /// wrapper and falls back to the raw body.
    pub fn error_message(&self) -> String {
        #[derive(Deserialize)]
        struct ErrorWrapper {
            error: String,
        }

        match serde_json::from_slice::<ErrorWrapper>(&self.body) {
            Ok(wrapper) if !wrapper.error.is_empty() => wrapper.error,
            _ => self.body_string(),
        }
    }
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Create a transport. `None` keeps reqwest's default (no) timeout.
    pub fn new(timeout: Option<Duration>) -> O11yResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| O11yError::transport(format!("failed to create client: {e}")))?;

        Ok(Self { client, timeout })
    }

    /// Get the timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> O11yResult<ApiResponse> {
        let response = self
            .client
            .post(&request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| O11yError::transport(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| O11yError::transport(format!("failed to read body: {e}")))?;

        Ok(ApiResponse { status, body })
    }
}

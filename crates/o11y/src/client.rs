//! Process lifecycle client.
//!
//! A [`LifecycleClient`] owns one credential and at most one process
//! registration. Each operation performs a single POST and reports success as
//! a `bool`; failures are logged once and never propagate.
//!
//! ```text
//! Unregistered ──register──► Registered ──update / send_metrics──► Registered
//!                                 │
//!                                 └──report_state──► (terminal on the backend)
//! ```
//!
//! The client does not track the terminal transition itself. Callers stop
//! issuing calls after reporting a final state.

use std::collections::BTreeMap;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::credential::{AuthMode, Credential};
use crate::envelope::{MetricRecord, MetricsEnvelope, StepCounter};
use crate::error::{ConfigError, O11yError, O11yResult};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

/// User metadata attached to a process.
pub type Metadata = BTreeMap<String, String>;

/// Metric recording one HTTP exchange per operation and outcome.
pub const REQUESTS_METRIC: &str = "o11y_client_requests_total";

const REGISTER_PATH: &str = "api/v1/process/new";

/// Body of a registration request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Project the process belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Run name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    /// Free-form metadata.
    pub user_metadata: Metadata,
}

impl Registration {
    /// A registration carrying only metadata.
    pub fn new(user_metadata: Metadata) -> Self {
        Self {
            project: None,
            run: None,
            user_metadata,
        }
    }

    /// Set the project.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Set the run name.
    #[must_use]
    pub fn with_run(mut self, run: impl Into<String>) -> Self {
        self.run = Some(run.into());
        self
    }
}

/// The identity obtained from the backend, plus the step axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessRegistration {
    process_id: Option<String>,
    user_metadata: Metadata,
    steps: StepCounter,
}

impl ProcessRegistration {
    /// Backend-assigned process identifier.
    pub fn process_id(&self) -> Option<&str> {
        self.process_id.as_deref()
    }

    /// Metadata as last accepted by the backend.
    pub fn user_metadata(&self) -> &Metadata {
        &self.user_metadata
    }

    /// Step the next default-axis submission will use.
    pub fn step(&self) -> u64 {
        self.steps.current()
    }

    fn clear(&mut self) {
        self.process_id = None;
        self.user_metadata.clear();
        self.steps.reset();
    }
}

#[derive(Serialize)]
struct UpdateMetadataBody<'a> {
    user_metadata: &'a Metadata,
}

#[derive(Serialize)]
struct StateBody<'a> {
    state: &'a str,
}

#[derive(Deserialize)]
struct RegisterResponse {
    data: RegisterData,
}

#[derive(Deserialize)]
struct RegisterData {
    process_uuid: String,
}

/// Client for one credential and one process registration at a time.
#[derive(Debug)]
pub struct LifecycleClient<T = HttpTransport> {
    credential: Option<Credential>,
    auth: AuthMode,
    registration: ProcessRegistration,
    transport: T,
}

impl LifecycleClient<HttpTransport> {
    /// Create a client backed by reqwest.
    ///
    /// Fails only when the HTTP stack cannot be initialised. A missing or
    /// invalid credential is logged and leaves the client unconfigured.
    pub fn new(config: &ClientConfig) -> O11yResult<Self> {
        let transport = HttpTransport::new(config.request_timeout)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> LifecycleClient<T> {
    /// Create a client over an arbitrary transport.
    pub fn with_transport(config: &ClientConfig, transport: T) -> Self {
        let mut client = Self {
            credential: None,
            auth: config.auth,
            registration: ProcessRegistration::default(),
            transport,
        };
        client.set_credentials(config.credentials.as_deref());
        client
    }

    /// Parse and install a credential, replacing the current one.
    ///
    /// On failure the credential is cleared and network operations become
    /// no-ops returning `false`.
    pub fn set_credentials(&mut self, credentials: Option<&str>) -> bool {
        match Credential::parse_optional(credentials) {
            Ok(credential) => {
                info!(endpoint = %credential.endpoint(), "credentials set");
                self.credential = Some(credential);
                true
            }
            Err(e) => {
                warn!(error = %e, "invalid credentials, telemetry will not be sent");
                self.credential = None;
                false
            }
        }
    }

    /// Whether a usable credential is installed.
    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }

    /// The installed credential.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Endpoint root, if configured.
    pub fn endpoint(&self) -> Option<&str> {
        self.credential.as_ref().map(Credential::endpoint)
    }

    /// Auth mode in use.
    pub fn auth_mode(&self) -> AuthMode {
        self.auth
    }

    /// Current registration state.
    pub fn registration(&self) -> &ProcessRegistration {
        &self.registration
    }

    /// Backend-assigned process identifier.
    pub fn process_id(&self) -> Option<&str> {
        self.registration.process_id()
    }

    /// Metadata of the registered process.
    pub fn user_metadata(&self) -> &Metadata {
        self.registration.user_metadata()
    }

    /// Step the next default-axis submission will use.
    pub fn step(&self) -> u64 {
        self.registration.step()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Register a new process carrying `user_metadata`.
    pub async fn register(&mut self, user_metadata: Metadata) -> bool {
        self.register_process(Registration::new(user_metadata)).await
    }

    /// Register a new process.
    ///
    /// Any previous registration is discarded first, so a failed call leaves the
    /// client unregistered.
    pub async fn register_process(&mut self, registration: Registration) -> bool {
        if let Some(previous) = self.registration.process_id() {
            debug!(process_id = %previous, "clearing existing process registration");
        }
        self.registration.clear();

        let result = self.try_register(&registration).await;
        match result {
            Ok(process_id) => {
                info!(process_id = %process_id, "process registered");
                self.registration.process_id = Some(process_id);
                self.registration.user_metadata = registration.user_metadata;
                true
            }
            Err(e) => report_failure("register", &e),
        }
    }

    async fn try_register(&self, registration: &Registration) -> O11yResult<String> {
        let response = self.post("register", REGISTER_PATH, registration).await?;
        let body: RegisterResponse = response.body_json().map_err(|_| {
            O11yError::api(
                response.status.as_u16(),
                format!("malformed response: {}", response.body_string()),
            )
        })?;
        Ok(body.data.process_uuid)
    }

    /// Replace the metadata of the registered process.
    pub async fn update(&mut self, metadata: Metadata) -> bool {
        let result = self.try_update(&metadata).await;
        match result {
            Ok(()) => {
                self.registration.user_metadata.extend(metadata);
                true
            }
            Err(e) => report_failure("update metadata", &e),
        }
    }

    async fn try_update(&self, metadata: &Metadata) -> O11yResult<()> {
        let process_id = self.require_process("update metadata")?;
        let path = format!("api/v1/process/{process_id}/update-metadata");
        self.post(
            "update metadata",
            &path,
            &UpdateMetadataBody {
                user_metadata: metadata,
            },
        )
        .await?;
        Ok(())
    }

    /// Report the process state (e.g. `successful`) to the backend.
    pub async fn report_state(&mut self, state: &str) -> bool {
        match self.try_report_state(state).await {
            Ok(()) => {
                info!(state, "process state reported");
                true
            }
            Err(e) => report_failure("report state", &e),
        }
    }

    async fn try_report_state(&self, state: &str) -> O11yResult<()> {
        let process_id = self.require_process("report state")?;
        let path = format!("api/v1/process/{process_id}/state");
        self.post("report state", &path, &StateBody { state }).await?;
        Ok(())
    }

    /// Submit one metrics record.
    ///
    /// Without an explicit axis the record lands on the next auto-incremented
    /// step. Invalid records are rejected before any request is sent.
    pub async fn send_metrics(&mut self, record: &MetricRecord) -> bool {
        match self.try_send_metrics(record).await {
            Ok(()) => true,
            Err(e) => report_failure("send metrics", &e),
        }
    }

    async fn try_send_metrics(&mut self, record: &MetricRecord) -> O11yResult<()> {
        let process_id = self.require_process("send metrics")?.to_string();
        let payload = MetricsEnvelope::build(&mut self.registration.steps, record)?;
        let path = format!("api/v1/process/{process_id}/model-metrics");
        self.post("send metrics", &path, &payload).await?;
        Ok(())
    }

    fn require_process(&self, operation: &'static str) -> O11yResult<&str> {
        self.registration
            .process_id()
            .ok_or(O11yError::NotRegistered { operation })
    }

    fn request(&self, path: &str, body: &impl Serialize) -> O11yResult<ApiRequest> {
        let credential = self
            .credential
            .as_ref()
            .ok_or(O11yError::Config(ConfigError::Missing))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(value) = credential.authorization(self.auth) {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| O11yError::validation(format!("invalid authorization header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(ApiRequest {
            url: credential.api_url(path),
            headers,
            body: Bytes::from(serde_json::to_vec(body)?),
        })
    }

    async fn post(
        &self,
        operation: &'static str,
        path: &str,
        body: &impl Serialize,
    ) -> O11yResult<ApiResponse> {
        let request = self.request(path, body)?;
        debug!(operation, url = %request.url, "sending request");

        let response = self.transport.send(request).await.map_err(|e| {
            record_request(operation, e.category());
            e
        })?;

        if response.status != StatusCode::OK {
            record_request(operation, "api_error");
            return Err(O11yError::api(
                response.status.as_u16(),
                response.error_message(),
            ));
        }

        record_request(operation, "success");
        Ok(response)
    }
}

fn record_request(operation: &'static str, outcome: &'static str) {
    metrics::counter!(REQUESTS_METRIC, "operation" => operation, "outcome" => outcome)
        .increment(1);
}

fn report_failure(operation: &'static str, err: &O11yError) -> bool {
    match err {
        O11yError::Api { status, body } => {
            error!(operation, http.status_code = status, error = %body, "request rejected by backend");
        }
        O11yError::Transport { .. } | O11yError::Json(_) => {
            error!(operation, error = %err, "request failed");
        }
        _ => {
            record_request(operation, "skipped");
            error!(operation, error = %err, "operation not sent");
        }
    }
    false
}

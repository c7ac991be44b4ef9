//! Training-run session facade.
//!
//! [`Session`] is the friendly surface most training scripts use: `init` once,
//! `log` every step, `update` when metadata changes and `finish` at the end.
//! It owns its [`LifecycleClient`] instead of reaching for a global one.
//!
//! ```rust,ignore
//! use o11y::{ClientConfig, InitOptions, LifecycleClient, MetricRecord, Session};
//!
//! let client = LifecycleClient::new(&ClientConfig::from_env()?)?;
//! let mut session = Session::new(client);
//! session.init(InitOptions::new().project("vision").run("resnet-50")).await;
//! session.log(MetricRecord::from_pairs([("loss", 0.42)])).await;
//! session.finish().await;
//! ```

use tracing::{error, warn};

use crate::client::{LifecycleClient, Metadata, Registration};
use crate::envelope::{MetricRecord, Metrics, XAxis};
use crate::transport::{HttpTransport, Transport};

/// Project used when `init` names none.
pub const DEFAULT_PROJECT: &str = "Default";

/// State reported by [`Session::finish`].
pub const STATE_SUCCESSFUL: &str = "successful";

/// Metadata keys that shadow top-level registration fields.
const RESERVED_METADATA_KEYS: [&str; 2] = ["project", "run"];

/// Options for [`Session::init`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitOptions {
    /// Project name.
    pub project: Option<String>,
    /// Run name.
    pub run: Option<String>,
    /// Metadata attached to the run.
    pub metadata: Metadata,
}

impl InitOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the project.
    #[must_use]
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Set the run name.
    #[must_use]
    pub fn run(mut self, run: impl Into<String>) -> Self {
        self.run = Some(run.into());
        self
    }

    /// Add one metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A training run bound to one client.
#[derive(Debug)]
pub struct Session<T = HttpTransport> {
    client: LifecycleClient<T>,
}

impl<T: Transport> Session<T> {
    /// Wrap a client.
    pub fn new(client: LifecycleClient<T>) -> Self {
        Self { client }
    }

    /// Register the run. Call once at the beginning of the script.
    ///
    /// Metadata keys containing `.` are rejected without contacting the
    /// backend.
    pub async fn init(&mut self, options: InitOptions) -> bool {
        for key in options.metadata.keys() {
            if RESERVED_METADATA_KEYS.contains(&key.as_str()) {
                warn!(
                    key = %key,
                    "metadata key is redundant with the top-level field of the same name and may not behave as expected"
                );
            }
            if key.contains('.') {
                error!(key = %key, "metadata key contains a period, which is not allowed");
                return false;
            }
        }

        let project = options.project.unwrap_or_else(|| {
            warn!("no project name provided, the run will be logged to project '{DEFAULT_PROJECT}'");
            DEFAULT_PROJECT.to_string()
        });

        let mut registration = Registration::new(options.metadata).with_project(project);
        registration.run = options.run;

        let registered = self.client.register_process(registration).await;
        if !registered {
            error!("initialization failed, logs will NOT be sent");
        }
        registered
    }

    /// Log metrics on the auto-incrementing step axis.
    pub async fn log(&mut self, record: MetricRecord) -> bool {
        self.client.send_metrics(&record).await
    }

    /// Log metrics at an explicit axis position.
    pub async fn log_with_axis(&mut self, metrics: Metrics, x_axis: XAxis) -> bool {
        self.log(MetricRecord::new(metrics).with_x_axis(x_axis)).await
    }

    /// Update the run's metadata.
    pub async fn update(&mut self, metadata: Metadata) -> bool {
        self.client.update(metadata).await
    }

    /// Mark the run as successfully finished.
    pub async fn finish(&mut self) -> bool {
        self.client.report_state(STATE_SUCCESSFUL).await
    }

    /// The underlying client.
    pub fn client(&self) -> &LifecycleClient<T> {
        &self.client
    }

    /// Mutable access to the underlying client.
    pub fn client_mut(&mut self) -> &mut LifecycleClient<T> {
        &mut self.client
    }

    /// Unwrap the client.
    pub fn into_client(self) -> LifecycleClient<T> {
        self.client
    }
}

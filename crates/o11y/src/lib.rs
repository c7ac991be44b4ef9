//! o11y - instrumentation client for AI training runs
//!
//! A running workload registers itself as a *process* with the AI training
//! observability backend, pushes model metrics and metadata while it runs, and
//! reports its final state when done. Optionally it launches a sidecar that
//! captures its stdout/stderr for forwarding.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── training process ────────────────────────────┐
//! │                                                                          │
//! │  Session ──► LifecycleClient ──► Transport ──── HTTPS ────────────────────┼──► backend
//! │                 │      │                                                 │   /api/v1/process/...
//! │        Credential      MetricsEnvelope (step axis)                       │
//! │                                                                          │
//! │  SidecarLauncher ── dup(1), dup(2) ── "{out} {err}\n" on stdin ──► sidecar│
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`credential`]: parses the connection string into an endpoint and optional
//!   principal/secret.
//! - [`envelope`]: validates metrics and builds the wire payload, advancing the
//!   step axis.
//! - [`client`]: the register → update/send metrics → report state lifecycle.
//! - [`sidecar`]: the descriptor handoff to the output-capture agent.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use o11y::{ClientConfig, LifecycleClient, MetricRecord, Metadata};
//!
//! let config = ClientConfig::from_env()?;
//! let mut client = LifecycleClient::new(&config)?;
//!
//! if client.register(Metadata::from([("owner".into(), "alice".into())])).await {
//!     client.send_metrics(&MetricRecord::from_pairs([("loss", 0.42)])).await;
//!     client.report_state("successful").await;
//! }
//! ```
//!
//! Every lifecycle operation returns `bool` and logs its failures through
//! `tracing`; none of them panic or return errors.

#![doc(html_root_url = "https://docs.rs/o11y/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod credential;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod session;
#[cfg(unix)]
pub mod sidecar;
pub mod transport;

pub use client::{LifecycleClient, Metadata, ProcessRegistration, Registration};
pub use config::{ClientConfig, ClientConfigBuilder, SidecarSettings};
pub use credential::{AuthMode, Credential, Scheme};
pub use envelope::{MetricRecord, MetricValue, Metrics, MetricsEnvelope, StepCounter, XAxis};
pub use error::{ConfigError, O11yError, O11yResult};
pub use session::{InitOptions, Session};
#[cfg(unix)]
pub use sidecar::{SidecarHandoff, SidecarLauncher};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

/// Client version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

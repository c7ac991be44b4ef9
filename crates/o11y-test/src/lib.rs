//! # o11y Test
//!
//! Test utilities for the o11y client.
//!
//! - [`RecordingTransport`]: an in-memory [`Transport`](o11y::Transport) that
//!   records every request and answers from a script. No sockets involved.
//! - [`MockBackend`]: a loopback HTTP/1 server speaking the backend's
//!   `/api/v1/process/...` surface, for exercising the real reqwest transport.
//!
//! ## Example
//!
//! ```ignore
//! use o11y::{ClientConfig, LifecycleClient, Metadata};
//! use o11y_test::RecordingTransport;
//!
//! #[tokio::test]
//! async fn registers() {
//!     let transport = RecordingTransport::new();
//!     transport.push_json(200, serde_json::json!({"data": {"process_uuid": "u1"}}));
//!
//!     let config = ClientConfig::builder().credentials("abc:123@example.com").build();
//!     let mut client = LifecycleClient::with_transport(&config, transport.clone());
//!
//!     assert!(client.register(Metadata::new()).await);
//!     assert_eq!(transport.request_count(), 1);
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/o11y-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod backend;
mod recording;

pub use backend::{MockBackend, RecordedRequest};
pub use recording::{RecordingTransport, Reply};

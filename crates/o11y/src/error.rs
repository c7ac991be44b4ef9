//! Error types for the o11y client.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading connection credentials or client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No credential string was supplied.
    #[error("missing credential")]
    Missing,

    /// The credential names a scheme other than `http` or `https`.
    #[error("unsupported scheme: {scheme}")]
    UnsupportedScheme {
        /// The rejected scheme.
        scheme: String,
    },

    /// The credential could not be parsed as an endpoint.
    #[error("malformed credential: {reason}")]
    Malformed {
        /// Why parsing failed.
        reason: String,
    },

    /// A configuration file could not be loaded.
    #[error("failed to load configuration file {path}: {reason}")]
    File {
        /// Path to the file.
        path: PathBuf,
        /// Why loading failed.
        reason: String,
    },

    /// A configuration value is out of range or unparseable.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// The offending field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },
}

impl ConfigError {
    /// Create a malformed-credential error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Create a file loading error.
    pub fn file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::File {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Client errors.
#[derive(Debug, Error)]
pub enum O11yError {
    /// Credential or configuration problem.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Metrics or metadata rejected before any request was sent.
    #[error("Validation error: {message}")]
    Validation {
        /// Error message.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// The operation needs a registered process.
    #[error("No process registered, unable to {operation}")]
    NotRegistered {
        /// The attempted operation.
        operation: &'static str,
    },

    /// Connection-level failure while talking to the backend.
    #[error("Transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// The backend answered with something other than 200.
    #[error("API error (status {status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, or the decoded error message.
        body: String,
    },

    /// The sidecar binary could not be started or handed its descriptors.
    #[error("Failed to launch sidecar {path}: {source}")]
    Launch {
        /// Binary that was launched.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl O11yError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error with field.
    pub fn validation_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an API error.
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Create a launch error.
    pub fn launch(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Launch {
            path: path.into(),
            source,
        }
    }

    /// Whether the client keeps working after this error.
    ///
    /// Only a failed sidecar launch has no degraded mode.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Launch { .. })
    }

    /// Get the error category, used as the `outcome` metric label.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Validation { .. } => "validation",
            Self::NotRegistered { .. } => "not_registered",
            Self::Transport { .. } => "transport_error",
            Self::Api { .. } => "api_error",
            Self::Launch { .. } => "launch",
            Self::Json(_) => "json",
        }
    }
}

/// Result type for client operations.
pub type O11yResult<T> = Result<T, O11yError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        assert_eq!(ConfigError::Missing.to_string(), "missing credential");

        let err = ConfigError::UnsupportedScheme {
            scheme: "ftp".to_string(),
        };
        assert_eq!(err.to_string(), "unsupported scheme: ftp");

        let err: O11yError = ConfigError::malformed("no host").into();
        assert!(err.to_string().contains("Configuration error"));
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_error_constructors() {
        let err = O11yError::validation_with_field("value is not finite", "loss");
        match &err {
            O11yError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("loss")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.category(), "validation");

        let err = O11yError::api(503, "unavailable");
        assert_eq!(err.to_string(), "API error (status 503): unavailable");
        assert_eq!(err.category(), "api_error");

        let err = O11yError::NotRegistered {
            operation: "send metrics",
        };
        assert_eq!(err.to_string(), "No process registered, unable to send metrics");
    }

    #[test]
    fn test_is_recoverable() {
        assert!(O11yError::transport("connection refused").is_recoverable());
        assert!(O11yError::api(500, "").is_recoverable());
        assert!(O11yError::from(ConfigError::Missing).is_recoverable());

        let err = O11yError::launch(
            "/missing/agent",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("/missing/agent"));
        assert_eq!(err.category(), "launch");

        let err = O11yError::from(serde_json::from_str::<u8>("x").unwrap_err());
        assert_eq!(err.category(), "json");
    }
}

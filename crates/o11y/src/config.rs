//! Client configuration.
//!
//! The core never reads the environment on its own. Callers build a
//! [`ClientConfig`] explicitly, load one from a file, or use
//! [`ClientConfig::from_env`] at the program boundary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::credential::AuthMode;
use crate::error::ConfigError;

/// Environment variable holding the connection credential.
pub const CREDENTIALS_ENV: &str = "GF_AI_TRAINING_CREDS";

/// Environment variable selecting the [`AuthMode`].
pub const AUTH_MODE_ENV: &str = "O11Y_AUTH_MODE";

/// Environment variable holding the request timeout (e.g. `30s`).
pub const REQUEST_TIMEOUT_ENV: &str = "O11Y_REQUEST_TIMEOUT";

/// Environment variable naming the sidecar binary.
pub const SIDECAR_PATH_ENV: &str = "O11Y_SIDECAR_PATH";

/// Client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection credential, `[scheme://][principal:secret@]host[:port][/path]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
    /// How the embedded principal/secret are sent.
    pub auth: AuthMode,
    /// Per-request timeout. `None` keeps the HTTP stack default.
    #[serde(with = "duration_serde", skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<Duration>,
    /// Sidecar settings.
    pub sidecar: SidecarSettings,
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Load configuration from a `.toml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::file(path, format!("failed to read: {e}")))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match extension {
            "toml" => toml::from_str(&content)
                .map_err(|e| ConfigError::file(path, format!("invalid TOML: {e}"))),
            "json" => serde_json::from_str(&content)
                .map_err(|e| ConfigError::file(path, format!("invalid JSON: {e}"))),
            _ => Err(ConfigError::file(
                path,
                format!("unsupported config format: {extension}"),
            )),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Reads [`CREDENTIALS_ENV`], [`AUTH_MODE_ENV`], [`REQUEST_TIMEOUT_ENV`] and
    /// [`SIDECAR_PATH_ENV`]. Unset variables leave the current value alone.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(credentials) = lookup(CREDENTIALS_ENV) {
            self.credentials = Some(credentials);
        }

        if let Some(auth) = lookup(AUTH_MODE_ENV) {
            self.auth = auth.parse()?;
        }

        if let Some(timeout) = lookup(REQUEST_TIMEOUT_ENV) {
            let timeout = duration_serde::parse_duration(&timeout)
                .map_err(|e| ConfigError::invalid_value("request_timeout", e))?;
            self.request_timeout = Some(timeout);
        }

        if let Some(path) = lookup(SIDECAR_PATH_ENV) {
            self.sidecar.binary_path = Some(PathBuf::from(path));
        }

        Ok(self)
    }
}

/// Output-capture sidecar settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarSettings {
    /// Sidecar binary to launch.
    pub binary_path: Option<PathBuf>,
    /// Wire the sidecar's own stdout/stderr to ours instead of `/dev/null`.
    pub inherit_stdio: bool,
}

/// Builder for `ClientConfig`.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the connection credential.
    #[must_use]
    pub fn credentials(mut self, credentials: impl Into<String>) -> Self {
        self.config.credentials = Some(credentials.into());
        self
    }

    /// Set the auth mode.
    #[must_use]
    pub fn auth(mut self, auth: AuthMode) -> Self {
        self.config.auth = auth;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Set the sidecar binary.
    #[must_use]
    pub fn sidecar_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.sidecar.binary_path = Some(path.into());
        self
    }

    /// Wire the sidecar's own stdio to ours.
    #[must_use]
    pub fn sidecar_inherit_stdio(mut self, inherit: bool) -> Self {
        self.config.sidecar.inherit_stdio = inherit;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Optional durations written as `500ms`, `30s`, `5m`, `1h` or bare seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) if d.subsec_millis() != 0 => {
                serializer.serialize_str(&format!("{}ms", d.as_millis()))
            }
            Some(d) => serializer.serialize_str(&format!("{}s", d.as_secs())),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }

    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let number = |digits: &str| -> Result<u64, String> {
            digits
                .trim()
                .parse()
                .map_err(|_| format!("invalid duration: {s:?}"))
        };

        let scaled = |digits: &str, factor: u64| -> Result<Duration, String> {
            number(digits)?
                .checked_mul(factor)
                .map(Duration::from_secs)
                .ok_or_else(|| format!("duration out of range: {s:?}"))
        };

        if let Some(stripped) = s.strip_suffix("ms") {
            Ok(Duration::from_millis(number(stripped)?))
        } else if let Some(stripped) = s.strip_suffix('s') {
            scaled(stripped, 1)
        } else if let Some(stripped) = s.strip_suffix('m') {
            scaled(stripped, 60)
        } else if let Some(stripped) = s.strip_suffix('h') {
            scaled(stripped, 3600)
        } else {
            scaled(s, 1)
        }
    }
}

//! Connection credential parsing.
//!
//! A credential is a single connection string of the form
//! `[scheme://][principal:secret@]host[:port][/path]`. It is parsed once into a
//! [`Credential`] holding the endpoint root that every API path is appended to,
//! plus whatever principal and secret were embedded as URL userinfo.
//!
//! ```rust
//! use o11y::credential::Credential;
//!
//! let credential = Credential::parse("abc:123@example.com").unwrap();
//! assert_eq!(credential.endpoint(), "https://example.com");
//! assert_eq!(credential.principal(), Some("abc"));
//! ```

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Separator that marks an explicit scheme.
const SCHEME_SEPARATOR: &str = "://";

/// Scheme assumed when the credential names none.
const DEFAULT_SCHEME_PREFIX: &str = "https://";

/// Endpoint scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
}

impl Scheme {
    /// The scheme as it appears in a URL.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the embedded principal/secret become an `Authorization` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Never send an `Authorization` header.
    None,
    /// `Basic base64(principal:secret)`, as derived from URL userinfo.
    #[default]
    Basic,
    /// `Bearer principal:secret`.
    Bearer,
}

impl FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "basic" => Ok(Self::Basic),
            "bearer" => Ok(Self::Bearer),
            other => Err(ConfigError::invalid_value(
                "auth",
                format!("expected none, basic or bearer, got {other:?}"),
            )),
        }
    }
}

/// A parsed connection credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    scheme: Scheme,
    host: String,
    endpoint: String,
    principal: Option<String>,
    secret: Option<String>,
}

impl Credential {
    /// Parse a connection string.
    ///
    /// Without an explicit `scheme://` the string must carry `principal:secret@`
    /// userinfo and is read as `https`.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ConfigError::Missing);
        }

        let url = if has_scheme(input) {
            Url::parse(input).map_err(|e| ConfigError::malformed(e.to_string()))?
        } else {
            if !input.contains('@') {
                return Err(ConfigError::malformed(
                    "expected [scheme://][principal:secret@]host",
                ));
            }
            Url::parse(&format!("{DEFAULT_SCHEME_PREFIX}{input}"))
                .map_err(|e| ConfigError::malformed(e.to_string()))?
        };

        Self::from_url(&url)
    }

    /// Parse an optional connection string, treating `None` as missing.
    pub fn parse_optional(input: Option<&str>) -> Result<Self, ConfigError> {
        input.map_or(Err(ConfigError::Missing), Self::parse)
    }

    fn from_url(url: &Url) -> Result<Self, ConfigError> {
        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(ConfigError::UnsupportedScheme {
                    scheme: other.to_string(),
                })
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::malformed("missing host"))?
            .to_string();

        let mut endpoint = format!("{scheme}://{host}");
        if let Some(port) = url.port() {
            endpoint.push_str(&format!(":{port}"));
        }
        endpoint.push_str(url.path().trim_end_matches('/'));

        Ok(Self {
            scheme,
            host,
            endpoint,
            principal: decode_userinfo(url.username())?,
            secret: url.password().map(decode_userinfo).transpose()?.flatten(),
        })
    }

    /// Endpoint scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Endpoint host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Endpoint root without userinfo or trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Embedded principal (tenant), if any.
    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    /// Embedded secret (token), if any.
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    /// Join an API path onto the endpoint root.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    /// Build the `Authorization` header value for `mode`.
    ///
    /// Returns `None` when the mode is [`AuthMode::None`] or the credential
    /// carries neither principal nor secret.
    pub fn authorization(&self, mode: AuthMode) -> Option<String> {
        if self.principal.is_none() && self.secret.is_none() {
            return None;
        }
        let pair = format!(
            "{}:{}",
            self.principal.as_deref().unwrap_or_default(),
            self.secret.as_deref().unwrap_or_default()
        );
        match mode {
            AuthMode::None => None,
            AuthMode::Basic => Some(format!("Basic {}", STANDARD.encode(pair))),
            AuthMode::Bearer => Some(format!("Bearer {pair}")),
        }
    }
}

impl FromStr for Credential {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("endpoint", &self.endpoint)
            .field("principal", &self.principal)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Whether `input` starts with `scheme://`. A `://` further along (say in a
/// query parameter) does not count.
fn has_scheme(input: &str) -> bool {
    let Some((scheme, _)) = input.split_once(SCHEME_SEPARATOR) else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn decode_userinfo(raw: &str) -> Result<Option<String>, ConfigError> {
    if raw.is_empty() {
        return Ok(None);
    }
    let decoded = urlencoding::decode(raw)
        .map_err(|e| ConfigError::malformed(format!("invalid userinfo encoding: {e}")))?;
    Ok(Some(decoded.into_owned()))
}

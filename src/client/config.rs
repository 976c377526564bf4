//! Client configuration.
//!
//! [`ClientConfig`] holds the plain, serializable settings; [`ClientOptions`]
//! bundles them with the parts that cannot be serialized (lifecycle hooks and
//! the root cancellation scope). Both are consumed by
//! [`KsqlClient::new`](crate::client::KsqlClient::new), after which the
//! client's configuration is frozen.
//!
//! # Examples
//!
//! ```
//! use ksqldb_http::client::{ClientConfig, ClientOptions};
//!
//! let config = ClientConfig {
//!     url: "http://ksqldb:8088".to_string(),
//!     max_record_len: 1024 * 1024,
//!     ..Default::default()
//! };
//! let options = ClientOptions::default().with_config(config);
//! assert_eq!(options.config.pool_idle_timeout_secs, 90);
//! ```

use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::ClientTrace;
use crate::error::{KsqlError, Result};
use crate::scope::Scope;

/// Default maximum length of a single streamed record.
pub const DEFAULT_MAX_RECORD_LEN: usize = 64 * 1024;

/// Serializable client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base server URL. Must declare a scheme and carry no path beyond `/`.
    pub url: String,

    /// How long an idle pooled connection is kept, in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle pooled connections per host.
    pub pool_max_idle_per_host: usize,

    /// Connection establishment timeout in milliseconds, if any.
    pub connect_timeout_ms: Option<u64>,

    /// Longest record the streaming engine will frame before failing the
    /// stream.
    pub max_record_len: usize,

    /// Emit `tracing` events for dispatch failures.
    pub enable_logging: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: "http://localhost:8088".to_string(),
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 32,
            connect_timeout_ms: None,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            enable_logging: true,
        }
    }
}

/// Everything [`KsqlClient::new`](crate::client::KsqlClient::new) needs.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Plain settings.
    pub config: ClientConfig,
    /// Lifecycle hooks.
    pub trace: Option<ClientTrace>,
    /// Root cancellation scope. Defaults to a scope that never ends.
    pub scope: Option<Scope>,
}

impl ClientOptions {
    /// Options for the server at `url`, everything else defaulted.
    pub fn new(url: impl Into<String>) -> Self {
        ClientOptions {
            config: ClientConfig {
                url: url.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Replace the plain settings.
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach lifecycle hooks.
    pub fn with_trace(mut self, trace: ClientTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Derive every request from `scope` instead of a background scope.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Parse and validate a base server URL.
///
/// The URL must parse, declare an `http` or `https` scheme, and have either
/// no path or exactly `/`.
pub fn validate_server_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| KsqlError::Configuration(format!("url {raw}: {e}")))?;

    if url.scheme().is_empty() || url.cannot_be_a_base() {
        return Err(KsqlError::Configuration(format!("url {raw} missing scheme")));
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Err(KsqlError::Configuration(format!(
            "url {raw} has unsupported scheme {}",
            url.scheme()
        )));
    }
    if !url.path().is_empty() && url.path() != "/" {
        return Err(KsqlError::Configuration(format!(
            "url {raw} should not contain path"
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_server_url("http://host:8088").is_ok());
        assert!(validate_server_url("http://host:8088/").is_ok());
        assert!(validate_server_url("https://10.0.0.1").is_ok());
    }

    #[test]
    fn test_missing_scheme() {
        for raw in ["host:8088", "0.0.0.0:8088", "//host:8088", "host"] {
            let err = validate_server_url(raw).unwrap_err();
            assert!(matches!(err, KsqlError::Configuration(_)), "{raw}");
        }
    }

    #[test]
    fn test_path_rejected() {
        let err = validate_server_url("http://host:8088/ksql").unwrap_err();
        assert!(err.to_string().contains("should not contain path"));
    }

    #[test]
    fn test_config_from_json() {
        let config: ClientConfig =
            serde_json::from_str(r#"{ "url": "http://ksql:8088", "max_record_len": 10 }"#).unwrap();
        assert_eq!(config.url, "http://ksql:8088");
        assert_eq!(config.max_record_len, 10);
        assert_eq!(config.pool_idle_timeout_secs, 90);
        assert!(config.enable_logging);
    }
}

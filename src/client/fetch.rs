//! The ksqlDB HTTP client.
//!
//! [`KsqlClient`] owns the transport, the validated server URL, optional
//! lifecycle hooks and a root cancellation scope. Configuration is frozen at
//! construction: there are getters, no setters.
//!
//! # Examples
//!
//! ## Running a statement
//!
//! ```ignore
//! use ksqldb_http::{ClientOptions, KsqlClient, Resource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = KsqlClient::new(ClientOptions::new("http://localhost:8088"))?;
//!     let response = client.execute(&Resource::statement("SHOW STREAMS;")).await?;
//!     let (body, result) = response.read_all().await;
//!     result?;
//!     println!("{}", String::from_utf8_lossy(&body));
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming a push query
//!
//! ```ignore
//! use ksqldb_http::{ClientOptions, KsqlClient, Resource, Scope};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scope = Scope::background().with_timeout(Duration::from_secs(6));
//!     let options = ClientOptions::new("http://localhost:8088").with_scope(scope);
//!     let client = KsqlClient::new(options)?;
//!     let response = client
//!         .execute(&Resource::query("SELECT * FROM transactions EMIT CHANGES;"))
//!         .await?;
//!
//!     let result = response
//!         .read_streaming(|row| {
//!             println!("<< {}", String::from_utf8_lossy(&row));
//!             Ok(())
//!         })
//!         .await;
//!     match result {
//!         Err(e) if e.is_canceled() => println!("done"),
//!         other => other?,
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn, Instrument};
use url::Url;

use crate::client::{validate_server_url, ClientConfig, ClientOptions, ClientTrace, Requester};
use crate::error::{KsqlError, Result};
use crate::response::{Response, ResponseHead};
use crate::scope::Scope;

/// Client for the ksqlDB REST API.
///
/// Cheap to clone; clones share the transport pool and the root scope. Safe
/// to use from many tasks at once.
#[derive(Clone)]
pub struct KsqlClient {
    server_url: Url,
    http: reqwest::Client,
    trace: Option<ClientTrace>,
    scope: Scope,
    config: Arc<ClientConfig>,
}

impl KsqlClient {
    /// Create a client for the configured server.
    ///
    /// Fails without side effects if the server URL is invalid or the
    /// transport cannot be built.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let ClientOptions {
            config,
            trace,
            scope,
        } = options;

        let server_url = validate_server_url(&config.url)?;

        // Records are scanned straight off the wire, so the body must arrive
        // uncompressed.
        let mut builder = reqwest::Client::builder()
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host);
        if let Some(ms) = config.connect_timeout_ms {
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }
        if trace.as_ref().is_some_and(|t| t.connection_verbose) {
            builder = builder.connection_verbose(true);
        }
        let http = builder
            .build()
            .map_err(|e| KsqlError::Configuration(format!("building transport: {e}")))?;

        Ok(KsqlClient {
            server_url,
            http,
            trace,
            scope: scope.unwrap_or_default(),
            config: Arc::new(config),
        })
    }

    /// The validated server URL.
    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    /// The underlying transport.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    /// The lifecycle hooks, if any.
    pub fn trace(&self) -> Option<&ClientTrace> {
        self.trace.as_ref()
    }

    /// The root scope every exchange derives from.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Perform one exchange.
    ///
    /// Builds the request from `resource`, derives a child scope from the
    /// root, runs the hooks and dispatches. The returned [`Response`] owns the
    /// live body; nothing is read from it yet.
    ///
    /// # Errors
    ///
    /// [`KsqlError::RequestBuild`] if `resource` cannot produce its request,
    /// [`KsqlError::Transport`] if dispatch fails or the scope ends before the
    /// response head arrives. In the latter case the derived scope has
    /// already been canceled.
    pub async fn execute<R>(&self, resource: &R) -> Result<Response>
    where
        R: Requester + ?Sized,
    {
        let prepared = resource
            .request(&self.server_url)
            .map_err(|e| KsqlError::RequestBuild(Box::new(e)))?;

        let scope = self.scope.child();

        if let Some(trace) = &self.trace {
            trace.request_prepared(&prepared);
        }

        let span = tracing::debug_span!(
            "ksql_request",
            method = %prepared.method(),
            url = %prepared.url()
        );
        let request = prepared.to_reqwest();

        let result = async {
            debug!("dispatching");
            tokio::select! {
                biased;
                cause = scope.done() => Err(KsqlError::Transport(cause.to_string())),
                sent = self.http.execute(request) => {
                    sent.map_err(|e| KsqlError::Transport(e.to_string()))
                }
            }
        }
        .instrument(span.clone())
        .await;

        let head = result.as_ref().ok().map(ResponseHead::of);
        if let Some(trace) = &self.trace {
            match (&head, &result) {
                (Some(head), _) => trace.response_delivered(Ok(head)),
                (None, Err(e)) => trace.response_delivered(Err(e)),
                (None, Ok(_)) => {}
            }
        }

        match result {
            Ok(response) => {
                span.in_scope(|| debug!(status = %response.status(), "response delivered"));
                Ok(Response::from_reqwest(response, scope, self.config.max_record_len))
            }
            Err(e) => {
                scope.cancel();
                if self.config.enable_logging {
                    span.in_scope(|| warn!(error = %e, "ksql request failed"));
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for KsqlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KsqlClient")
            .field("server_url", &self.server_url.as_str())
            .field("trace", &self.trace)
            .field("scope", &self.scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = KsqlClient::new(ClientOptions::new("http://host:8088")).unwrap();
        assert_eq!(client.server_url().as_str(), "http://host:8088/");
        assert_eq!(client.config().max_record_len, crate::client::DEFAULT_MAX_RECORD_LEN);
        assert!(client.trace().is_none());
        assert!(!client.scope().is_done());
    }

    #[test]
    fn test_client_rejects_bad_urls() {
        assert!(matches!(
            KsqlClient::new(ClientOptions::new("host:8088")),
            Err(KsqlError::Configuration(_))
        ));
        assert!(matches!(
            KsqlClient::new(ClientOptions::new("http://host:8088/api")),
            Err(KsqlError::Configuration(_))
        ));
    }

    #[test]
    fn test_clones_share_root_scope() {
        let client = KsqlClient::new(ClientOptions::new("http://host:8088")).unwrap();
        let other = client.clone();
        client.scope().cancel();
        assert!(other.scope().is_done());
    }
}

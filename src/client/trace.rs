//! Lifecycle hooks for instrumenting exchanges.
//!
//! [`ClientTrace`] is a flat set of optional callbacks. `request_prepared`
//! sees the request exactly as the builder produced it, before the client
//! attaches anything. `response_delivered` fires as soon as the status and
//! headers are known (or dispatch failed), which for a streaming query is
//! long before the body ends.
//!
//! # Examples
//!
//! ```
//! use ksqldb_http::client::ClientTrace;
//!
//! let trace = ClientTrace::new()
//!     .on_request_prepared(|req| println!("> {} {}", req.method(), req.url()))
//!     .on_response_delivered(|res| match res {
//!         Ok(head) => println!("< {}", head.status),
//!         Err(e) => println!("< {e}"),
//!     });
//! assert!(trace.request_prepared.is_some());
//! ```

use std::fmt;
use std::sync::Arc;

use crate::client::PreparedRequest;
use crate::error::KsqlError;
use crate::response::ResponseHead;

/// Called with the pristine request before it is sent.
pub type RequestPreparedHook = Arc<dyn Fn(&PreparedRequest) + Send + Sync>;

/// Called with the response head, or the dispatch error, once known.
pub type ResponseDeliveredHook =
    Arc<dyn Fn(std::result::Result<&ResponseHead, &KsqlError>) + Send + Sync>;

/// Optional lifecycle hooks for every exchange a client performs.
#[derive(Clone, Default)]
pub struct ClientTrace {
    /// Invoked with the request as built, before any client mutation.
    pub request_prepared: Option<RequestPreparedHook>,

    /// Invoked once the status and headers are delivered, or dispatch fails.
    pub response_delivered: Option<ResponseDeliveredHook>,

    /// Low-level connection tracing: log connection reads and writes from the
    /// transport at `TRACE` level.
    pub connection_verbose: bool,
}

impl ClientTrace {
    /// An empty hook set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request-prepared hook.
    pub fn on_request_prepared<F>(mut self, hook: F) -> Self
    where
        F: Fn(&PreparedRequest) + Send + Sync + 'static,
    {
        self.request_prepared = Some(Arc::new(hook));
        self
    }

    /// Set the response-delivered hook.
    pub fn on_response_delivered<F>(mut self, hook: F) -> Self
    where
        F: Fn(std::result::Result<&ResponseHead, &KsqlError>) + Send + Sync + 'static,
    {
        self.response_delivered = Some(Arc::new(hook));
        self
    }

    /// Enable connection-level tracing in the transport.
    pub fn with_connection_verbose(mut self, verbose: bool) -> Self {
        self.connection_verbose = verbose;
        self
    }

    pub(crate) fn request_prepared(&self, request: &PreparedRequest) {
        if let Some(hook) = &self.request_prepared {
            hook(request);
        }
    }

    pub(crate) fn response_delivered(
        &self,
        result: std::result::Result<&ResponseHead, &KsqlError>,
    ) {
        if let Some(hook) = &self.response_delivered {
            hook(result);
        }
    }
}

impl fmt::Debug for ClientTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientTrace")
            .field("request_prepared", &self.request_prepared.is_some())
            .field("response_delivered", &self.response_delivered.is_some())
            .field("connection_verbose", &self.connection_verbose)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Requester, Resource};
    use parking_lot::Mutex;

    #[test]
    fn test_hooks_invoked() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let trace = {
            let seen = Arc::clone(&seen);
            ClientTrace::new()
                .on_request_prepared(move |req| seen.lock().push(req.url().to_string()))
        };

        let server = url::Url::parse("http://host:8088").unwrap();
        let request = Resource::statement("SHOW STREAMS;").request(&server).unwrap();
        trace.request_prepared(&request);
        trace.response_delivered(Err(&KsqlError::Transport("refused".into())));

        assert_eq!(seen.lock().as_slice(), ["http://host:8088/ksql"]);
    }

    #[test]
    fn test_debug_hides_closures() {
        let trace = ClientTrace::new().with_connection_verbose(true);
        let rendered = format!("{trace:?}");
        assert!(rendered.contains("connection_verbose: true"));
        assert!(rendered.contains("request_prepared: false"));
    }
}

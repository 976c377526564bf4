//! Error types for the ksqlDB HTTP client.
//!
//! Every failure is returned to the immediate caller; nothing in the crate
//! retries on its own. The variants are grouped by the phase that produced
//! them so callers can tell a bad configuration from a request that could not
//! be built, a request that could not be sent, or a response body that ended
//! badly.
//!
//! | Phase | Variants |
//! |-------|----------|
//! | Construction | [`KsqlError::Configuration`] |
//! | Request build | [`KsqlError::RequestBuild`], [`KsqlError::Serialization`], [`KsqlError::InvalidRequest`] |
//! | Dispatch | [`KsqlError::Transport`] |
//! | Stream | [`KsqlError::Canceled`], [`KsqlError::DeadlineExceeded`], [`KsqlError::Body`], [`KsqlError::RecordTooLong`], [`KsqlError::StreamClosed`] |
//! | Consumer | [`KsqlError::Handler`] |

use thiserror::Error;

/// Boxed error used for handler and body failures of arbitrary origin.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for ksqlDB client operations.
pub type Result<T> = std::result::Result<T, KsqlError>;

/// Errors produced by the client, the request builder and the response engine.
#[derive(Debug, Error)]
pub enum KsqlError {
    /// The client could not be constructed (bad server URL, transport setup).
    #[error("initializing ksqldb client: {0}")]
    Configuration(String),

    /// The payload could not be encoded as JSON.
    #[error("ksql request: marshaling payload: {0}")]
    Serialization(String),

    /// The method, URL or headers cannot form a transport request.
    #[error("ksql request: creating HTTP request: {0}")]
    InvalidRequest(String),

    /// A request source failed to produce its request.
    #[error("building ksql request: {0}")]
    RequestBuild(#[source] Box<KsqlError>),

    /// The request was built but could not be delivered.
    #[error("sending ksql request: {0}")]
    Transport(String),

    /// The response scope was canceled before the body ended.
    #[error("reading response body: context canceled")]
    Canceled,

    /// The response scope's deadline elapsed before the body ended.
    #[error("reading response body: context deadline exceeded")]
    DeadlineExceeded,

    /// The underlying body reader failed.
    #[error("reading response body: {0}")]
    Body(String),

    /// A single record exceeded the configured framing limit.
    #[error("reading response body: record exceeds {limit} bytes")]
    RecordTooLong {
        /// The configured maximum record length.
        limit: usize,
    },

    /// The terminal condition was already consumed by an earlier reader.
    #[error("reading response body: stream already closed")]
    StreamClosed,

    /// A record handler rejected a record.
    #[error(transparent)]
    Handler(BoxError),
}

impl KsqlError {
    /// Wrap an arbitrary failure raised inside a record handler.
    pub fn handler<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        KsqlError::Handler(err.into())
    }

    /// Whether this is a stream termination that mandates a final drain
    /// (cancellation or deadline).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, KsqlError::Canceled | KsqlError::DeadlineExceeded)
    }

    /// Whether the error is a scope cancellation, explicit or by deadline.
    pub fn is_canceled(&self) -> bool {
        self.is_recoverable()
    }

    /// Whether the error happened while building the request.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            KsqlError::RequestBuild(_) | KsqlError::Serialization(_) | KsqlError::InvalidRequest(_)
        )
    }

    /// Whether the error happened while dispatching the request.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, KsqlError::Transport(_))
    }
}

impl From<serde_json::Error> for KsqlError {
    fn from(err: serde_json::Error) -> Self {
        KsqlError::Serialization(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for KsqlError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        KsqlError::InvalidRequest(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for KsqlError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        KsqlError::InvalidRequest(err.to_string())
    }
}

impl From<http::Error> for KsqlError {
    fn from(err: http::Error) -> Self {
        KsqlError::InvalidRequest(err.to_string())
    }
}

impl From<url::ParseError> for KsqlError {
    fn from(err: url::ParseError) -> Self {
        KsqlError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_context_in_messages() {
        let build = KsqlError::RequestBuild(Box::new(KsqlError::Serialization("bad".into())));
        assert_eq!(
            build.to_string(),
            "building ksql request: ksql request: marshaling payload: bad"
        );
        assert!(build.is_build_error());

        let transport = KsqlError::Transport("connection refused".into());
        assert!(transport.to_string().starts_with("sending ksql request"));
        assert!(transport.is_transport_error());

        assert!(KsqlError::Canceled.to_string().starts_with("reading response body"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(KsqlError::Canceled.is_recoverable());
        assert!(KsqlError::DeadlineExceeded.is_recoverable());
        assert!(!KsqlError::Body("reset".into()).is_recoverable());
        assert!(!KsqlError::RecordTooLong { limit: 8 }.is_recoverable());
    }

    #[test]
    fn test_handler_error_is_transparent() {
        let err = KsqlError::handler("stop here");
        assert_eq!(err.to_string(), "stop here");
    }
}

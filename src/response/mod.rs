//! The streaming response engine.
//!
//! A [`Response`] wraps the live body of one exchange together with the
//! exchange's cancellation scope. Nothing is read until the first call to a
//! consumption method; that call starts exactly one background reader task
//! (see [`ResponseChannels`]) and every later call reuses it.
//!
//! # Consumption modes
//!
//! | Method | Behavior |
//! |--------|----------|
//! | [`Response::read`] | Raw pipes: records and the terminal condition |
//! | [`Response::read_streaming`] | Handler called per record, then once with the drained remainder |
//! | [`Response::read_all`] | Whole body in one buffer, plus the end result |
//! | [`Response::into_stream`] | A [`futures::Stream`] of records |
//!
//! # Termination
//!
//! When the reader reports a terminal condition, `read_streaming` cancels
//! the scope first, so the reader stops producing, then classifies it:
//!
//! - clean end, cancellation, deadline: drain every buffered record into one
//!   buffer, hand it to the handler once more (even if empty), then return
//!   `Ok` for a clean end or the cancellation error otherwise;
//! - anything else: return the error immediately, no drain.
//!
//! A handler error cancels the scope and is returned as is, without draining.
//!
//! # Examples
//!
//! ```
//! use ksqldb_http::response::Response;
//! use ksqldb_http::scope::Scope;
//! use bytes::Bytes;
//!
//! # tokio_test::block_on(async {
//! let chunks = vec![Ok::<_, std::io::Error>(Bytes::from_static(b"{\"row\":1}\n{\"row\":2}\n"))];
//! let response = Response::from_stream(futures::stream::iter(chunks), Scope::background());
//!
//! let mut rows = Vec::new();
//! response
//!     .read_streaming(|record| {
//!         if !record.is_empty() {
//!             rows.push(record);
//!         }
//!         Ok(())
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(rows.len(), 2);
//! # });
//! ```

mod parser;
mod reader;
mod stream;

pub use parser::{is_record, RecordParser};
pub use reader::{BodyStream, ResponseChannels, StreamEnd};
pub use stream::RecordStream;

use std::fmt;
use std::sync::OnceLock;

use bytes::{Bytes, BytesMut};
use futures::{Stream, TryStreamExt};
use http::{HeaderMap, StatusCode, Version};
use parking_lot::Mutex;

use crate::client::DEFAULT_MAX_RECORD_LEN;
use crate::error::{BoxError, KsqlError, Result};
use crate::scope::Scope;

/// Status line and headers of a delivered response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// HTTP status.
    pub status: StatusCode,
    /// HTTP version.
    pub version: Version,
    /// Response headers.
    pub headers: HeaderMap,
}

impl ResponseHead {
    pub(crate) fn of(response: &reqwest::Response) -> Self {
        ResponseHead {
            status: response.status(),
            version: response.version(),
            headers: response.headers().clone(),
        }
    }
}

/// A handle on one exchange's response body and cancellation.
///
/// Dropping the handle cancels its scope, which stops the reader task.
pub struct Response {
    head: Option<ResponseHead>,
    scope: Scope,
    body: Mutex<Option<BodyStream>>,
    channels: OnceLock<ResponseChannels>,
    max_record_len: usize,
}

impl Response {
    /// Wrap a delivered transport response.
    pub(crate) fn from_reqwest(
        response: reqwest::Response,
        scope: Scope,
        max_record_len: usize,
    ) -> Self {
        let head = ResponseHead::of(&response);
        let body: BodyStream = Box::pin(
            response
                .bytes_stream()
                .map_err(|e| -> BoxError { Box::new(e) }),
        );
        Response {
            head: Some(head),
            scope,
            body: Mutex::new(Some(body)),
            channels: OnceLock::new(),
            max_record_len,
        }
    }

    /// Build a handle over any stream of body chunks.
    ///
    /// Useful for custom transports and for replaying captured bodies.
    pub fn from_stream<S, E>(stream: S, scope: Scope) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let body: BodyStream = Box::pin(stream.map_err(|e| -> BoxError { e.into() }));
        Response {
            head: None,
            scope,
            body: Mutex::new(Some(body)),
            channels: OnceLock::new(),
            max_record_len: DEFAULT_MAX_RECORD_LEN,
        }
    }

    /// Set the framing limit. Has no effect once reading has started.
    pub fn with_max_record_len(mut self, max_record_len: usize) -> Self {
        self.max_record_len = max_record_len;
        self
    }

    /// Status line and headers, if the response came from a transport.
    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    /// HTTP status, if known.
    pub fn status(&self) -> Option<StatusCode> {
        self.head.as_ref().map(|head| head.status)
    }

    /// Response headers, if known.
    pub fn headers(&self) -> Option<&HeaderMap> {
        self.head.as_ref().map(|head| &head.headers)
    }

    /// This exchange's scope, a child of the client's root scope.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Cancel this exchange. Safe to call more than once; never affects the
    /// client or other exchanges.
    pub fn cancel(&self) {
        self.scope.cancel();
    }

    /// Start reading (once) and return the record and terminal pipes.
    ///
    /// Every call returns handles on the same pipes; only the first starts
    /// the reader task.
    ///
    /// # Panics
    ///
    /// If the first call happens outside a Tokio runtime.
    pub fn read(&self) -> ResponseChannels {
        self.channels
            .get_or_init(|| {
                let body = self
                    .body
                    .lock()
                    .take()
                    .unwrap_or_else(|| -> BodyStream {
                        Box::pin(futures::stream::empty::<std::result::Result<Bytes, BoxError>>())
                    });
                ResponseChannels::spawn(body, self.scope.clone(), self.max_record_len)
            })
            .clone()
    }

    /// Pass each record to `handler`, then the drained remainder once more.
    ///
    /// Returns `Ok` on a clean end of body. See the module docs for the full
    /// termination rules.
    pub async fn read_streaming<F>(&self, mut handler: F) -> Result<()>
    where
        F: FnMut(Bytes) -> Result<()>,
    {
        let channels = self.read();
        let mut records_open = true;

        loop {
            tokio::select! {
                biased;
                end = channels.next_end() => {
                    self.cancel();
                    let end = end.ok_or(KsqlError::StreamClosed)?;
                    if !end.is_recoverable() {
                        return end.into_result();
                    }
                    let rest = channels.drain().await;
                    handler(rest)?;
                    return end.into_result();
                }
                record = channels.next_record(), if records_open => match record {
                    Some(record) => {
                        if let Err(err) = handler(record) {
                            self.cancel();
                            return Err(err);
                        }
                    }
                    None => records_open = false,
                },
            }
        }
    }

    /// Append every record, and the drained remainder, to `buf`.
    ///
    /// On error `buf` keeps whatever was read before the failure.
    pub async fn read_into(&self, buf: &mut BytesMut) -> Result<()> {
        self.read_streaming(|record| {
            buf.extend_from_slice(&record);
            Ok(())
        })
        .await
    }

    /// Block until the body ends and return it as one buffer, together with
    /// the terminal result.
    ///
    /// The buffer holds everything read before the end, so a push query
    /// stopped by cancellation or a deadline still hands back its rows.
    pub async fn read_all(&self) -> (Bytes, Result<()>) {
        let mut buf = BytesMut::new();
        let result = self.read_into(&mut buf).await;
        (buf.freeze(), result)
    }

    /// Consume the handle as a stream of records.
    pub fn into_stream(self) -> RecordStream {
        RecordStream::new(self)
    }
}

impl Drop for Response {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("head", &self.head)
            .field("scope", &self.scope)
            .field("started", &self.channels.get().is_some())
            .finish()
    }
}

//! The background reader task and the pipes it publishes to.
//!
//! One task per response scans the body into records and publishes them on
//! a data pipe; exactly one terminal condition goes on a second pipe. The data
//! pipe is a rendezvous: after publishing a record the task waits until a
//! consumer has taken it before scanning further. That gives backpressure and
//! a strict order: every record published before the terminal condition has
//! been received by the time the terminal condition is sent, and anything
//! left on the data pipe afterwards is the unterminated tail (or a record
//! interrupted by cancellation), which consumers drain.
//!
//! Cancellation is checked at every loop iteration and raced against body
//! reads and rendezvous waits, so a canceled scope always ends the task.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::error::{BoxError, KsqlError, Result};
use crate::response::parser::{is_record, RecordParser};
use crate::scope::{Scope, ScopeError};

/// A response body as a stream of byte chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, BoxError>> + Send>>;

/// How a response stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The body ended cleanly.
    Eof,
    /// The response scope was canceled.
    Canceled,
    /// The response scope's deadline elapsed.
    DeadlineExceeded,
    /// The body reader failed.
    Failed(String),
    /// A record outgrew the framing limit.
    RecordTooLong(usize),
}

impl StreamEnd {
    /// Whether a final drain must follow this condition.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StreamEnd::Eof | StreamEnd::Canceled | StreamEnd::DeadlineExceeded
        )
    }

    /// `Ok` for a clean end, the matching error otherwise.
    pub fn into_result(self) -> Result<()> {
        match self {
            StreamEnd::Eof => Ok(()),
            StreamEnd::Canceled => Err(KsqlError::Canceled),
            StreamEnd::DeadlineExceeded => Err(KsqlError::DeadlineExceeded),
            StreamEnd::Failed(msg) => Err(KsqlError::Body(msg)),
            StreamEnd::RecordTooLong(limit) => Err(KsqlError::RecordTooLong { limit }),
        }
    }
}

impl From<ScopeError> for StreamEnd {
    fn from(err: ScopeError) -> Self {
        match err {
            ScopeError::Canceled => StreamEnd::Canceled,
            ScopeError::DeadlineExceeded => StreamEnd::DeadlineExceeded,
        }
    }
}

impl fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEnd::Eof => f.write_str("EOF"),
            StreamEnd::Canceled => f.write_str("context canceled"),
            StreamEnd::DeadlineExceeded => f.write_str("context deadline exceeded"),
            StreamEnd::Failed(msg) => f.write_str(msg),
            StreamEnd::RecordTooLong(limit) => write!(f, "record exceeds {limit} bytes"),
        }
    }
}

/// The receiving ends of a response's data and terminal pipes.
///
/// Clones share the same pipes: each record and the terminal condition are
/// received by exactly one caller.
#[derive(Clone)]
pub struct ResponseChannels {
    records: Arc<Mutex<mpsc::Receiver<Bytes>>>,
    end: Arc<Mutex<mpsc::Receiver<StreamEnd>>>,
}

impl ResponseChannels {
    /// Start the reader task over `body` and return its pipes.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn(body: BodyStream, scope: Scope, max_record_len: usize) -> Self {
        let (record_tx, record_rx) = mpsc::channel(1);
        let (end_tx, end_rx) = mpsc::channel(1);

        tokio::spawn(run(body, scope, RecordParser::new(max_record_len), record_tx, end_tx));

        ResponseChannels {
            records: Arc::new(Mutex::new(record_rx)),
            end: Arc::new(Mutex::new(end_rx)),
        }
    }

    /// Receive the next record. `None` once the data pipe is closed.
    pub async fn next_record(&self) -> Option<Bytes> {
        self.records.lock().await.recv().await
    }

    /// Receive the terminal condition. `None` if it was already taken.
    pub async fn next_end(&self) -> Option<StreamEnd> {
        self.end.lock().await.recv().await
    }

    #[cfg(test)]
    pub(crate) fn same_pipes(&self, other: &ResponseChannels) -> bool {
        Arc::ptr_eq(&self.records, &other.records) && Arc::ptr_eq(&self.end, &other.end)
    }

    /// Receive every remaining record until the data pipe closes,
    /// concatenated in arrival order.
    pub(crate) async fn drain(&self) -> Bytes {
        let mut records = self.records.lock().await;
        let mut rest = BytesMut::new();
        while let Some(record) = records.recv().await {
            rest.extend_from_slice(&record);
        }
        rest.freeze()
    }
}

impl fmt::Debug for ResponseChannels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseChannels").finish_non_exhaustive()
    }
}

enum Scan {
    Record(Bytes),
    Interrupted(ScopeError),
    Exhausted(StreamEnd),
}

async fn run(
    mut body: BodyStream,
    scope: Scope,
    mut parser: RecordParser,
    records: mpsc::Sender<Bytes>,
    end_tx: mpsc::Sender<StreamEnd>,
) {
    debug!("response reader started");

    let end = loop {
        if let Some(cause) = scope.err() {
            break StreamEnd::from(cause);
        }
        match scan(&mut body, &mut parser, &scope).await {
            Scan::Record(record) => {
                if is_record(&record) && !publish(&records, record, &scope).await {
                    debug!("response consumer gone, reader stopping");
                    return;
                }
            }
            Scan::Interrupted(cause) => break StreamEnd::from(cause),
            Scan::Exhausted(end) => break end,
        }
    };

    let flush = end == StreamEnd::Eof;
    let _ = end_tx.send(end.clone()).await;
    if flush {
        let rest = parser.finish();
        if is_record(&rest) {
            let _ = records.send(rest).await;
        }
    }

    debug!(%end, "response reader stopped");
}

async fn scan(body: &mut BodyStream, parser: &mut RecordParser, scope: &Scope) -> Scan {
    loop {
        match parser.next_record() {
            Ok(Some(record)) => return Scan::Record(record),
            Ok(None) => {}
            Err(_) => return Scan::Exhausted(StreamEnd::RecordTooLong(parser.max_record_len())),
        }

        let chunk = tokio::select! {
            biased;
            cause = scope.done() => return Scan::Interrupted(cause),
            chunk = body.next() => chunk,
        };
        match chunk {
            Some(Ok(bytes)) => parser.push(&bytes),
            Some(Err(e)) => return Scan::Exhausted(StreamEnd::Failed(e.to_string())),
            None => return Scan::Exhausted(StreamEnd::Eof),
        }
    }
}

/// Publish one record and wait until a consumer takes it.
///
/// Returns false once every receiver is gone.
async fn publish(records: &mpsc::Sender<Bytes>, record: Bytes, scope: &Scope) -> bool {
    if records.send(record).await.is_err() {
        return false;
    }
    tokio::select! {
        biased;
        _ = scope.done() => true,
        permit = records.reserve() => permit.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(chunks: &[&'static str]) -> BodyStream {
        let chunks: Vec<std::result::Result<Bytes, BoxError>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        Box::pin(futures::stream::iter(chunks))
    }

    #[tokio::test]
    async fn test_records_then_eof() {
        let channels = ResponseChannels::spawn(body(&["a\nb", "\nc\n"]), Scope::background(), 64);

        assert_eq!(channels.next_record().await.unwrap(), "a");
        assert_eq!(channels.next_record().await.unwrap(), "b");
        assert_eq!(channels.next_record().await.unwrap(), "c");
        assert_eq!(channels.next_end().await, Some(StreamEnd::Eof));
        assert_eq!(channels.drain().await, Bytes::new());
        assert_eq!(channels.next_end().await, None);
    }

    #[tokio::test]
    async fn test_tail_published_after_end() {
        let channels = ResponseChannels::spawn(body(&["a\n\n", "b"]), Scope::background(), 64);

        assert_eq!(channels.next_record().await.unwrap(), "a");
        assert_eq!(channels.next_end().await, Some(StreamEnd::Eof));
        assert_eq!(channels.drain().await, "b");
    }

    #[tokio::test]
    async fn test_canceled_before_start() {
        let scope = Scope::background();
        scope.cancel();
        let channels = ResponseChannels::spawn(body(&["a\n"]), scope, 64);

        assert_eq!(channels.next_end().await, Some(StreamEnd::Canceled));
        assert_eq!(channels.drain().await, Bytes::new());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_body() {
        let scope = Scope::background();
        let pending = futures::stream::iter(vec![Ok::<_, BoxError>(Bytes::from_static(b"a\n"))])
            .chain(futures::stream::pending());
        let channels = ResponseChannels::spawn(Box::pin(pending), scope.clone(), 64);

        assert_eq!(channels.next_record().await.unwrap(), "a");
        scope.cancel();
        assert_eq!(channels.next_end().await, Some(StreamEnd::Canceled));
    }

    #[tokio::test]
    async fn test_body_error_is_failed() {
        let chunks: Vec<std::result::Result<Bytes, BoxError>> =
            vec![Ok(Bytes::from_static(b"a\n")), Err("connection reset".into())];
        let body: BodyStream = Box::pin(futures::stream::iter(chunks));
        let channels = ResponseChannels::spawn(body, Scope::background(), 64);

        assert_eq!(channels.next_record().await.unwrap(), "a");
        let end = channels.next_end().await.unwrap();
        assert_eq!(end, StreamEnd::Failed("connection reset".to_string()));
        assert!(!end.is_recoverable());
    }

    #[tokio::test]
    async fn test_record_too_long() {
        let channels = ResponseChannels::spawn(body(&["abcdefgh"]), Scope::background(), 4);
        assert_eq!(channels.next_end().await, Some(StreamEnd::RecordTooLong(4)));
    }

    #[test]
    fn test_classification() {
        assert!(StreamEnd::Eof.is_recoverable());
        assert!(StreamEnd::Canceled.is_recoverable());
        assert!(StreamEnd::DeadlineExceeded.is_recoverable());
        assert!(!StreamEnd::RecordTooLong(1).is_recoverable());
        assert!(StreamEnd::Eof.into_result().is_ok());
        assert!(matches!(
            StreamEnd::DeadlineExceeded.into_result(),
            Err(KsqlError::DeadlineExceeded)
        ));
    }
}

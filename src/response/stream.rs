//! A [`Stream`] view of a response.
//!
//! [`RecordStream`] yields the same records `read_streaming` would hand to
//! its handler, under the same termination rules: after the terminal
//! condition it yields the drained remainder (skipped when empty), then the
//! terminal error if the end was not clean, then `None`.
//!
//! # Examples
//!
//! ```ignore
//! use futures::StreamExt;
//! use ksqldb_http::{KsqlClient, ClientOptions, Resource};
//!
//! let client = KsqlClient::new(ClientOptions::new("http://localhost:8088"))?;
//! let response = client
//!     .execute(&Resource::query("SELECT * FROM transactions EMIT CHANGES;"))
//!     .await?;
//!
//! let mut rows = response.into_stream();
//! while let Some(row) = rows.next().await {
//!     println!("{:?}", row?);
//! }
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

use crate::error::{KsqlError, Result};
use crate::response::{Response, ResponseChannels};

enum State {
    Streaming(Response, ResponseChannels),
    Finishing(Option<KsqlError>),
    Done,
}

/// Records of one response as a stream.
///
/// Dropping the stream cancels the exchange.
pub struct RecordStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>,
}

impl RecordStream {
    pub(crate) fn new(response: Response) -> Self {
        let channels = response.read();
        let inner = futures::stream::unfold(State::Streaming(response, channels), step);
        RecordStream {
            inner: Box::pin(inner),
        }
    }
}

async fn step(state: State) -> Option<(Result<Bytes>, State)> {
    match state {
        State::Streaming(response, channels) => {
            let mut records_open = true;
            loop {
                tokio::select! {
                    biased;
                    end = channels.next_end() => {
                        response.cancel();
                        let Some(end) = end else {
                            return Some((Err(KsqlError::StreamClosed), State::Done));
                        };
                        if !end.is_recoverable() {
                            let err = end.into_result().err()?;
                            return Some((Err(err), State::Done));
                        }
                        let rest = channels.drain().await;
                        let err = end.into_result().err();
                        if !rest.is_empty() {
                            return Some((Ok(rest), State::Finishing(err)));
                        }
                        return err.map(|err| (Err(err), State::Done));
                    }
                    record = channels.next_record(), if records_open => match record {
                        Some(record) => {
                            return Some((Ok(record), State::Streaming(response, channels)));
                        }
                        None => records_open = false,
                    },
                }
            }
        }
        State::Finishing(err) => err.map(|err| (Err(err), State::Done)),
        State::Done => None,
    }
}

impl Stream for RecordStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_canceled_stream_ends_with_error() {
        let scope = Scope::background();
        let body = futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"a\n"))])
            .chain(futures::stream::pending());
        let response = Response::from_stream(body, scope.clone());
        let mut stream = response.into_stream();

        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        scope.cancel();
        assert!(matches!(stream.next().await, Some(Err(KsqlError::Canceled))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_body_error_surfaces() {
        let chunks = vec![
            Ok(Bytes::from_static(b"a\n")),
            Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated")),
        ];
        let mut stream =
            Response::from_stream(futures::stream::iter(chunks), Scope::background()).into_stream();

        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        assert!(matches!(stream.next().await, Some(Err(KsqlError::Body(_)))));
        assert!(stream.next().await.is_none());
    }
}

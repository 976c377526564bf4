//! Cancellation scopes.
//!
//! A [`Scope`] is a node in a tree of cancellation signals. The client owns a
//! root scope and every exchange derives a child from it, so canceling one
//! response never reaches the client or any sibling exchange, while canceling
//! the root ends everything derived from it.
//!
//! Each node carries a `tokio::sync::watch` channel holding its cause, plus an
//! optional deadline. A scope is done when its own cause is set, any ancestor
//! is done, or the nearest deadline in its ancestry has elapsed.
//!
//! # Examples
//!
//! ```
//! use ksqldb_http::scope::{Scope, ScopeError};
//!
//! let root = Scope::background();
//! let child = root.child();
//!
//! child.cancel();
//! assert_eq!(child.err(), Some(ScopeError::Canceled));
//! assert_eq!(root.err(), None);
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Why a scope ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeError {
    /// The scope or one of its ancestors was canceled.
    Canceled,
    /// The scope's deadline elapsed.
    DeadlineExceeded,
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeError::Canceled => f.write_str("context canceled"),
            ScopeError::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

impl std::error::Error for ScopeError {}

struct Node {
    cause: watch::Sender<Option<ScopeError>>,
    deadline: Option<Instant>,
    parent: Option<Arc<Node>>,
}

impl Node {
    fn new(deadline: Option<Instant>, parent: Option<Arc<Node>>) -> Arc<Self> {
        let (cause, _) = watch::channel(None);
        Arc::new(Node {
            cause,
            deadline,
            parent,
        })
    }

    /// Record a cause unless one is already set. Returns true if this call set it.
    fn settle(&self, err: ScopeError) -> bool {
        self.cause.send_if_modified(|cause| {
            if cause.is_none() {
                *cause = Some(err);
                true
            } else {
                false
            }
        })
    }
}

/// A cloneable handle to a cancellation scope.
///
/// Clones refer to the same scope: canceling any clone cancels them all.
#[derive(Clone)]
pub struct Scope {
    node: Arc<Node>,
}

impl Scope {
    /// A root scope that is never canceled on its own and has no deadline.
    pub fn background() -> Self {
        Scope {
            node: Node::new(None, None),
        }
    }

    /// Derive a scope that ends when this one ends, or when canceled itself.
    pub fn child(&self) -> Self {
        Scope {
            node: Node::new(None, Some(Arc::clone(&self.node))),
        }
    }

    /// Derive a child scope that also ends at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Scope {
            node: Node::new(Some(deadline), Some(Arc::clone(&self.node))),
        }
    }

    /// Derive a child scope that also ends after `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancel this scope and everything derived from it.
    ///
    /// Canceling twice, or canceling a scope that already ended, has no
    /// further effect.
    pub fn cancel(&self) {
        self.node.settle(ScopeError::Canceled);
    }

    /// Why the scope ended, or `None` while it is still live.
    pub fn err(&self) -> Option<ScopeError> {
        let now = Instant::now();
        let mut node = Some(&self.node);
        while let Some(current) = node {
            if let Some(cause) = *current.cause.borrow() {
                return Some(cause);
            }
            if current.deadline.is_some_and(|deadline| now >= deadline) {
                current.settle(ScopeError::DeadlineExceeded);
                return *current.cause.borrow();
            }
            node = current.parent.as_ref();
        }
        None
    }

    /// Whether the scope has ended.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// The nearest deadline in this scope's ancestry, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.ancestry().filter_map(|node| node.deadline).min()
    }

    /// Wait until the scope ends and return the cause.
    pub async fn done(&self) -> ScopeError {
        loop {
            if let Some(cause) = self.err() {
                return cause;
            }

            let mut waits: Vec<Pin<Box<dyn Future<Output = ()> + Send>>> = self
                .ancestry()
                .map(|node| {
                    let mut rx = node.cause.subscribe();
                    let wait: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
                        let closed = rx.wait_for(Option::is_some).await.is_err();
                        if closed {
                            futures::future::pending::<()>().await;
                        }
                    });
                    wait
                })
                .collect();
            if let Some(deadline) = self.deadline() {
                waits.push(Box::pin(tokio::time::sleep_until(deadline)));
            }

            futures::future::select_all(waits).await;
        }
    }

    fn ancestry(&self) -> impl Iterator<Item = &Arc<Node>> {
        std::iter::successors(Some(&self.node), |node| node.parent.as_ref())
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::background()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("err", &self.err())
            .field("deadline", &self.deadline())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_never_done() {
        let root = Scope::background();
        assert!(!root.is_done());
        assert_eq!(root.deadline(), None);
    }

    #[test]
    fn test_cancel_is_scoped_to_descendants() {
        let root = Scope::background();
        let a = root.child();
        let b = root.child();
        let grandchild = a.child();

        a.cancel();
        a.cancel();

        assert_eq!(a.err(), Some(ScopeError::Canceled));
        assert_eq!(grandchild.err(), Some(ScopeError::Canceled));
        assert_eq!(b.err(), None);
        assert_eq!(root.err(), None);
    }

    #[test]
    fn test_root_cancel_reaches_children() {
        let root = Scope::background();
        let child = root.child();
        root.cancel();
        assert_eq!(child.err(), Some(ScopeError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let root = Scope::background();
        let timed = root.with_timeout(Duration::from_secs(5));
        let child = timed.child();

        assert_eq!(child.err(), None);
        assert_eq!(child.done().await, ScopeError::DeadlineExceeded);
        assert_eq!(timed.err(), Some(ScopeError::DeadlineExceeded));
        assert_eq!(root.err(), None);

        // The first cause sticks.
        timed.cancel();
        assert_eq!(timed.err(), Some(ScopeError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_done_wakes_on_ancestor_cancel() {
        let root = Scope::background();
        let child = root.child().child();

        let waiter = {
            let child = child.clone();
            tokio::spawn(async move { child.done().await })
        };
        tokio::task::yield_now().await;
        root.cancel();

        assert_eq!(waiter.await.unwrap(), ScopeError::Canceled);
    }
}

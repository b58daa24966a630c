//! Cooperative cancellation.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{self, Shared};

/// A cloneable cancellation signal.
///
/// All clones observe the same state. Cancelling is sticky: once
/// [`cancel`](Self::cancel) is called every current and future
/// [`cancelled`](Self::cancelled) future resolves.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: AtomicBool,
    trigger: Mutex<Option<oneshot::Sender<()>>>,
    signal: Shared<oneshot::Receiver<()>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (trigger, signal) = oneshot::channel();
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(trigger)),
                signal: signal.shared(),
            }),
        }
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        let trigger = self
            .inner
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(trigger) = trigger {
            // The receiver lives as long as `inner`, so this cannot fail.
            let _ = trigger.send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// A future that resolves once the token is cancelled.
    ///
    /// The future does not borrow the token and can be moved into spawned tasks.
    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        let signal = self.inner.signal.clone();
        async move {
            // An error means every token handle was dropped without cancelling.
            if signal.await.is_err() {
                future::pending::<()>().await;
            }
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
        block_on(clone.cancelled());
    }

    #[test]
    fn test_cancelled_future_pending_until_cancel() {
        let token = CancellationToken::new();
        let mut waiting = Box::pin(token.cancelled());
        assert!((&mut waiting).now_or_never().is_none());

        token.cancel();
        assert!(waiting.now_or_never().is_some());
    }

    #[test]
    fn test_cancel_twice_is_harmless() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }
}

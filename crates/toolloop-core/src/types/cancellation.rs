//! Cancellation token for sessions and tool invocations

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Token for cancelling async operations
///
/// Cancelling a token cancels every child created from it. Cancelling a
/// child leaves the parent untouched.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationTokenInner>,
}

struct CancellationTokenInner {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<CancellationTokenInner>>>,
}

impl CancellationTokenInner {
    fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
            children: Mutex::new(Vec::new()),
        }
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Create a new cancellation token
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationTokenInner::new()),
        }
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Wait until cancellation is requested
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent cancel is not missed
        notified.as_mut().enable();

        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// Create a child token that is cancelled when this token is cancelled
    pub fn child_token(&self) -> CancellationToken {
        let child = CancellationToken::new();
        {
            let mut children = self.inner.children.lock();
            if !self.is_cancelled() {
                children.retain(|c| c.strong_count() > 0);
                children.push(Arc::downgrade(&child.inner));
                return child;
            }
        }
        child.cancel();
        child
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("is_cancelled", &self.is_cancelled())
            .finish()
    }
}

// SPDX-License-Identifier: MIT
//! Cooperative cancellation token.
//!
//! One token governs one in-flight generation. Cancelling is idempotent:
//! cancelling an already-finished or already-cancelled generation is a no-op.
//! The flag is checked by backend adapters between chunks and by the stream
//! flush loop; the engine races [`CancelToken::cancelled`] against the
//! backend call so a cancel also drops the underlying connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Request cancellation. Safe to call any number of times.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    ///
    /// Returns immediately if cancellation already happened.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            let notified = self.inner.notify.notified();
            // re-check between registering and awaiting: notify_waiters does
            // not store a permit for late arrivals
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

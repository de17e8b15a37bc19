//! Cooperative cancellation primitive (spec.md §5, §9).
//!
//! Not grounded in a teacher file directly — this codebase's nodes run to
//! completion without an in-band cancellation signal — but built in the
//! idiom the rest of the engine already uses for shared, thread-safe
//! state: an `Arc`-backed handle, cheap to clone, checked at the suspension
//! points spec.md §5 names (`next` invocations, `Retry`'s sleep,
//! `Timeout`'s race). Uses `tokio::sync::Notify`, already pulled in by the
//! `tokio` "full" feature this codebase depends on — no extra crate.
//!
//! A pipeline integrator calls `CancellationToken::cancel` from wherever it
//! observes its own surrounding task being cancelled (e.g. inside a
//! `tokio::select!` around `PipelineExecutor::execute`). This engine cannot
//! observe an ordinary dropped future on its own; cooperative cancellation
//! here means *this* explicit signal, checked at each suspension point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cheap-to-clone cancellation signal. Cloning shares the same
/// underlying flag; cancelling any clone cancels all of them.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// An independent token, unaffected by cancelling `self` or vice
    /// versa. Used when forking a `Context` so that cancelling a fork
    /// (e.g. a `Parallel` sibling on fail-fast) does not cancel the
    /// parent execution.
    pub fn child(&self) -> Self {
        Self::new()
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called. Resolves immediately if it
    /// already has been.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

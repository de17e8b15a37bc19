//! The optional Context Pool (spec.md §4.6).
//!
//! No direct teacher analog existed for recycling per-execution state —
//! `core/node.rs`'s `ExecutionContext` is disposable, created fresh per
//! run rather than borrowed from a pool. Built fresh per spec.md §4.6, in
//! this codebase's idiom: `parking_lot` for the free list, atomics for the
//! generation/stats counters.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::Context;

/// Counters exposed for external telemetry (spec.md §6's "pool monitor").
#[derive(Debug, Default)]
pub struct ContextPoolStats {
    pub borrow_count: AtomicUsize,
    pub return_count: AtomicUsize,
    pub hits: AtomicUsize,
    pub misses: AtomicUsize,
    pub peak_in_use: AtomicUsize,
}

impl ContextPoolStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        if hits + misses == 0.0 {
            0.0
        } else {
            hits / (hits + misses)
        }
    }

    pub fn snapshot(&self) -> ContextPoolStatsSnapshot {
        ContextPoolStatsSnapshot {
            borrow_count: self.borrow_count.load(Ordering::Relaxed),
            return_count: self.return_count.load(Ordering::Relaxed),
            hit_rate: self.hit_rate(),
            peak_in_use: self.peak_in_use.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextPoolStatsSnapshot {
    pub borrow_count: usize,
    pub return_count: usize,
    pub hit_rate: f64,
    pub peak_in_use: usize,
}

struct Inner {
    free: Mutex<Vec<Arc<Context>>>,
    max_size: usize,
    in_use: AtomicUsize,
    stats: ContextPoolStats,
}

/// Recycles `Context` instances to cut allocation churn on high-throughput
/// paths. Entirely optional: the executor behaves identically with or
/// without one.
#[derive(Clone)]
pub struct ContextPool {
    inner: Arc<Inner>,
}

impl ContextPool {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                free: Mutex::new(Vec::new()),
                max_size,
                in_use: AtomicUsize::new(0),
                stats: ContextPoolStats::default(),
            }),
        }
    }

    /// Returns a `Context` that must appear empty to the caller — either
    /// reused from the free list (already cleared on its prior return) or
    /// freshly allocated.
    pub fn borrow(&self) -> PooledContext {
        self.inner.stats.borrow_count.fetch_add(1, Ordering::Relaxed);
        let context = {
            let mut free = self.inner.free.lock();
            free.pop()
        };
        let context = match context {
            Some(context) => {
                self.inner.stats.hits.fetch_add(1, Ordering::Relaxed);
                context
            }
            None => {
                self.inner.stats.misses.fetch_add(1, Ordering::Relaxed);
                Arc::new(Context::new())
            }
        };
        let in_use = self.inner.in_use.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner
            .stats
            .peak_in_use
            .fetch_max(in_use, Ordering::Relaxed);
        PooledContext {
            context,
            valid: Arc::new(AtomicBool::new(true)),
            pool: self.clone(),
            consumed: false,
        }
    }

    /// Clears every entry in `token`'s context (typed values, metadata,
    /// metrics, request id, event emitter) and returns it to the free
    /// list if below `max_size`; otherwise it is dropped.
    pub fn return_context(&self, mut token: PooledContext) {
        token.reclaim();
    }

    pub fn stats(&self) -> ContextPoolStatsSnapshot {
        self.inner.stats.snapshot()
    }

    fn reclaim_raw(&self, context: Arc<Context>) {
        context.clear();
        self.inner.in_use.fetch_sub(1, Ordering::Relaxed);
        self.inner.stats.return_count.fetch_add(1, Ordering::Relaxed);
        let mut free = self.inner.free.lock();
        if free.len() < self.inner.max_size {
            free.push(context);
        }
    }
}

/// A borrowed `Context` handle. Derefs to `Context` for the lifetime of
/// the borrow; call `ContextPool::return_context` (or just drop it) when
/// done.
pub struct PooledContext {
    context: Arc<Context>,
    valid: Arc<AtomicBool>,
    pool: ContextPool,
    consumed: bool,
}

impl PooledContext {
    /// The underlying `Arc<Context>`, for callers (such as
    /// `PipelineExecutor`) that need to thread it through APIs expecting
    /// `Arc<Context>` directly rather than a `Deref` borrow.
    pub fn context_arc(&self) -> Arc<Context> {
        self.context.clone()
    }

    /// A cloneable handle that becomes unusable once this borrow is
    /// returned to the pool, even if cloned beforehand — the generation
    /// flag is shared, not the context's own state.
    pub fn checked_handle(&self) -> CheckedContextHandle {
        CheckedContextHandle {
            context: self.context.clone(),
            valid: self.valid.clone(),
        }
    }

    fn reclaim(&mut self) {
        if self.consumed {
            return;
        }
        self.consumed = true;
        self.valid.store(false, Ordering::Release);
        self.pool.reclaim_raw(self.context.clone());
    }
}

impl std::ops::Deref for PooledContext {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.context
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        self.reclaim();
    }
}

/// A handle to a pooled context that knows whether its borrow has since
/// been returned, per spec.md §4.6's "must not be observable after
/// return" requirement.
#[derive(Clone)]
pub struct CheckedContextHandle {
    context: Arc<Context>,
    valid: Arc<AtomicBool>,
}

impl CheckedContextHandle {
    pub fn get(&self) -> Option<&Context> {
        if self.valid.load(Ordering::Acquire) {
            Some(&self.context)
        } else {
            None
        }
    }
}

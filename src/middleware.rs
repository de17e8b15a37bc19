//! The `Middleware` interface and its one-shot `next` continuation
//! (spec.md §3, §4.2, §6).
//!
//! Grounded on `core/node.rs`'s `#[async_trait] Node`/`RetryableNode` split
//! and `composition/behaviors/*`'s object-safe behavior traits, generalized
//! from a three-phase node lifecycle into a single
//! `execute(command, context, next)` interceptor call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::{PipelineError, Result};
use crate::next_guard::NextGuard;
use crate::Command;

/// A boxed, type-erased future, since the chain is built as a linked list
/// of closures rather than a single concrete generic type.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The composed continuation a `ChainBuilder` folds into existence: given
/// a command and context, run everything downstream of this point.
pub type ChainFn<C> =
    Arc<dyn Fn(Arc<C>, Arc<Context>) -> BoxFuture<'static, Result<<C as Command>::Result>> + Send + Sync>;

/// Conventional priority bands (spec.md §6), smaller runs earlier.
pub mod priority {
    pub const AUTHENTICATION: i64 = 100;
    pub const VALIDATION: i64 = 200;
    pub const PRE_PROCESSING: i64 = 300;
    pub const PROCESSING: i64 = 400;
    pub const POST_PROCESSING: i64 = 500;
    pub const ERROR_HANDLING: i64 = 600;
    pub const CUSTOM: i64 = 1000;
}

/// An interceptor in the chain: observes, modifies, short-circuits, or
/// delegates command execution by calling `next` at most once.
#[async_trait]
pub trait Middleware<C: Command>: Send + Sync {
    /// Execution priority; smaller runs earlier. Defaults to the `custom`
    /// band so ad hoc middleware doesn't silently jump the queue.
    fn priority(&self) -> i64 {
        priority::CUSTOM
    }

    async fn execute(&self, command: Arc<C>, context: Arc<Context>, next: Next<C>) -> Result<C::Result>;
}

/// One-shot handle to the downstream continuation, handed to a middleware
/// for exactly one chain boundary per execution.
///
/// Cloning `Next` does not grant extra invocations — the underlying
/// `NextGuard` is shared, so only the first call (whichever clone wins the
/// race) proceeds; every other caller observes `NextAlreadyCalled`.
pub struct Next<C: Command> {
    guard: Arc<NextGuard>,
    downstream: ChainFn<C>,
}

impl<C: Command> Next<C> {
    pub(crate) fn new(downstream: ChainFn<C>) -> Self {
        Self::with_guard(Arc::new(NextGuard::new()), downstream)
    }

    pub(crate) fn with_guard(guard: Arc<NextGuard>, downstream: ChainFn<C>) -> Self {
        Self { guard, downstream }
    }

    /// A fresh one-shot handle over the same downstream continuation,
    /// with its own guard. Combinators that invoke a wrapped middleware
    /// more than once per execution (`Retry`) need this: each attempt is
    /// logically a brand new middleware invocation, so it gets its own
    /// "call next at most once" accounting rather than sharing the guard
    /// across attempts.
    pub(crate) fn fresh(&self) -> Self {
        Self::new(self.downstream.clone())
    }

    /// Marks this continuation "allowed to short-circuit" — legal to never
    /// call, with the debug-only "next never called" warning suppressed.
    /// Used by combinators whose contract permits a short-circuit, e.g. a
    /// cache-hit style middleware.
    pub fn allow_short_circuit(self) -> Self {
        self.guard.allow_short_circuit();
        self
    }

    /// Invoke the downstream continuation. Returns `NextAlreadyCalled` if
    /// this (or a clone of it) already entered once, or `Cancelled` if the
    /// surrounding execution was cancelled (spec.md §5) either before this
    /// call or while the downstream continuation was still running.
    pub async fn call(&self, command: Arc<C>, context: Arc<Context>) -> Result<C::Result> {
        if context.is_cancelled() {
            // Mark the guard before returning so its `Drop` impl doesn't
            // mistake this legitimately cancelled execution for a
            // middleware that forgot to call `next` (spec.md §4.2).
            self.guard.mark_cancelled();
            return Err(PipelineError::cancelled());
        }
        self.guard.enter()?;
        let result = tokio::select! {
            biased;
            result = (self.downstream)(command, context.clone()) => result,
            _ = context.cancelled() => {
                self.guard.mark_cancelled();
                Err(PipelineError::cancelled())
            }
        };
        self.guard.complete();
        result
    }
}

impl<C: Command> Clone for Next<C> {
    fn clone(&self) -> Self {
        Self {
            guard: self.guard.clone(),
            downstream: self.downstream.clone(),
        }
    }
}

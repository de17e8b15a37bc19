//! Chain Builder (spec.md §4.3): turns a handler plus an unordered set of
//! (middleware, priority, insertion-index) triples into an immutable,
//! ordered execution chain.
//!
//! Grounded on `src/flow.rs`'s `FlowBuilder`/`BasicFlow` (fluent builder,
//! ordered execution, depth/cycle guards) and `composition/builder.rs`'s
//! `NodeBuilder` (build-time defaulting, `build_strict` erroring on a
//! missing piece) — generalized from flow's action-graph routing into the
//! spec's fold-right-to-left closure chain with `(priority, insertion
//! index)` ordering and a `MaxDepthExceeded` guard in place of flow's
//! cycle/step limits.

use std::sync::Arc;

use crate::command::Handler;
use crate::config::DEFAULT_MAX_CHAIN_DEPTH;
use crate::context::Context;
use crate::error::{PipelineError, Result};
use crate::middleware::{ChainFn, Middleware, Next};
use crate::Command;

struct Entry<C: Command> {
    middleware: Arc<dyn Middleware<C>>,
    priority: i64,
    insertion_index: usize,
}

/// Accumulates middleware before folding them, in priority order, around a
/// handler. Building is transactional: on failure (depth exceeded) no
/// partial chain is ever exposed (spec.md §6).
pub struct ChainBuilder<C: Command> {
    handler: Arc<dyn Handler<C>>,
    entries: Vec<Entry<C>>,
    max_depth: usize,
}

impl<C: Command> ChainBuilder<C> {
    pub fn new(handler: Arc<dyn Handler<C>>) -> Self {
        Self {
            handler,
            entries: Vec::new(),
            max_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Adds `middleware` using its own declared priority.
    pub fn add(self, middleware: Arc<dyn Middleware<C>>) -> Self {
        let priority = middleware.priority();
        self.add_with_priority(middleware, priority)
    }

    /// Adds `middleware` at an explicit priority, overriding its default.
    pub fn add_with_priority(mut self, middleware: Arc<dyn Middleware<C>>, priority: i64) -> Self {
        let insertion_index = self.entries.len();
        self.entries.push(Entry {
            middleware,
            priority,
            insertion_index,
        });
        self
    }

    /// Removes every middleware for which `predicate` returns true.
    /// Insertion indices of the remaining entries are left untouched, so
    /// their relative tie-break order among themselves is unaffected.
    pub fn remove_where(mut self, predicate: impl Fn(&dyn Middleware<C>) -> bool) -> Self {
        self.entries.retain(|entry| !predicate(entry.middleware.as_ref()));
        self
    }

    /// Stable-sorts by `(priority asc, insertion-index asc)` and folds
    /// right-to-left into a single composed continuation.
    pub fn build(self) -> Result<Chain<C>> {
        if self.entries.len() > self.max_depth {
            return Err(PipelineError::MaxDepthExceeded {
                depth: self.entries.len(),
            });
        }

        let mut entries = self.entries;
        entries.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.insertion_index.cmp(&b.insertion_index))
        });
        let depth = entries.len();

        // `final = λ(cmd, ctx). handler(cmd)` — the innermost continuation.
        let handler = self.handler;
        let mut next_fn: ChainFn<C> = Arc::new(move |command, _context| {
            let handler = handler.clone();
            Box::pin(async move { handler.handle(command).await })
        });

        // Fold right-to-left: next_i = λ(cmd, ctx). m.execute(cmd, ctx, next_{i+1}).
        for entry in entries.into_iter().rev() {
            let downstream = next_fn.clone();
            let middleware = entry.middleware;
            next_fn = Arc::new(move |command, context| {
                let middleware = middleware.clone();
                let downstream = downstream.clone();
                Box::pin(async move {
                    let next = Next::new(downstream);
                    middleware.execute(command, context, next).await
                })
            });
        }

        Ok(Chain {
            entry: next_fn,
            depth,
        })
    }
}

/// An ordered, immutable sequence of middleware terminating in a handler.
/// Built once, freely shared across executions and threads afterward.
pub struct Chain<C: Command> {
    entry: ChainFn<C>,
    depth: usize,
}

impl<C: Command> Chain<C> {
    /// Drives the chain to completion for a single execution. The caller
    /// is expected to invoke this exactly once per execution — see
    /// `PipelineExecutor`.
    pub async fn run(&self, command: Arc<C>, context: Arc<Context>) -> Result<C::Result> {
        (self.entry)(command, context).await
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl<C: Command> Clone for Chain<C> {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
            depth: self.depth,
        }
    }
}

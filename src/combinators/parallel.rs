//! The `Parallel` combinator (spec.md §4.4).
//!
//! Grounded on `core/batch.rs`'s `BatchProcessor::process_parallel`/
//! `group_results_by_action` (fan-out over independent units of work,
//! failure grouping) — reimplemented over spawned `tokio` tasks and
//! `futures::stream::FuturesUnordered` (promoted from the teacher's
//! optional `futures` dependency, used there only behind `builtin-llm`)
//! instead of `rayon`, since cooperative-cancellation-compatible fan-out
//! needs an async executor, not a thread pool, and fail-fast needs to react
//! to whichever child finishes first rather than in spawn order.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::FuturesUnordered;
use futures::StreamExt;

use crate::context::Context;
use crate::error::{ChildFailure, PipelineError, Result};
use crate::middleware::{Middleware, Next};
use crate::Command;

/// Governs how a `pre-validation` `Parallel` reacts to a failing child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParallelPolicy {
    /// Cancel remaining siblings as soon as one child fails; return the
    /// first failure. Default per spec.md §4.4.
    FailFast,
    /// Await every child regardless of failures; return all of them.
    BestEffort,
}

/// The two fan-out strategies spec.md §4.4 describes.
pub enum ParallelStrategy {
    /// Children run purely for context side effects; none may call `next`.
    /// Results are discarded — only their forked contexts are merged back.
    SideEffectsOnly,
    /// Children are expected to succeed or fail like ordinary middleware
    /// (still without calling `next`); failures are aggregated per
    /// `ParallelPolicy`.
    PreValidation(ParallelPolicy),
}

/// A middleware that is never allowed to call `next` — calling it is a
/// contract violation for a `Parallel` child, reported as an error rather
/// than silently tolerated or prevented.
fn forbidden_next<C: Command>() -> Next<C> {
    Next::new(Arc::new(|_command, _context| {
        Box::pin(async {
            Err(PipelineError::execution_failed(
                "a Parallel child middleware must not call next",
            ))
        })
    }))
}

/// Fans a list of middlewares out concurrently, each on its own forked
/// `Context`, then (on success) merges every fork back into the parent and
/// calls `next` exactly once. Spec.md §5: `next` runs only after every
/// fanned-out child has observably completed.
pub struct Parallel<C: Command> {
    children: Vec<Arc<dyn Middleware<C>>>,
    strategy: ParallelStrategy,
    merge_context: bool,
}

impl<C: Command> Parallel<C> {
    pub fn new(children: Vec<Arc<dyn Middleware<C>>>, strategy: ParallelStrategy) -> Self {
        Self {
            children,
            strategy,
            // Open question resolved off by default (SPEC_FULL.md, spec.md §9).
            merge_context: false,
        }
    }

    /// Only affects the two `PreValidation` policies: whether a
    /// successful pre-validation fan-out also overlays its children's
    /// forked contexts back onto the parent (off by default, per
    /// spec.md §9's open question). `SideEffectsOnly` always merges —
    /// that's the entire point of running children on forked contexts in
    /// the first place — so this flag has no effect on that strategy.
    pub fn with_merge_context(mut self, merge_context: bool) -> Self {
        self.merge_context = merge_context;
        self
    }

    async fn run_children(&self, command: &Arc<C>, context: &Arc<Context>) -> Vec<(usize, Arc<Context>, Result<C::Result>)> {
        let mut tasks = FuturesUnordered::new();
        for (index, child) in self.children.iter().enumerate() {
            let child = child.clone();
            let command = command.clone();
            let forked = Arc::new(context.fork_isolated());
            let forked_for_task = forked.clone();
            tasks.push(async move {
                let result = child.execute(command, forked_for_task, forbidden_next()).await;
                (index, forked, result)
            });
        }

        let mut results = Vec::with_capacity(self.children.len());
        while let Some(item) = tasks.next().await {
            results.push(item);
        }
        results
    }

    async fn run_children_fail_fast(
        &self,
        command: &Arc<C>,
        context: &Arc<Context>,
    ) -> std::result::Result<Vec<(usize, Arc<Context>)>, PipelineError> {
        let mut tasks = FuturesUnordered::new();
        let mut forks = Vec::with_capacity(self.children.len());
        for (index, child) in self.children.iter().enumerate() {
            let child = child.clone();
            let command = command.clone();
            let forked = Arc::new(context.fork_isolated());
            forks.push(forked.clone());
            let forked_for_task = forked.clone();
            tasks.push(async move {
                let result = child.execute(command, forked_for_task, forbidden_next()).await;
                (index, result)
            });
        }

        let mut succeeded = Vec::with_capacity(self.children.len());
        while let Some((index, result)) = tasks.next().await {
            match result {
                Ok(_) => succeeded.push((index, forks[index].clone())),
                Err(error) => {
                    for fork in &forks {
                        fork.cancel();
                    }
                    return Err(PipelineError::ParallelExecutionFailed {
                        failures: vec![ChildFailure {
                            child_id: index,
                            error: error.to_string(),
                        }],
                        first: Some(error.to_string()),
                    });
                }
            }
        }
        Ok(succeeded)
    }
}

#[async_trait]
impl<C: Command> Middleware<C> for Parallel<C> {
    async fn execute(&self, command: Arc<C>, context: Arc<Context>, next: Next<C>) -> Result<C::Result> {
        match &self.strategy {
            ParallelStrategy::SideEffectsOnly => {
                let results = self.run_children(&command, &context).await;
                let mut failures = Vec::new();
                for (index, _, result) in &results {
                    if let Err(error) = result {
                        failures.push(ChildFailure {
                            child_id: *index,
                            error: error.to_string(),
                        });
                    }
                }
                if !failures.is_empty() {
                    let first = failures[0].error.clone();
                    return Err(PipelineError::ParallelExecutionFailed {
                        failures,
                        first: Some(first),
                    });
                }
                // spec.md §4.4: side-effects-only unconditionally merges every
                // child's forked context back into the parent before calling
                // `next` — `merge_context` only toggles the pre-validation
                // policies below, where children aren't run purely for their
                // side effects.
                for (_, fork, _) in &results {
                    context.merge(fork);
                }
                next.call(command, context).await
            }
            ParallelStrategy::PreValidation(ParallelPolicy::FailFast) => {
                let forks = self.run_children_fail_fast(&command, &context).await?;
                if self.merge_context {
                    for (_, fork) in &forks {
                        context.merge(fork);
                    }
                }
                next.call(command, context).await
            }
            ParallelStrategy::PreValidation(ParallelPolicy::BestEffort) => {
                let results = self.run_children(&command, &context).await;
                let mut failures = Vec::new();
                let mut forks = Vec::with_capacity(results.len());
                for (index, fork, result) in results {
                    match result {
                        Ok(_) => forks.push(fork),
                        Err(error) => failures.push(ChildFailure {
                            child_id: index,
                            error: error.to_string(),
                        }),
                    }
                }
                if !failures.is_empty() {
                    let first = failures[0].error.clone();
                    return Err(PipelineError::ParallelExecutionFailed {
                        failures,
                        first: Some(first),
                    });
                }
                if self.merge_context {
                    for fork in &forks {
                        context.merge(fork);
                    }
                }
                next.call(command, context).await
            }
        }
    }
}

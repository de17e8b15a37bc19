//! The `Timeout` combinator (spec.md §4.4).
//!
//! Grounded on `node/mod.rs`'s `ExecutionContext`/`NodeError` fields (which
//! gesture at cancellation without implementing it), generalized here by
//! racing the wrapped middleware's future against `tokio::time::timeout`.
//! Dropping the losing branch of the race is what makes cancellation
//! cooperative in tokio's model: the wrapped future stops exactly at
//! whatever `.await` point it was suspended on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::{PipelineError, Result};
use crate::middleware::{Middleware, Next};
use crate::Command;

/// Bounds a wrapped middleware's wall-clock time. The outer context is
/// never mutated as a side effect of a timeout firing.
pub struct Timeout<C: Command> {
    wrapped: Arc<dyn Middleware<C>>,
    duration: Duration,
}

impl<C: Command> Timeout<C> {
    /// Panics if `duration` is not positive (spec.md §5: a configuration
    /// with `d <= 0` is rejected at construction).
    pub fn new(wrapped: Arc<dyn Middleware<C>>, duration: Duration) -> Self {
        assert!(duration > Duration::ZERO, "timeout duration must be positive");
        Self { wrapped, duration }
    }
}

#[async_trait]
impl<C: Command> Middleware<C> for Timeout<C> {
    fn priority(&self) -> i64 {
        self.wrapped.priority()
    }

    async fn execute(&self, command: Arc<C>, context: Arc<Context>, next: Next<C>) -> Result<C::Result> {
        match tokio::time::timeout(self.duration, self.wrapped.execute(command, context, next)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(PipelineError::Timeout {
                duration: self.duration,
                context: None,
            }),
        }
    }
}

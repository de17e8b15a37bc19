//! The `Retry` combinator (spec.md §4.4).
//!
//! Grounded directly on `core/node.rs`'s `RetryableNode::run_with_retry`
//! (attempt loop, `tokio::time::sleep` between attempts, exhaustion returns
//! the last error) and `composition/node.rs`'s `RetryDecorator<T>` (same
//! attempt-loop shape, decorator wraps `exec`) — generalized to wrap an
//! arbitrary `Middleware` rather than an `ExecBehavior`, and extended with
//! the delay-strategy enum spec.md §4.4 calls for.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::{PipelineError, Result};
use crate::middleware::{Middleware, Next};
use crate::Command;

/// How long to wait before each retry attempt. Attempt numbering starts at
/// 0 for the delay preceding the *first* retry (i.e. after the initial
/// attempt fails).
#[derive(Clone)]
pub enum DelayStrategy {
    Immediate,
    Fixed(Duration),
    Exponential {
        base: Duration,
        multiplier: f64,
        cap: Duration,
    },
    Linear {
        increment: Duration,
        cap: Duration,
    },
    Custom(Arc<dyn Fn(usize) -> Duration + Send + Sync>),
}

impl DelayStrategy {
    pub fn delay(&self, attempt: usize) -> Duration {
        match self {
            Self::Immediate => Duration::ZERO,
            Self::Fixed(d) => *d,
            Self::Exponential {
                base,
                multiplier,
                cap,
            } => {
                let scaled = base.as_secs_f64() * multiplier.powi(attempt as i32);
                Duration::from_secs_f64(scaled.max(0.0)).min(*cap)
            }
            Self::Linear { increment, cap } => {
                let scaled = increment.saturating_mul(attempt as u32);
                scaled.min(*cap)
            }
            Self::Custom(f) => f(attempt),
        }
    }
}

type ShouldRetry = Arc<dyn Fn(&PipelineError) -> bool + Send + Sync>;

/// Re-runs a wrapped middleware on failure, up to `max_attempts` total
/// tries, sleeping between attempts per `delay`. Each attempt gets its own
/// one-shot `next` — failing to call it once is the wrapped middleware's
/// own bug, not something a retry should paper over.
pub struct Retry<C: Command> {
    wrapped: Arc<dyn Middleware<C>>,
    max_attempts: usize,
    should_retry: ShouldRetry,
    delay: DelayStrategy,
}

impl<C: Command> Retry<C> {
    /// `max_attempts` must be at least 1 (the initial try counts as an
    /// attempt). Retries every error by default; narrow with
    /// `with_should_retry`.
    pub fn new(wrapped: Arc<dyn Middleware<C>>, max_attempts: usize, delay: DelayStrategy) -> Self {
        assert!(max_attempts >= 1, "max_attempts must be at least 1");
        Self {
            wrapped,
            max_attempts,
            should_retry: Arc::new(|_| true),
            delay,
        }
    }

    pub fn with_should_retry(mut self, should_retry: impl Fn(&PipelineError) -> bool + Send + Sync + 'static) -> Self {
        self.should_retry = Arc::new(should_retry);
        self
    }
}

#[async_trait]
impl<C: Command> Middleware<C> for Retry<C> {
    fn priority(&self) -> i64 {
        self.wrapped.priority()
    }

    async fn execute(&self, command: Arc<C>, context: Arc<Context>, next: Next<C>) -> Result<C::Result> {
        let mut last_error: Option<PipelineError> = None;
        for attempt in 0..self.max_attempts {
            if context.is_cancelled() {
                return Err(PipelineError::cancelled());
            }
            let attempt_next = next.fresh();
            match self
                .wrapped
                .execute(command.clone(), context.clone(), attempt_next)
                .await
            {
                Ok(value) => return Ok(value),
                Err(PipelineError::Cancelled { context }) => {
                    // spec.md §5: retry does not survive cancellation.
                    return Err(PipelineError::Cancelled { context });
                }
                Err(error) => {
                    let retryable = attempt + 1 < self.max_attempts && (self.should_retry)(&error);
                    last_error = Some(error);
                    if !retryable {
                        break;
                    }
                    let wait = self.delay.delay(attempt);
                    if wait > Duration::ZERO {
                        tokio::select! {
                            _ = tokio::time::sleep(wait) => {}
                            _ = context.cancelled() => return Err(PipelineError::cancelled()),
                        }
                    }
                }
            }
        }
        Err(PipelineError::RetryExhausted {
            attempts: self.max_attempts,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

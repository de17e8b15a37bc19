//! The tagged error sum surfaced by every fallible operation in the engine.
//!
//! Mirrors the rest of this codebase's error conventions (one
//! `thiserror`-derived enum per concern, structured fields rather than free
//! text) rather than a `Box<dyn Error>` grab bag.

use std::time::Duration;

use thiserror::Error;

/// Optional contextual breadcrumbs attached to an error at the point it
/// crosses a clearly defined boundary (never invented further downstream).
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub command_type: Option<&'static str>,
    pub middleware_type: Option<&'static str>,
    pub correlation_id: Option<String>,
    pub user_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command_type(mut self, command_type: &'static str) -> Self {
        self.command_type = Some(command_type);
        self
    }

    pub fn with_middleware_type(mut self, middleware_type: &'static str) -> Self {
        self.middleware_type = Some(middleware_type);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// A single child failure recorded by the `Parallel` combinator.
#[derive(Debug, Clone)]
pub struct ChildFailure {
    pub child_id: usize,
    pub error: String,
}

/// Reason a request was rejected under back pressure.
#[derive(Debug, Clone)]
pub enum BackPressureReason {
    QueueFull { current: usize, limit: usize },
    Timeout { duration: Duration },
    Dropped { reason: String },
    MemoryPressure,
}

impl std::fmt::Display for BackPressureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QueueFull { current, limit } => {
                write!(f, "queue full ({current}/{limit})")
            }
            Self::Timeout { duration } => write!(f, "timed out after {duration:?}"),
            Self::Dropped { reason } => write!(f, "dropped: {reason}"),
            Self::MemoryPressure => write!(f, "memory pressure"),
        }
    }
}

/// Reason a resilience guard (outside this crate's scope to implement, but
/// representable) rejected an execution.
#[derive(Debug, Clone)]
pub enum ResilienceReason {
    CircuitBreakerOpen,
    BulkheadFull,
    FallbackFailed { message: String },
    TimeoutExceeded,
}

impl std::fmt::Display for ResilienceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CircuitBreakerOpen => write!(f, "circuit breaker open"),
            Self::BulkheadFull => write!(f, "bulkhead full"),
            Self::FallbackFailed { message } => write!(f, "fallback failed: {message}"),
            Self::TimeoutExceeded => write!(f, "timeout exceeded"),
        }
    }
}

/// The single tagged error sum for the engine. Every variant carries a
/// structured payload; combinators are expected to wrap rather than
/// stringify child failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("execution cancelled")]
    Cancelled { context: Option<ErrorContext> },

    #[error("timed out after {duration:?}")]
    Timeout {
        duration: Duration,
        context: Option<ErrorContext>,
    },

    #[error("next() was invoked more than once for this middleware boundary")]
    NextAlreadyCalled,

    /// Debug-only diagnostic. Never returned to a caller as a control-flow
    /// signal — see `next_guard`'s module docs.
    #[error("next() was never called before the guard was dropped")]
    NextNeverCalled,

    #[error("chain depth {depth} exceeds the configured maximum")]
    MaxDepthExceeded { depth: usize },

    #[error("this chain is specialized to a different command type")]
    InvalidCommandType,

    #[error("{} parallel child(ren) failed", failures.len())]
    ParallelExecutionFailed {
        failures: Vec<ChildFailure>,
        first: Option<String>,
    },

    #[error("retry budget exhausted after {attempts} attempt(s): {last_error}")]
    RetryExhausted { attempts: usize, last_error: String },

    #[error("back pressure: {reason}")]
    BackPressure { reason: BackPressureReason },

    #[error("resilience guard rejected execution: {reason}")]
    Resilience { reason: ResilienceReason },

    #[error("{message}")]
    ExecutionFailed {
        message: String,
        context: Option<ErrorContext>,
    },
}

impl PipelineError {
    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
            context: None,
        }
    }

    pub fn cancelled() -> Self {
        Self::Cancelled { context: None }
    }

    pub fn with_context(self, context: ErrorContext) -> Self {
        match self {
            Self::Cancelled { .. } => Self::Cancelled {
                context: Some(context),
            },
            Self::Timeout { duration, .. } => Self::Timeout {
                duration,
                context: Some(context),
            },
            Self::ExecutionFailed { message, .. } => Self::ExecutionFailed {
                message,
                context: Some(context),
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

//! # PipelineKit
//!
//! A generic, thread-safe command–middleware execution engine.
//!
//! PipelineKit builds a pipeline from three pieces: a typed [`Command`],
//! bound to exactly one [`Handler`], and an ordered stack of [`Middleware`]
//! assembled by a [`ChainBuilder`] into an immutable [`Chain`]. Each
//! middleware observes, modifies, short-circuits, or delegates execution by
//! calling its `next` continuation — enforced to run at most once per
//! execution by [`NextGuard`]. A per-execution [`Context`] carries
//! type-keyed state, metadata, metrics, and a request id between
//! middleware, with concurrency handled internally so callers never lock
//! anything themselves.
//!
//! ## Modules
//!
//! - [`command`]: the `Command`/`Handler` contract.
//! - [`middleware`]: the `Middleware` trait and its one-shot `Next`.
//! - [`next_guard`]: the atomic one-shot continuation guard.
//! - [`context`]: the per-execution `Context` store and optional
//!   `ContextPool`.
//! - [`chain`]: `ChainBuilder`/`Chain` — assembling middleware into an
//!   ordered, immutable execution path.
//! - [`combinators`]: reusable middleware wrappers — `Conditional`,
//!   `Parallel`, `Retry`, `Timeout`, `Group`.
//! - [`executor`]: `PipelineExecutor` — drives a built `Chain` to
//!   completion.
//! - [`cancellation`]: the cooperative cancellation signal threaded through
//!   `Context`.
//! - [`error`]: the single tagged `PipelineError` sum.
//! - [`config`]: engine-wide tunables (`default_max_chain_depth`,
//!   `default_pool_max_size`), environment- and optionally TOML-backed.
//!
//! ## Example
//!
//! ```rust
//! use pipelinekit::prelude::*;
//! use std::sync::Arc;
//!
//! struct Greet(String);
//! impl Command for Greet {
//!     type Result = String;
//! }
//!
//! struct GreetHandler;
//! #[async_trait::async_trait]
//! impl Handler<Greet> for GreetHandler {
//!     async fn handle(&self, command: Arc<Greet>) -> pipelinekit::error::Result<String> {
//!         Ok(format!("hello, {}", command.0))
//!     }
//! }
//!
//! # async fn run() -> pipelinekit::error::Result<()> {
//! let chain = ChainBuilder::new(Arc::new(GreetHandler)).build()?;
//! let executor = PipelineExecutor::new(chain);
//! let result = executor.execute(Greet("world".to_string()), Arc::new(Context::new())).await?;
//! assert_eq!(result, "hello, world");
//! # Ok(())
//! # }
//! ```

pub mod cancellation;
pub mod chain;
pub mod combinators;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod middleware;
pub mod next_guard;

pub use command::{Command, CommandMetadata, FnHandler, Handler};
pub use context::Context;
pub use error::{PipelineError, Result};

/// Convenient re-exports for common types and traits.
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::chain::{Chain, ChainBuilder};
    pub use crate::combinators::{
        Conditional, DelayStrategy, Group, Parallel, ParallelPolicy, ParallelStrategy, Retry, Timeout,
    };
    pub use crate::command::{Command, CommandMetadata, FnHandler, Handler};
    pub use crate::config::EngineConfig;
    pub use crate::context::{Context, ContextKey, ContextPool};
    pub use crate::error::{PipelineError, Result};
    pub use crate::executor::PipelineExecutor;
    pub use crate::middleware::{priority, Middleware, Next};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::sync::Arc;

    struct Echo(String);
    impl Command for Echo {
        type Result = String;
    }

    struct EchoHandler;
    #[async_trait::async_trait]
    impl Handler<Echo> for EchoHandler {
        async fn handle(&self, command: Arc<Echo>) -> Result<String> {
            Ok(command.0.clone())
        }
    }

    struct Uppercase;
    #[async_trait::async_trait]
    impl Middleware<Echo> for Uppercase {
        async fn execute(&self, command: Arc<Echo>, context: Arc<Context>, next: Next<Echo>) -> Result<String> {
            let result = next.call(command, context).await?;
            Ok(result.to_uppercase())
        }
    }

    #[tokio::test]
    async fn end_to_end_chain_runs_middleware_then_handler() {
        let chain = ChainBuilder::new(Arc::new(EchoHandler))
            .add(Arc::new(Uppercase))
            .build()
            .unwrap();
        let executor = PipelineExecutor::new(chain);
        let result = executor
            .execute(Echo("hello".to_string()), Arc::new(Context::new()))
            .await
            .unwrap();
        assert_eq!(result, "HELLO");
    }

    #[test]
    fn pipeline_error_cancelled_round_trips_display() {
        let error = PipelineError::cancelled();
        assert_eq!(error.to_string(), "execution cancelled");
    }
}

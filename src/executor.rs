//! The Pipeline Executor (spec.md §4.5).
//!
//! Grounded on `src/flow.rs`'s `BasicFlow::execute_from` — a single entry
//! point that drives a pre-built structure to completion and propagates
//! structured errors without rewriting them — generalized from flow's
//! step-looping router down to a single chain-head invocation, with a
//! `tracing::Span` entered per execution for this codebase's ambient
//! logging convention.

use std::sync::Arc;

use tracing::Instrument;

use crate::chain::Chain;
use crate::command::CommandMetadata;
use crate::context::{Context, ContextPool};
use crate::error::Result;
use crate::Command;

/// Drives a pre-built `Chain` to completion for one `(command, context)`
/// pair. Stateless and cheap to clone — a `Chain` is itself immutable and
/// freely shared, so an executor built around one may be reused across
/// concurrent executions.
pub struct PipelineExecutor<C: Command> {
    chain: Chain<C>,
    pool: Option<ContextPool>,
}

impl<C: Command> PipelineExecutor<C> {
    pub fn new(chain: Chain<C>) -> Self {
        Self { chain, pool: None }
    }

    /// Attaches a `ContextPool` so `execute_with_metadata` borrows rather
    /// than allocates. The executor behaves identically with or without
    /// one (spec.md §4.6).
    pub fn with_pool(mut self, pool: ContextPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Runs the chain exactly once. Does not mutate `command`; propagates
    /// the first error encountered unchanged, except where a combinator in
    /// the chain has already transformed it.
    pub async fn execute(&self, command: C, context: Arc<Context>) -> Result<C::Result> {
        let request_id = context.request_id().unwrap_or_default();
        let span = tracing::info_span!("pipeline_execute", request_id = %request_id, depth = self.chain.depth());
        self.chain.run(Arc::new(command), context).instrument(span).await
    }

    /// Convenience overload: builds a `Context` from `metadata` (borrowed
    /// from the attached pool and returned to it afterward, when one is
    /// attached) instead of requiring the caller to construct one.
    pub async fn execute_with_metadata(&self, command: C, metadata: CommandMetadata) -> Result<C::Result> {
        match &self.pool {
            Some(pool) => {
                let borrowed = pool.borrow();
                Self::apply_metadata(&borrowed, &metadata);
                let context = borrowed.context_arc();
                let result = self.execute(command, context).await;
                pool.return_context(borrowed);
                result
            }
            None => {
                let context = Arc::new(Context::new());
                Self::apply_metadata(&context, &metadata);
                self.execute(command, context).await
            }
        }
    }

    fn apply_metadata(context: &Context, metadata: &CommandMetadata) {
        if let Some(correlation_id) = &metadata.correlation_id {
            context.set_metadata("correlation_id", correlation_id.clone());
        }
        if let Some(user_id) = &metadata.user_id {
            context.set_metadata("user_id", user_id.clone());
        }
        context.set_request_id(metadata.id.to_string());
    }
}

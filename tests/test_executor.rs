//! Integration-level coverage of `PipelineExecutor` (spec.md §4.5, §4.6):
//! pool neutrality (property 10) and propagation of an unwrapped error from
//! deep inside the chain.

use std::sync::Arc;

use async_trait::async_trait;
use pipelinekit::prelude::*;

struct Echo(i32);
impl Command for Echo {
    type Result = i32;
}

struct Doubles;
#[async_trait]
impl Handler<Echo> for Doubles {
    async fn handle(&self, command: Arc<Echo>) -> Result<i32> {
        Ok(command.0 * 2)
    }
}

fn build_executor() -> PipelineExecutor<Echo> {
    let chain = ChainBuilder::new(Arc::new(Doubles)).build().unwrap();
    PipelineExecutor::new(chain)
}

#[tokio::test]
async fn pooled_and_unpooled_executors_return_identical_results() {
    let without_pool = build_executor();
    let with_pool = build_executor().with_pool(ContextPool::new(8));

    let metadata = CommandMetadata::new().with_correlation_id("req-xyz");
    let a = without_pool
        .execute_with_metadata(Echo(21), metadata.clone())
        .await
        .unwrap();
    let b = with_pool.execute_with_metadata(Echo(21), metadata).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(a, 42);
}

struct AlwaysFails;
#[async_trait]
impl Middleware<Echo> for AlwaysFails {
    async fn execute(&self, _command: Arc<Echo>, _context: Arc<Context>, _next: Next<Echo>) -> Result<i32> {
        Err(PipelineError::execution_failed("deep failure"))
    }
}

#[tokio::test]
async fn pooled_and_unpooled_executors_classify_the_same_error_identically() {
    let chain_a = ChainBuilder::new(Arc::new(Doubles)).add(Arc::new(AlwaysFails)).build().unwrap();
    let chain_b = ChainBuilder::new(Arc::new(Doubles)).add(Arc::new(AlwaysFails)).build().unwrap();
    let without_pool = PipelineExecutor::new(chain_a);
    let with_pool = PipelineExecutor::new(chain_b).with_pool(ContextPool::new(8));

    let a = without_pool.execute_with_metadata(Echo(1), CommandMetadata::new()).await;
    let b = with_pool.execute_with_metadata(Echo(1), CommandMetadata::new()).await;

    assert!(matches!(a, Err(PipelineError::ExecutionFailed { ref message, .. }) if message == "deep failure"));
    assert!(matches!(b, Err(PipelineError::ExecutionFailed { ref message, .. }) if message == "deep failure"));
}

#[tokio::test]
async fn executor_does_not_mutate_the_caller_supplied_command() {
    let chain = ChainBuilder::new(Arc::new(Doubles)).build().unwrap();
    let executor = PipelineExecutor::new(chain);
    let command = Echo(5);
    let result = executor.execute(command, Arc::new(Context::new())).await;
    assert_eq!(result.unwrap(), 10);
}

//! Cooperative cancellation propagating through a chain (spec.md §5,
//! property 11): once `Context::cancel` is called, every middleware still
//! suspended at a `next` call observes `Cancelled` instead of completing,
//! and no further `next` invocations occur.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pipelinekit::prelude::*;

struct Echo;
impl Command for Echo {
    type Result = &'static str;
}

struct EchoHandler {
    reached: Arc<AtomicBool>,
}

#[async_trait]
impl Handler<Echo> for EchoHandler {
    async fn handle(&self, _command: Arc<Echo>) -> Result<&'static str> {
        self.reached.store(true, Ordering::SeqCst);
        Ok("handler")
    }
}

struct WaitsThenCallsNext;
#[async_trait]
impl Middleware<Echo> for WaitsThenCallsNext {
    async fn execute(&self, command: Arc<Echo>, context: Arc<Context>, next: Next<Echo>) -> Result<&'static str> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        next.call(command, context).await
    }
}

#[tokio::test(start_paused = true)]
async fn cancelling_context_stops_a_suspended_middleware_before_it_reaches_next() {
    let handler_reached = Arc::new(AtomicBool::new(false));
    let chain = ChainBuilder::new(Arc::new(EchoHandler {
        reached: handler_reached.clone(),
    }))
    .add(Arc::new(WaitsThenCallsNext))
    .build()
    .unwrap();
    let executor = PipelineExecutor::new(chain);
    let context = Arc::new(Context::new());

    let context_for_cancel = context.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        context_for_cancel.cancel();
    });

    let result = executor.execute(Echo, context).await;
    assert!(matches!(result, Err(PipelineError::Cancelled { .. })));
    assert!(!handler_reached.load(Ordering::SeqCst));
}

struct PassThrough;
#[async_trait]
impl Middleware<Echo> for PassThrough {
    async fn execute(&self, command: Arc<Echo>, context: Arc<Context>, next: Next<Echo>) -> Result<&'static str> {
        next.call(command, context).await
    }
}

#[tokio::test]
async fn already_cancelled_context_is_observed_at_the_next_suspension_point() {
    let handler_reached = Arc::new(AtomicBool::new(false));
    let chain = ChainBuilder::new(Arc::new(EchoHandler {
        reached: handler_reached.clone(),
    }))
    .add(Arc::new(PassThrough))
    .build()
    .unwrap();
    let executor = PipelineExecutor::new(chain);
    let context = Arc::new(Context::new());
    context.cancel();

    let result = executor.execute(Echo, context).await;
    assert!(matches!(result, Err(PipelineError::Cancelled { .. })));
    assert!(!handler_reached.load(Ordering::SeqCst));
}

//! End-to-end scenarios, mirroring the literal inputs/outputs this engine
//! is expected to reproduce exactly: an empty chain, ordering across two
//! pass-through middlewares, retry success/exhaustion, a firing timeout,
//! a parallel side-effects merge, and the double-`next` bug.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pipelinekit::prelude::*;

struct Echo(&'static str);
impl Command for Echo {
    type Result = &'static str;
}

struct EchoHandler;
#[async_trait]
impl Handler<Echo> for EchoHandler {
    async fn handle(&self, command: Arc<Echo>) -> Result<&'static str> {
        Ok(command.0)
    }
}

struct Tag(&'static str, i64, Arc<Mutex<Vec<&'static str>>>);
#[async_trait]
impl Middleware<Echo> for Tag {
    fn priority(&self) -> i64 {
        self.1
    }

    async fn execute(&self, command: Arc<Echo>, context: Arc<Context>, next: Next<Echo>) -> Result<&'static str> {
        self.2.lock().unwrap().push(self.0);
        let result = next.call(command, context).await;
        self.2.lock().unwrap().push(self.0);
        result
    }
}

#[tokio::test]
async fn s1_empty_chain_returns_handler_result_unchanged() {
    let chain = ChainBuilder::new(Arc::new(EchoHandler)).build().unwrap();
    let executor = PipelineExecutor::new(chain);
    let result = executor.execute(Echo("x"), Arc::new(Context::new())).await;
    assert_eq!(result.unwrap(), "x");
}

#[tokio::test]
async fn s2_two_middleware_chain_orders_entry_and_unwind() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = ChainBuilder::new(Arc::new(EchoHandler))
        .add(Arc::new(Tag("auth", 100, log.clone())))
        .add(Arc::new(Tag("log", 500, log.clone())))
        .build()
        .unwrap();
    let executor = PipelineExecutor::new(chain);
    let result = executor.execute(Echo("y"), Arc::new(Context::new())).await;
    assert_eq!(result.unwrap(), "y");
    assert_eq!(*log.lock().unwrap(), vec!["auth", "log", "log", "auth"]);
}

struct FailsNTimesThenSucceeds {
    remaining_failures: AtomicUsize,
    success_value: i32,
}

#[async_trait]
impl Middleware<CountCmd> for FailsNTimesThenSucceeds {
    async fn execute(&self, command: Arc<CountCmd>, context: Arc<Context>, next: Next<CountCmd>) -> Result<i32> {
        if self.remaining_failures.load(Ordering::SeqCst) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            Err(PipelineError::execution_failed("transient"))
        } else {
            let _ = next.call(command, context).await;
            Ok(self.success_value)
        }
    }
}

struct CountCmd;
impl Command for CountCmd {
    type Result = i32;
}

struct CountHandler;
#[async_trait]
impl Handler<CountCmd> for CountHandler {
    async fn handle(&self, _command: Arc<CountCmd>) -> Result<i32> {
        Ok(0)
    }
}

#[tokio::test(start_paused = true)]
async fn s3_retry_succeeds_after_two_failures() {
    let wrapped = Arc::new(FailsNTimesThenSucceeds {
        remaining_failures: AtomicUsize::new(2),
        success_value: 42,
    });
    let retry = Retry::new(wrapped, 3, DelayStrategy::Fixed(Duration::from_millis(10)));
    let chain = ChainBuilder::new(Arc::new(CountHandler))
        .add(Arc::new(retry))
        .build()
        .unwrap();
    let executor = PipelineExecutor::new(chain);
    let result = executor.execute(CountCmd, Arc::new(Context::new())).await;
    assert_eq!(result.unwrap(), 42);
}

#[tokio::test(start_paused = true)]
async fn s4_retry_exhausted_carries_last_error() {
    let wrapped = Arc::new(FailsNTimesThenSucceeds {
        remaining_failures: AtomicUsize::new(usize::MAX),
        success_value: 0,
    });
    let retry = Retry::new(wrapped, 2, DelayStrategy::Immediate);
    let chain = ChainBuilder::new(Arc::new(CountHandler))
        .add(Arc::new(retry))
        .build()
        .unwrap();
    let executor = PipelineExecutor::new(chain);
    let result = executor.execute(CountCmd, Arc::new(Context::new())).await;
    assert!(matches!(
        result,
        Err(PipelineError::RetryExhausted { attempts: 2, .. })
    ));
}

struct SleepsThenEchoes(Duration);
#[async_trait]
impl Middleware<Echo> for SleepsThenEchoes {
    async fn execute(&self, command: Arc<Echo>, context: Arc<Context>, next: Next<Echo>) -> Result<&'static str> {
        tokio::time::sleep(self.0).await;
        next.call(command, context).await
    }
}

#[tokio::test(start_paused = true)]
async fn s5_timeout_fires_within_bounds() {
    let timeout = Timeout::new(Arc::new(SleepsThenEchoes(Duration::from_millis(500))), Duration::from_millis(100));
    let chain = ChainBuilder::new(Arc::new(EchoHandler))
        .add(Arc::new(timeout))
        .build()
        .unwrap();
    let executor = PipelineExecutor::new(chain);
    let result = executor.execute(Echo("z"), Arc::new(Context::new())).await;
    assert!(matches!(
        result,
        Err(PipelineError::Timeout { duration, .. }) if duration == Duration::from_millis(100)
    ));
}

struct KeyK1;
impl ContextKey for KeyK1 {
    type Value = &'static str;
}

struct KeyK2;
impl ContextKey for KeyK2 {
    type Value = &'static str;
}

struct SetsK1;
#[async_trait]
impl Middleware<Echo> for SetsK1 {
    async fn execute(&self, _command: Arc<Echo>, context: Arc<Context>, _next: Next<Echo>) -> Result<&'static str> {
        context.set::<KeyK1>("a");
        Ok("unused")
    }
}

struct SetsK2;
#[async_trait]
impl Middleware<Echo> for SetsK2 {
    async fn execute(&self, _command: Arc<Echo>, context: Arc<Context>, _next: Next<Echo>) -> Result<&'static str> {
        context.set::<KeyK2>("b");
        Ok("unused")
    }
}

#[tokio::test]
async fn s6_parallel_side_effects_merge_into_parent_before_next() {
    let parallel = Parallel::new(vec![Arc::new(SetsK1), Arc::new(SetsK2)], ParallelStrategy::SideEffectsOnly);
    let chain = ChainBuilder::new(Arc::new(EchoHandler))
        .add(Arc::new(parallel))
        .build()
        .unwrap();
    let context = Arc::new(Context::new());
    let executor = PipelineExecutor::new(chain);
    let result = executor.execute(Echo("ok"), context.clone()).await;
    assert_eq!(result.unwrap(), "ok");
    assert_eq!(context.get::<KeyK1>(), Some("a"));
    assert_eq!(context.get::<KeyK2>(), Some("b"));
}

struct DoubleCall;
#[async_trait]
impl Middleware<Echo> for DoubleCall {
    async fn execute(&self, command: Arc<Echo>, context: Arc<Context>, next: Next<Echo>) -> Result<&'static str> {
        let first = next.call(command.clone(), context.clone()).await;
        let second = next.call(command, context).await;
        match (&first, &second) {
            (Ok(_), Err(PipelineError::NextAlreadyCalled)) => first,
            _ => second,
        }
    }
}

#[tokio::test]
async fn s7_double_next_yields_next_already_called_on_the_loser() {
    let chain = ChainBuilder::new(Arc::new(EchoHandler))
        .add(Arc::new(DoubleCall))
        .build()
        .unwrap();
    let executor = PipelineExecutor::new(chain);
    let result = executor.execute(Echo("w"), Arc::new(Context::new())).await;
    assert_eq!(result.unwrap(), "w");
}

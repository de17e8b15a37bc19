//! The `Conditional` combinator (spec.md §4.4).
//!
//! Grounded on `node/builtin.rs`'s `ConditionalNode` (holds a predicate over
//! the shared store, branches the resulting action) — generalized here from
//! a store-predicate-returns-action node into a command/context predicate
//! gating delegation to a wrapped middleware versus calling `next` directly.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Result;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::Command;

type Predicate<C> = Arc<dyn Fn(Arc<C>, Arc<Context>) -> BoxFuture<'static, bool> + Send + Sync>;

/// Delegates to a wrapped middleware only when an async predicate holds;
/// otherwise calls `next` directly, as if the wrapped middleware were
/// absent for this execution. The predicate runs exactly once per
/// execution.
pub struct Conditional<C: Command> {
    predicate: Predicate<C>,
    wrapped: Arc<dyn Middleware<C>>,
}

impl<C: Command> Conditional<C> {
    pub fn new<F, Fut>(predicate: F, wrapped: Arc<dyn Middleware<C>>) -> Self
    where
        F: Fn(Arc<C>, Arc<Context>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self {
            predicate: Arc::new(move |command, context| Box::pin(predicate(command, context))),
            wrapped,
        }
    }
}

#[async_trait]
impl<C: Command> Middleware<C> for Conditional<C> {
    fn priority(&self) -> i64 {
        self.wrapped.priority()
    }

    async fn execute(&self, command: Arc<C>, context: Arc<Context>, next: Next<C>) -> Result<C::Result> {
        if (self.predicate)(command.clone(), context.clone()).await {
            self.wrapped.execute(command, context, next).await
        } else {
            next.call(command, context).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Handler;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Echo;
    impl Command for Echo {
        type Result = &'static str;
    }

    struct EchoHandler;
    #[async_trait]
    impl Handler<Echo> for EchoHandler {
        async fn handle(&self, _command: Arc<Echo>) -> Result<&'static str> {
            Ok("handler")
        }
    }

    struct TaggingMiddleware(Arc<AtomicBool>);
    #[async_trait]
    impl Middleware<Echo> for TaggingMiddleware {
        async fn execute(
            &self,
            command: Arc<Echo>,
            context: Arc<Context>,
            next: Next<Echo>,
        ) -> Result<&'static str> {
            self.0.store(true, Ordering::SeqCst);
            next.call(command, context).await
        }
    }

    #[tokio::test]
    async fn true_predicate_delegates_to_wrapped() {
        let ran = Arc::new(AtomicBool::new(false));
        let conditional = Conditional::new(
            |_cmd, _ctx| async { true },
            Arc::new(TaggingMiddleware(ran.clone())),
        );
        let next = Next::new(Arc::new(move |command, _context| {
            Box::pin(async move {
                let _ = command;
                Ok("handler")
            })
        }));
        conditional
            .execute(Arc::new(Echo), Arc::new(Context::new()), next)
            .await
            .unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn false_predicate_skips_wrapped_and_calls_next() {
        let ran = Arc::new(AtomicBool::new(false));
        let conditional = Conditional::new(
            |_cmd, _ctx| async { false },
            Arc::new(TaggingMiddleware(ran.clone())),
        );
        let next = Next::new(Arc::new(move |_command, _context| {
            Box::pin(async move { Ok("handler") })
        }));
        let result = conditional
            .execute(Arc::new(Echo), Arc::new(Context::new()), next)
            .await
            .unwrap();
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(result, "handler");
    }
}

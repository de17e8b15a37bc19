//! Command / Handler contract (spec.md §3, §6).
//!
//! Generalizes this codebase's existing `core/node.rs` three-phase `Node`
//! trait (prep/exec/post bound to one shape of work) down to the simpler
//! shape the engine needs: a command declares its own result type, and a
//! handler is a single async function bound to that command type.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// An immutable description of an action, typed by its own result.
///
/// Implementors are expected to be cheap to pass around behind an `Arc` —
/// the engine never clones the payload itself, only the `Arc` pointing to
/// it.
pub trait Command: Send + Sync + 'static {
    /// The value a `Handler` for this command produces on success.
    type Result: Send + Sync + 'static;
}

/// Read-only metadata created alongside a command and carried for the
/// lifetime of its execution.
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    pub id: Uuid,
    pub created_at: SystemTime,
    pub user_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl CommandMetadata {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: SystemTime::now(),
            user_id: None,
            correlation_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

impl Default for CommandMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// A pure async terminal function bound to exactly one command type.
///
/// No hidden mutable state is required; handlers bound into a `Chain` are
/// expected to be singletons per command type, shared across executions.
#[async_trait]
pub trait Handler<C: Command>: Send + Sync {
    async fn handle(&self, command: Arc<C>) -> Result<C::Result>;
}

/// Adapts a plain async closure into a `Handler`, for cases where a full
/// trait impl would be ceremony.
pub struct FnHandler<C, F> {
    func: F,
    _marker: std::marker::PhantomData<fn(Arc<C>)>,
}

impl<C, F> FnHandler<C, F> {
    pub fn new(func: F) -> Self {
        Self {
            func,
            _marker: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<C, F, Fut> Handler<C> for FnHandler<C, F>
where
    C: Command,
    F: Fn(Arc<C>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<C::Result>> + Send,
{
    async fn handle(&self, command: Arc<C>) -> Result<C::Result> {
        (self.func)(command).await
    }
}

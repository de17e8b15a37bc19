//! The `Group` combinator (spec.md §4.4).
//!
//! Grounded on `composition/builder.rs`'s `DecoratorBuilder`/`Decoratable`
//! (composable wrapper construction feeding back into a builder) —
//! generalized here into splicing a named collection of middlewares into a
//! parent `ChainBuilder`, in order, optionally under one shared priority
//! override. A `Group` has no runtime behavior of its own: it exists only
//! at build time, unlike `Conditional`/`Retry`/`Timeout`/`Parallel`, which
//! are themselves middleware.

use std::sync::Arc;

use crate::chain::ChainBuilder;
use crate::middleware::Middleware;
use crate::Command;

/// A named, ordered collection of middleware spliced into a `ChainBuilder`
/// at build time, in order, under a shared priority override when one is
/// given. With no override, each member keeps its own declared priority.
pub struct Group<C: Command> {
    name: &'static str,
    priority_override: Option<i64>,
    members: Vec<Arc<dyn Middleware<C>>>,
}

impl<C: Command> Group<C> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            priority_override: None,
            members: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority_override = Some(priority);
        self
    }

    pub fn add(mut self, middleware: Arc<dyn Middleware<C>>) -> Self {
        self.members.push(middleware);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Splices every member into `builder`, in order, at this group's
    /// priority override if one was set.
    pub fn splice_into(self, mut builder: ChainBuilder<C>) -> ChainBuilder<C> {
        for member in self.members {
            builder = match self.priority_override {
                Some(priority) => builder.add_with_priority(member, priority),
                None => builder.add(member),
            };
        }
        builder
    }
}

//! The Context's best-effort event emitter hook (spec.md §4.1, §6).
//!
//! Grounded on `tools::monitoring`'s `MonitorTool`/`ExecutionTracer` (a
//! trait describing lifecycle observations, with no-op-friendly design)
//! but wired to `tracing` instead of a bespoke report struct — telemetry
//! exporters stay out of scope, while ambient logging does not.

use serde_json::Value as JsonValue;

/// `emit` must never block the execution path; implementations should be
/// as close to fire-and-forget as the underlying sink allows.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, name: &str, source: &str, properties: JsonValue);
}

/// The default emitter: observations are simply dropped.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit(&self, _name: &str, _source: &str, _properties: JsonValue) {}
}

/// Forwards every observation to `tracing` at debug level, giving the
/// engine an observable default without adding a telemetry dependency.
pub struct TracingEventEmitter;

impl EventEmitter for TracingEventEmitter {
    fn emit(&self, name: &str, source: &str, properties: JsonValue) {
        tracing::debug!(event = name, source, %properties, "context event");
    }
}

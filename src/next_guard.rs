//! The one-shot continuation guard (spec.md §4.2, §9).
//!
//! No direct analog in the teacher codebase — `core/node.rs`'s nodes call
//! their own next step unconditionally rather than handing a caller a
//! continuation to invoke. Built fresh, in the same idiom this codebase
//! uses elsewhere for atomic state (`Next-Guard's atomic state is the
//! single source of truth`, spec.md §9): a small integer state machine
//! transitioned by compare-and-set, with a `Drop`-time debug warning
//! mirroring `tools::debugging`'s use of `tracing::warn!`.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::error::PipelineError;

const PENDING: u8 = 0;
const EXECUTING: u8 = 1;
const COMPLETED: u8 = 2;

/// Enforces that a `next` continuation is entered at most once, and never
/// concurrently, surfacing precise diagnostics otherwise.
pub struct NextGuard {
    state: AtomicU8,
    allow_short_circuit: AtomicBool,
    cancelled: AtomicBool,
    debug_id: Option<String>,
}

impl NextGuard {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(PENDING),
            allow_short_circuit: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            debug_id: None,
        }
    }

    pub fn with_debug_id(debug_id: impl Into<String>) -> Self {
        Self {
            debug_id: Some(debug_id.into()),
            ..Self::new()
        }
    }

    pub fn allow_short_circuit(&self) {
        self.allow_short_circuit.store(true, Ordering::Relaxed);
    }

    /// Marks the guard's owning execution as cancelled, suppressing the
    /// "next never called" warning on drop. A best-effort developer aid,
    /// not a correctness signal — see module docs.
    pub fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Attempt the `pending -> executing` transition. Fails with
    /// `NextAlreadyCalled` if this guard already left `pending`.
    pub fn enter(&self) -> Result<(), PipelineError> {
        match self
            .state
            .compare_exchange(PENDING, EXECUTING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(_) => Err(PipelineError::NextAlreadyCalled),
        }
    }

    /// Transition `executing -> completed`. Called after the downstream
    /// continuation returns, success or error.
    pub fn complete(&self) {
        self.state.store(COMPLETED, Ordering::Release);
    }

    pub fn state(&self) -> GuardState {
        match self.state.load(Ordering::Acquire) {
            PENDING => GuardState::Pending,
            EXECUTING => GuardState::Executing,
            _ => GuardState::Completed,
        }
    }
}

impl Default for NextGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NextGuard {
    fn drop(&mut self) {
        let still_pending = self.state.load(Ordering::Acquire) == PENDING;
        let opted_out = self.allow_short_circuit.load(Ordering::Relaxed);
        let cancelled = self.cancelled.load(Ordering::Relaxed);
        if still_pending && !opted_out && !cancelled {
            tracing::warn!(
                debug_id = self.debug_id.as_deref().unwrap_or("<unnamed>"),
                "next was never called"
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Pending,
    Executing,
    Completed,
}

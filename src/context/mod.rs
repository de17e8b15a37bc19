//! The per-execution Context Store (spec.md §4.1).
//!
//! The typed partition is grounded directly on `core/communication.rs`'s
//! `StoredValue = Arc<dyn Any + Send + Sync>` / `StoreBackend` /
//! `InMemoryBackend` (`parking_lot::RwLock<HashMap<...>>`), reused for the
//! same reason: cheap-to-clone `Arc` handles behind a type-erased map.
//! Generalized here with a stable per-key type identity (instead of
//! teacher's string keys) plus the metadata/metrics/request-id/event
//! partitions and fork/merge/deep-fork semantics spec.md calls for.

pub mod event;
pub mod pool;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value as JsonValue;

use crate::cancellation::CancellationToken;

pub use event::{EventEmitter, NoopEventEmitter, TracingEventEmitter};
pub use pool::{ContextPool, ContextPoolStats, PooledContext};

/// Declares the value type stored under a given typed key. Keys are
/// zero-sized marker types; their `TypeId` is the stable identity spec.md
/// §4.1/§9 requires instead of a string.
///
/// `Value` is required to be `Clone` because `get` always hands back an
/// owned copy (mirroring `BaseSharedStore::get<T: Clone>` in this
/// codebase) and because that same bound is what lets `deep_fork`
/// genuinely duplicate a value rather than merely sharing its `Arc`.
pub trait ContextKey: 'static {
    type Value: Clone + Send + Sync + 'static;
}

/// Given the stored `Arc`, produce the genuinely deep-cloned replacement
/// for `deep_fork`. Takes the whole `Arc` (not just a `&dyn Any`) so a
/// downcast mismatch — unreachable in practice, since a cloner is only
/// ever paired with the entry `set::<K>` created alongside it — has a
/// graceful fallback: share the original `Arc` rather than panic.
type Cloner = Arc<dyn Fn(&Arc<dyn Any + Send + Sync>) -> Arc<dyn Any + Send + Sync> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    cloner: Cloner,
}

/// A mutable, concurrency-safe, per-execution key/value store.
///
/// Every operation takes a lock internally and returns promptly — Context
/// operations are synchronous from the caller's point of view and are
/// never cancellation checkpoints (spec.md §4.1, §5).
pub struct Context {
    typed: RwLock<HashMap<TypeId, Entry>>,
    metadata: RwLock<HashMap<String, JsonValue>>,
    metrics: RwLock<HashMap<String, f64>>,
    request_id: RwLock<Option<String>>,
    event_emitter: RwLock<Arc<dyn EventEmitter>>,
    cancellation: RwLock<CancellationToken>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            typed: RwLock::new(HashMap::new()),
            metadata: RwLock::new(HashMap::new()),
            metrics: RwLock::new(HashMap::new()),
            request_id: RwLock::new(None),
            event_emitter: RwLock::new(Arc::new(NoopEventEmitter)),
            cancellation: RwLock::new(CancellationToken::new()),
        }
    }

    // --- typed store -----------------------------------------------------

    pub fn set<K: ContextKey>(&self, value: K::Value) {
        let cloner: Cloner = Arc::new(|value: &Arc<dyn Any + Send + Sync>| match value.downcast_ref::<K::Value>() {
            Some(typed) => Arc::new(typed.clone()) as Arc<dyn Any + Send + Sync>,
            None => {
                debug_assert!(false, "cloner invoked against mismatched TypeId entry");
                value.clone()
            }
        });
        self.typed.write().insert(
            TypeId::of::<K>(),
            Entry {
                value: Arc::new(value),
                cloner,
            },
        );
    }

    pub fn get<K: ContextKey>(&self) -> Option<K::Value> {
        self.typed
            .read()
            .get(&TypeId::of::<K>())
            .and_then(|entry| entry.value.downcast_ref::<K::Value>().cloned())
    }

    pub fn remove<K: ContextKey>(&self) -> Option<K::Value> {
        self.typed
            .write()
            .remove(&TypeId::of::<K>())
            .and_then(|entry| entry.value.downcast_ref::<K::Value>().cloned())
    }

    pub fn contains<K: ContextKey>(&self) -> bool {
        self.typed.read().contains_key(&TypeId::of::<K>())
    }

    pub fn clear(&self) {
        self.typed.write().clear();
        self.metadata.write().clear();
        self.metrics.write().clear();
        *self.request_id.write() = None;
        *self.event_emitter.write() = Arc::new(NoopEventEmitter);
        *self.cancellation.write() = CancellationToken::new();
    }

    /// A point-in-time immutable copy of every typed entry. Cheap: clones
    /// `Arc` pointers, not the underlying values, so it never observes a
    /// torn state across keys (each key's `Arc` is copied atomically with
    /// respect to that key's own writers).
    pub fn snapshot(&self) -> HashMap<TypeId, Arc<dyn Any + Send + Sync>> {
        self.typed
            .read()
            .iter()
            .map(|(key, entry)| (*key, entry.value.clone()))
            .collect()
    }

    /// An independent copy sharing the same metadata, request id, and
    /// event emitter, with a shallow copy of every typed entry. Writes in
    /// the parent or the fork afterward do not leak to the other.
    pub fn fork(&self) -> Context {
        let fork = Context::new();
        *fork.typed.write() = self.typed.read().clone();
        *fork.metadata.write() = self.metadata.read().clone();
        *fork.metrics.write() = self.metrics.read().clone();
        *fork.request_id.write() = self.request_id.read().clone();
        *fork.event_emitter.write() = self.event_emitter.read().clone();
        *fork.cancellation.write() = self.cancellation.read().clone();
        fork
    }

    /// Like `fork`, but the copy gets its own independent cancellation
    /// scope: cancelling it (or the parent) does not affect the other.
    /// Used by fan-out combinators (`Parallel`) so that cancelling one
    /// failed branch's context on fail-fast does not reach back into the
    /// parent execution or its siblings.
    pub fn fork_isolated(&self) -> Context {
        let fork = self.fork();
        *fork.cancellation.write() = self.cancellation.read().child();
        fork
    }

    /// Like `fork`, but for each key in `keys` whose entry is present,
    /// installs a genuine deep clone (via that key's `Clone` impl) instead
    /// of sharing the parent's `Arc`. Every key set through `set` carries
    /// this capability automatically (see `ContextKey`'s `Clone` bound).
    pub fn deep_fork(&self, keys: &[TypeId]) -> Context {
        let fork = self.fork();
        let mut typed = fork.typed.write();
        for key in keys {
            if let Some(entry) = typed.get(key) {
                let deep_value = (entry.cloner)(&entry.value);
                typed.insert(
                    *key,
                    Entry {
                        value: deep_value,
                        cloner: entry.cloner.clone(),
                    },
                );
            }
        }
        drop(typed);
        fork
    }

    /// Atomically overlays `other`'s entries onto `self` — last write
    /// wins on conflict. `other` is left untouched.
    pub fn merge(&self, other: &Context) {
        let mut typed = self.typed.write();
        for (key, entry) in other.typed.read().iter() {
            typed.insert(*key, entry.clone());
        }
        drop(typed);
        let mut metadata = self.metadata.write();
        for (key, value) in other.metadata.read().iter() {
            metadata.insert(key.clone(), value.clone());
        }
        drop(metadata);
        let mut metrics = self.metrics.write();
        for (key, value) in other.metrics.read().iter() {
            metrics.insert(key.clone(), *value);
        }
    }

    // --- metadata partition (string-keyed, per spec.md §4.1/§9) ----------

    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.metadata.write().insert(key.into(), value.into());
    }

    pub fn get_metadata(&self, key: &str) -> Option<JsonValue> {
        self.metadata.read().get(key).cloned()
    }

    // --- metrics partition -----------------------------------------------

    pub fn record_metric(&self, name: impl Into<String>, value: f64) {
        self.metrics.write().insert(name.into(), value);
    }

    pub fn get_metric(&self, name: &str) -> Option<f64> {
        self.metrics.read().get(name).copied()
    }

    // --- request id --------------------------------------------------------

    /// Returns the request id, defaulting to the `correlation_id` metadata
    /// field if no request id was explicitly set, per spec.md §4.1.
    pub fn request_id(&self) -> Option<String> {
        self.request_id.read().clone().or_else(|| {
            self.get_metadata("correlation_id")
                .and_then(|value| value.as_str().map(str::to_string))
        })
    }

    pub fn set_request_id(&self, request_id: impl Into<String>) {
        *self.request_id.write() = Some(request_id.into());
    }

    // --- event emission ----------------------------------------------------

    pub fn set_event_emitter(&self, emitter: Arc<dyn EventEmitter>) {
        *self.event_emitter.write() = emitter;
    }

    /// Best-effort, fire-and-forget. Never awaited on the critical path —
    /// implementations must not block.
    pub fn emit(&self, name: &str, source: &str, properties: JsonValue) {
        self.event_emitter.read().emit(name, source, properties);
    }

    // --- cooperative cancellation (spec.md §5, §9) ------------------------

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.read().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.read().is_cancelled()
    }

    /// Marks this execution (and anything sharing its cancellation scope,
    /// e.g. contexts forked via `fork`) as cancelled. Pending middleware
    /// observe this the next time they reach a suspension point —
    /// `Next::call`, `Retry`'s sleep, `Timeout`'s race — and resolve with
    /// `PipelineError::Cancelled` instead of completing normally.
    pub fn cancel(&self) {
        self.cancellation.read().cancel();
    }

    /// Resolves once `cancel` has been called on this scope.
    pub async fn cancelled(&self) {
        let token = self.cancellation.read().clone();
        token.cancelled().await;
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

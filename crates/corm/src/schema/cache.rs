use super::{Model, Schema, introspect};
use crate::error::{OrmError, OrmResult};
use std::any::TypeId;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError, RwLock};

/// Default number of distinct types kept before wholesale eviction.
pub const DEFAULT_SCHEMA_CACHE_CAPACITY: usize = 1024;

type Outcome = OrmResult<Arc<Schema>>;

/// Rendezvous for callers waiting on a first-time introspection.
#[derive(Default)]
struct InFlight {
    outcome: Mutex<Option<Outcome>>,
    ready: Condvar,
}

impl InFlight {
    fn complete(&self, outcome: Outcome) {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(outcome);
        self.ready.notify_all();
    }

    fn wait(&self) -> Outcome {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Schema cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaCacheStats {
    pub hits: u64,
    pub introspections: u64,
    pub failures: u64,
    pub evictions: u64,
    pub size: usize,
    pub capacity: usize,
}

/// Bounded, single-flight cache of [`Schema`]s keyed by type.
///
/// Concurrent first requests for the same type share one introspection: the
/// first caller runs it, the rest block until it finishes and receive the
/// same `Arc<Schema>` (or the same error). Failures, including panics inside
/// [`Model::shape`], are not cached.
///
/// When the number of cached types exceeds the capacity, every entry except
/// the one just inserted is dropped.
pub struct SchemaCache {
    capacity: usize,
    entries: RwLock<HashMap<TypeId, Arc<Schema>>>,
    in_flight: Mutex<HashMap<TypeId, Arc<InFlight>>>,
    len: AtomicUsize,
    hits: AtomicU64,
    introspections: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA_CACHE_CAPACITY)
    }
}

impl SchemaCache {
    /// Create a cache holding at most `capacity` types (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            len: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            introspections: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Process-wide default instance.
    pub fn shared() -> Arc<SchemaCache> {
        static SHARED: OnceLock<Arc<SchemaCache>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(SchemaCache::default())))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains<T: Model>(&self) -> bool {
        self.lookup(TypeId::of::<T>()).is_some()
    }

    /// Drop every cached schema.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        self.len.store(0, Ordering::Release);
    }

    /// Schema for `T`, introspecting on first use.
    pub fn parse<T: Model>(&self) -> OrmResult<Arc<Schema>> {
        let key = TypeId::of::<T>();
        if let Some(schema) = self.lookup(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(schema);
        }

        let (flight, leader) = {
            let mut flights = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            // A leader may have finished between the lookup and taking the lock.
            if let Some(schema) = self.lookup(key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(schema);
            }
            match flights.get(&key) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(InFlight::default());
                    flights.insert(key, Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !leader {
            return flight.wait();
        }

        let outcome = self.introspect_guarded::<T>();
        if let Ok(schema) = &outcome {
            self.insert(key, Arc::clone(schema));
        }
        flight.complete(outcome.clone());
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);

        outcome
    }

    pub fn stats(&self) -> SchemaCacheStats {
        SchemaCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            introspections: self.introspections.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.len(),
            capacity: self.capacity,
        }
    }

    fn lookup(&self, key: TypeId) -> Option<Arc<Schema>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&key).cloned()
    }

    fn introspect_guarded<T: Model>(&self) -> Outcome {
        self.introspections.fetch_add(1, Ordering::Relaxed);
        let type_name = std::any::type_name::<T>();

        let result = match catch_unwind(AssertUnwindSafe(introspect::<T>)) {
            Ok(Ok(schema)) => Ok(Arc::new(schema)),
            Ok(Err(e @ OrmError::Introspection { .. })) => Err(e),
            Ok(Err(other)) => Err(OrmError::introspection(type_name, other.to_string())),
            Err(payload) => {
                let message = if let Some(s) = payload.downcast_ref::<&str>() {
                    format!("panic during introspection: {s}")
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    format!("panic during introspection: {s}")
                } else {
                    "panic during introspection".to_string()
                };
                Err(OrmError::introspection(type_name, message))
            }
        };

        match &result {
            Ok(schema) => tracing::debug!(
                target: "corm::schema",
                type_name = schema.type_name,
                table = %schema.table,
                fields = schema.fields.len(),
                "introspected model"
            ),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(target: "corm::schema", type_name, error = %e, "introspection failed");
            }
        }
        result
    }

    fn insert(&self, key: TypeId, schema: Arc<Schema>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, schema);
        if entries.len() > self.capacity {
            let dropped = entries.len() - 1;
            entries.retain(|k, _| *k == key);
            self.evictions.fetch_add(dropped as u64, Ordering::Relaxed);
            tracing::debug!(
                target: "corm::schema",
                dropped,
                capacity = self.capacity,
                "schema cache full, evicted all entries"
            );
        }
        self.len.store(entries.len(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::{Audit, BlogPost, Draft, User};
    use crate::schema::{FieldDecl, Shape};
    use crate::value::Value;
    use std::sync::Barrier;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn second_parse_is_a_hit() {
        let cache = SchemaCache::new(8);
        let a = cache.parse::<User>().unwrap();
        let b = cache.parse::<User>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let stats = cache.stats();
        assert_eq!(stats.introspections, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.size, 1);
        assert!(cache.contains::<User>());
    }

    #[test]
    fn caches_are_isolated() {
        let a = SchemaCache::new(8);
        let b = SchemaCache::new(8);
        a.parse::<User>().unwrap();
        assert!(!b.contains::<User>());
    }

    static SLOW_CALLS: AtomicUsize = AtomicUsize::new(0);

    struct Slow;

    impl Model for Slow {
        fn shape() -> Shape {
            SLOW_CALLS.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            Shape::new("Slow").field(FieldDecl::new("id", None, "i64"))
        }

        fn field_value(&self, _path: &[usize]) -> Option<Value> {
            None
        }
    }

    #[test]
    fn concurrent_first_parse_runs_once() {
        let cache = Arc::new(SchemaCache::new(8));
        let barrier = Arc::new(Barrier::new(16));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.parse::<Slow>().unwrap()
                })
            })
            .collect();
        let schemas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(SLOW_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().introspections, 1);
        for s in &schemas[1..] {
            assert!(Arc::ptr_eq(&schemas[0], s));
        }
    }

    static FLAKY_PANICKED: AtomicBool = AtomicBool::new(false);

    struct Flaky;

    impl Model for Flaky {
        fn shape() -> Shape {
            if !FLAKY_PANICKED.swap(true, Ordering::SeqCst) {
                panic!("malformed metadata");
            }
            Shape::new("Flaky").field(FieldDecl::new("id", None, "i64"))
        }

        fn field_value(&self, _path: &[usize]) -> Option<Value> {
            None
        }
    }

    #[test]
    fn panics_become_errors_and_are_not_cached() {
        let cache = SchemaCache::new(8);
        let err = cache.parse::<Flaky>().unwrap_err();
        match err {
            OrmError::Introspection { message, .. } => {
                assert!(message.contains("malformed metadata"), "{message}")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!cache.contains::<Flaky>());
        assert_eq!(cache.stats().failures, 1);

        let schema = cache.parse::<Flaky>().unwrap();
        assert_eq!(schema.table, "flaky");
        assert_eq!(cache.stats().introspections, 2);
    }

    #[test]
    fn wholesale_eviction_keeps_newest() {
        let cache = SchemaCache::new(2);
        cache.parse::<User>().unwrap();
        cache.parse::<Audit>().unwrap();
        assert_eq!(cache.len(), 2);

        cache.parse::<BlogPost>().unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains::<BlogPost>());
        assert!(!cache.contains::<User>());
        assert_eq!(cache.stats().evictions, 2);

        cache.parse::<Draft>().unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clear_resets_len() {
        let cache = SchemaCache::default();
        cache.parse::<User>().unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), DEFAULT_SCHEMA_CACHE_CAPACITY);
    }
}

//! Request counters.
//!
//! Clients and services count every call under
//! `<service>/<method>/{requests,success,failures}`, plus
//! `<service>/<method>/failures/<category>` for each failed call. Where
//! the numbers go is up to the [`StatsReceiver`]: [`InMemoryStatsReceiver`]
//! keeps them in a concurrent map (tests, the demo), [`NullStatsReceiver`]
//! drops them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// A monotonically increasing counter.
///
/// Clones share the same value, so a counter can be looked up once and
/// incremented from any task.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicU64>);

impl Counter {
    pub fn incr(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A sink for named counters.
pub trait StatsReceiver: Send + Sync + 'static {
    /// Returns the counter for a `/`-separated path, creating it if
    /// needed. Asking twice for the same path yields the same counter.
    fn counter(&self, path: &str) -> Counter;
}

/// Keeps every counter in memory.
#[derive(Debug, Default)]
pub struct InMemoryStatsReceiver {
    counters: DashMap<String, Counter>,
}

impl InMemoryStatsReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, or 0 if it was never created.
    pub fn get(&self, path: &str) -> u64 {
        self.counters.get(path).map_or(0, |c| c.get())
    }

    /// All counters, sorted by path.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().get()))
            .collect()
    }
}

impl StatsReceiver for InMemoryStatsReceiver {
    fn counter(&self, path: &str) -> Counter {
        if let Some(counter) = self.counters.get(path) {
            return counter.clone();
        }
        self.counters.entry(path.to_string()).or_default().clone()
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatsReceiver;

impl StatsReceiver for NullStatsReceiver {
    fn counter(&self, _path: &str) -> Counter {
        Counter::default()
    }
}

/// A receiver plus a path prefix.
#[derive(Clone)]
pub struct ScopedStats {
    receiver: Arc<dyn StatsReceiver>,
    prefix: String,
}

impl ScopedStats {
    pub fn new(receiver: Arc<dyn StatsReceiver>) -> Self {
        Self {
            receiver,
            prefix: String::new(),
        }
    }

    /// A child scope: counters below it get `name/` prepended.
    pub fn scope(&self, name: &str) -> Self {
        Self {
            receiver: Arc::clone(&self.receiver),
            prefix: self.path(name),
        }
    }

    pub fn counter(&self, name: &str) -> Counter {
        self.receiver.counter(&self.path(name))
    }

    fn path(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.prefix)
        }
    }
}

impl std::fmt::Debug for ScopedStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedStats")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// The counters of one method, looked up once when a client or service is
/// built.
#[derive(Debug, Clone)]
pub struct MethodStats {
    pub requests: Counter,
    pub success: Counter,
    pub failures: Counter,
    failure_scope: ScopedStats,
}

impl MethodStats {
    /// Counters under `<scope>/<method>/...`.
    pub fn new(scope: &ScopedStats, method: &str) -> Self {
        let method_scope = scope.scope(method);
        Self {
            requests: method_scope.counter("requests"),
            success: method_scope.counter("success"),
            failures: method_scope.counter("failures"),
            failure_scope: method_scope.scope("failures"),
        }
    }

    /// Records the end of a call: exactly one of `success`/`failures`,
    /// and the failure's category.
    pub fn record(&self, failure: Option<&str>) {
        match failure {
            None => self.success.incr(),
            Some(category) => {
                self.failures.incr();
                self.failure_scope.counter(category).incr();
            }
        }
    }
}

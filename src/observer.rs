//! Diagnostic observers for resolution and disposal events.
//!
//! Observers receive synchronous callbacks while the container resolves
//! services, tracks disposable instances and tears scopes down. They are the
//! hook for structured logging and metrics; keep implementations cheap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::provider::ScopeId;
use crate::Key;

/// Observer trait for container lifecycle events.
///
/// Only `resolving` and `resolved` are required; the lifecycle hooks default
/// to no-ops.
///
/// # Examples
///
/// ```
/// use ferrous_lifetime::{LifetimeObserver, ServiceCollection, Key, ScopeId};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct TracingObserver {
///     trace_id: String,
/// }
///
/// impl LifetimeObserver for TracingObserver {
///     fn resolving(&self, key: &Key) {
///         println!("[{}] Resolving: {}", self.trace_id, key);
///     }
///
///     fn resolved(&self, key: &Key, duration: Duration) {
///         println!("[{}] Resolved: {} in {:?}", self.trace_id, key, duration);
///     }
///
///     fn scope_disposed(&self, scope: ScopeId, disposed: usize, failures: usize, _duration: Duration) {
///         println!("[{}] Scope {} released {} ({} failed)", self.trace_id, scope, disposed, failures);
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_observer(Arc::new(TracingObserver { trace_id: "req-123".to_string() }));
/// let provider = services.build();
/// ```
pub trait LifetimeObserver: Send + Sync {
    /// Called before a factory runs for `key`.
    fn resolving(&self, key: &Key);

    /// Called after a factory for `key` returned, successfully or not.
    fn resolved(&self, key: &Key, duration: Duration);

    /// Called when a scope is opened below `parent` (`None` for the root).
    fn scope_created(&self, _scope: ScopeId, _parent: Option<ScopeId>) {}

    /// Called when an instance enters a scope's disposal registry.
    fn instance_tracked(&self, _scope: ScopeId, _service: &'static str, _position: usize) {}

    /// Called after one instance's disposal protocol returned.
    fn instance_disposed(&self, _scope: ScopeId, _service: &'static str, _duration: Duration, _failed: bool) {}

    /// Called once a scope's reverse walk has finished.
    fn scope_disposed(&self, _scope: ScopeId, _disposed: usize, _failures: usize, _duration: Duration) {}
}

/// Collection of observers shared by the provider and all of its scopes.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn LifetimeObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn LifetimeObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn resolving(&self, key: &Key) {
        for observer in &self.observers {
            observer.resolving(key);
        }
    }

    pub(crate) fn resolved(&self, key: &Key, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(key, duration);
        }
    }

    pub(crate) fn scope_created(&self, scope: ScopeId, parent: Option<ScopeId>) {
        for observer in &self.observers {
            observer.scope_created(scope, parent);
        }
    }

    pub(crate) fn instance_tracked(&self, scope: ScopeId, service: &'static str, position: usize) {
        for observer in &self.observers {
            observer.instance_tracked(scope, service, position);
        }
    }

    pub(crate) fn instance_disposed(&self, scope: ScopeId, service: &'static str, duration: Duration, failed: bool) {
        for observer in &self.observers {
            observer.instance_disposed(scope, service, duration, failed);
        }
    }

    pub(crate) fn scope_disposed(&self, scope: ScopeId, disposed: usize, failures: usize, duration: Duration) {
        for observer in &self.observers {
            observer.scope_disposed(scope, disposed, failures, duration);
        }
    }
}

/// Built-in observer that logs every event through `tracing`.
///
/// Events are emitted at `INFO`, failed disposals at `WARN`, each tagged
/// with the observer's prefix.
///
/// # Examples
///
/// ```
/// use ferrous_lifetime::{ServiceCollection, LoggingObserver};
/// use std::sync::Arc;
///
/// let mut services = ServiceCollection::new();
/// services.add_observer(Arc::new(LoggingObserver::new()));
/// let provider = services.build();
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    /// Creates a new logging observer with default prefix.
    pub fn new() -> Self {
        Self {
            prefix: "[ferrous-lifetime]".to_string(),
        }
    }

    /// Creates a new logging observer with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl LifetimeObserver for LoggingObserver {
    fn resolving(&self, key: &Key) {
        tracing::info!(observer = %self.prefix, key = %key, "resolving");
    }

    fn resolved(&self, key: &Key, duration: Duration) {
        tracing::info!(observer = %self.prefix, key = %key, ?duration, "resolved");
    }

    fn scope_created(&self, scope: ScopeId, parent: Option<ScopeId>) {
        match parent {
            Some(parent) => tracing::info!(observer = %self.prefix, scope = %scope, parent = %parent, "scope opened"),
            None => tracing::info!(observer = %self.prefix, scope = %scope, "root scope opened"),
        }
    }

    fn instance_tracked(&self, scope: ScopeId, service: &'static str, position: usize) {
        tracing::info!(observer = %self.prefix, scope = %scope, service, position, "tracking");
    }

    fn instance_disposed(&self, scope: ScopeId, service: &'static str, duration: Duration, failed: bool) {
        if failed {
            tracing::warn!(observer = %self.prefix, scope = %scope, service, ?duration, "dispose failed");
        } else {
            tracing::info!(observer = %self.prefix, scope = %scope, service, ?duration, "disposed");
        }
    }

    fn scope_disposed(&self, scope: ScopeId, disposed: usize, failures: usize, duration: Duration) {
        tracing::info!(
            observer = %self.prefix,
            scope = %scope,
            disposed,
            failures,
            ?duration,
            "scope disposed"
        );
    }
}

/// Observer that keeps running counters of container activity.
///
/// # Examples
///
/// ```
/// use ferrous_lifetime::{ServiceCollection, MetricsObserver, Resolver};
/// use std::sync::Arc;
///
/// let metrics = Arc::new(MetricsObserver::new());
/// let mut services = ServiceCollection::new();
/// services.add_observer(metrics.clone());
/// services.add_transient_factory::<u32, _>(|_| 7);
///
/// let provider = services.build();
/// let _ = provider.get_required::<u32>();
/// assert_eq!(metrics.resolution_count(), 1);
/// ```
pub struct MetricsObserver {
    resolutions: AtomicU64,
    total_resolution_nanos: AtomicU64,
    scopes_created: AtomicU64,
    tracked: AtomicU64,
    disposed: AtomicU64,
    failures: AtomicU64,
}

impl MetricsObserver {
    /// Creates a new metrics observer with all counters at zero.
    pub fn new() -> Self {
        Self {
            resolutions: AtomicU64::new(0),
            total_resolution_nanos: AtomicU64::new(0),
            scopes_created: AtomicU64::new(0),
            tracked: AtomicU64::new(0),
            disposed: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Number of resolutions observed.
    pub fn resolution_count(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Average resolution duration, if anything was resolved.
    pub fn average_resolution_time(&self) -> Option<Duration> {
        let count = self.resolution_count();
        if count == 0 {
            return None;
        }
        Some(Duration::from_nanos(self.total_resolution_nanos.load(Ordering::Relaxed) / count))
    }

    /// Number of scopes opened, the root included.
    pub fn scopes_created(&self) -> u64 {
        self.scopes_created.load(Ordering::Relaxed)
    }

    /// Number of instances that entered a disposal registry.
    pub fn tracked_count(&self) -> u64 {
        self.tracked.load(Ordering::Relaxed)
    }

    /// Number of instances released without error.
    pub fn disposed_count(&self) -> u64 {
        self.disposed.load(Ordering::Relaxed)
    }

    /// Number of instances whose disposal failed.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Instances tracked but not yet released.
    pub fn outstanding(&self) -> u64 {
        self.tracked_count()
            .saturating_sub(self.disposed_count() + self.failure_count())
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        self.resolutions.store(0, Ordering::Relaxed);
        self.total_resolution_nanos.store(0, Ordering::Relaxed);
        self.scopes_created.store(0, Ordering::Relaxed);
        self.tracked.store(0, Ordering::Relaxed);
        self.disposed.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
    }
}

impl Default for MetricsObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl LifetimeObserver for MetricsObserver {
    fn resolving(&self, _key: &Key) {}

    fn resolved(&self, _key: &Key, duration: Duration) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        self.total_resolution_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    fn scope_created(&self, _scope: ScopeId, _parent: Option<ScopeId>) {
        self.scopes_created.fetch_add(1, Ordering::Relaxed);
    }

    fn instance_tracked(&self, _scope: ScopeId, _service: &'static str, _position: usize) {
        self.tracked.fetch_add(1, Ordering::Relaxed);
    }

    fn instance_disposed(&self, _scope: ScopeId, _service: &'static str, _duration: Duration, failed: bool) {
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        } else {
            self.disposed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

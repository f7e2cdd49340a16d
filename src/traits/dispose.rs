//! Disposal traits and the capability bundle tracked by scopes.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DisposeResult;

/// Trait for synchronous resource disposal.
///
/// Implement this trait for services that need structured teardown (e.g., flushing caches,
/// closing connections). Tracked instances are released in reverse creation order when
/// their owning scope is disposed.
///
/// # Examples
///
/// ```
/// use ferrous_lifetime::{Dispose, DisposeResult, ServiceCollection, Resolver};
///
/// struct Cache {
///     name: String,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) -> DisposeResult {
///         println!("Flushing cache: {}", self.name);
///         Ok(())
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services
///     .add_scoped_factory::<Cache, _>(|_| Cache { name: "user_cache".to_string() })
///     .disposable();
///
/// let provider = services.build();
/// let scope = provider.create_scope().unwrap();
/// let _cache = scope.get_required::<Cache>();
/// scope.dispose().unwrap(); // prints "Flushing cache: user_cache"
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self) -> DisposeResult;
}

/// Trait for asynchronous resource disposal.
///
/// Implement this trait for services that require async teardown (e.g., graceful connection
/// shutdown, async I/O cleanup). The disposal walk awaits each instance before moving on to
/// the previously created one.
///
/// # Examples
///
/// ```
/// use ferrous_lifetime::{AsyncDispose, DisposeResult, ServiceCollection};
/// use async_trait::async_trait;
///
/// struct DatabaseClient {
///     connection_id: String,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for DatabaseClient {
///     async fn dispose_async(&self) -> DisposeResult {
///         println!("Closing database connection: {}", self.connection_id);
///         Ok(())
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services
///     .add_singleton_factory::<DatabaseClient, _>(|_| DatabaseClient {
///         connection_id: "conn_123".to_string(),
///     })
///     .async_disposable();
/// ```
#[async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose_async(&self) -> DisposeResult;
}

// Lets unsized instances (trait objects) be stored behind `dyn Dispose`.
struct Forward<T: ?Sized>(Arc<T>);

impl<T: ?Sized + Dispose> Dispose for Forward<T> {
    fn dispose(&self) -> DisposeResult {
        self.0.dispose()
    }
}

#[async_trait]
impl<T: ?Sized + AsyncDispose> AsyncDispose for Forward<T> {
    async fn dispose_async(&self) -> DisposeResult {
        self.0.dispose_async().await
    }
}

/// An instance together with the disposal protocols it exposes.
///
/// This is the unit a scope's registry tracks. Capabilities are checked
/// once, when the value is built, and disposal later dispatches on them
/// instead of on the instance's type.
///
/// # Examples
///
/// ```
/// use ferrous_lifetime::{Disposable, Dispose, DisposeResult};
/// use std::sync::Arc;
///
/// struct Handle;
/// impl Dispose for Handle {
///     fn dispose(&self) -> DisposeResult { Ok(()) }
/// }
///
/// let d = Disposable::sync(Arc::new(Handle));
/// assert!(d.supports_sync());
/// assert!(!d.supports_async());
/// ```
#[derive(Clone)]
pub struct Disposable {
    identity: usize,
    service: &'static str,
    sync: Option<Arc<dyn Dispose>>,
    asynchronous: Option<Arc<dyn AsyncDispose>>,
}

impl Disposable {
    /// Wraps an instance exposing only the synchronous protocol.
    pub fn sync<T: ?Sized + Dispose>(instance: Arc<T>) -> Self {
        Self {
            identity: identity_of(&instance),
            service: type_name::<T>(),
            sync: Some(Arc::new(Forward(instance))),
            asynchronous: None,
        }
    }

    /// Wraps an instance exposing only the asynchronous protocol.
    pub fn asynchronous<T: ?Sized + AsyncDispose>(instance: Arc<T>) -> Self {
        Self {
            identity: identity_of(&instance),
            service: type_name::<T>(),
            sync: None,
            asynchronous: Some(Arc::new(Forward(instance))),
        }
    }

    /// Wraps an instance exposing both protocols.
    pub fn dual<T: ?Sized + Dispose + AsyncDispose>(instance: Arc<T>) -> Self {
        Self {
            identity: identity_of(&instance),
            service: type_name::<T>(),
            sync: Some(Arc::new(Forward(instance.clone()))),
            asynchronous: Some(Arc::new(Forward(instance))),
        }
    }

    /// Overrides the service name reported in failures and observer events.
    pub fn named(mut self, service: &'static str) -> Self {
        self.service = service;
        self
    }

    /// Returns `true` if the instance can be released synchronously.
    pub fn supports_sync(&self) -> bool {
        self.sync.is_some()
    }

    /// Returns `true` if the instance can be released asynchronously.
    pub fn supports_async(&self) -> bool {
        self.asynchronous.is_some()
    }

    /// Service name used in failures and observer events.
    pub fn service(&self) -> &'static str {
        self.service
    }

    pub(crate) fn identity(&self) -> usize {
        self.identity
    }

    /// Combines the protocols of two views of the same instance.
    pub(crate) fn merge(mut self, other: Disposable) -> Self {
        debug_assert_eq!(self.identity, other.identity);
        if self.sync.is_none() {
            self.sync = other.sync;
        }
        if self.asynchronous.is_none() {
            self.asynchronous = other.asynchronous;
        }
        self
    }

    pub(crate) fn sync_protocol(&self) -> Option<&Arc<dyn Dispose>> {
        self.sync.as_ref()
    }

    pub(crate) fn async_protocol(&self) -> Option<&Arc<dyn AsyncDispose>> {
        self.asynchronous.as_ref()
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("service", &self.service)
            .field("sync", &self.supports_sync())
            .field("async", &self.supports_async())
            .finish()
    }
}

fn identity_of<T: ?Sized>(instance: &Arc<T>) -> usize {
    Arc::as_ptr(instance) as *const () as usize
}

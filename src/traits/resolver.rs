//! Resolver traits for service resolution.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::registration::AnyArc;
use crate::traits::{AsyncDispose, Disposable, Dispose};

/// Core resolver trait for object-safe service resolution.
///
/// Implemented by [`ServiceProvider`](crate::ServiceProvider),
/// [`Scope`](crate::Scope) and the [`ResolverContext`](crate::ResolverContext)
/// handed to factories. Most users should use [`Resolver`] instead, which
/// adds typed methods on top of this trait.
pub trait ResolverCore: Send + Sync {
    /// Resolves a service by key, applying its lifetime policy.
    ///
    /// # Returns
    ///
    /// * `Ok(AnyArc)` - The resolved service wrapped in `Arc<dyn Any>`
    /// * `Err(DiError)` - Not found, no active scope, scope disposed, circular
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc>;

    /// Adds an instance to the disposal registry of the scope behind this
    /// resolver.
    ///
    /// Returns `Ok(false)` when the same instance is already tracked there.
    fn track(&self, disposable: Disposable) -> DiResult<bool>;
}

/// High-level resolver interface with generic methods for type-safe service resolution.
///
/// # Examples
///
/// ```
/// use ferrous_lifetime::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str);
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) {
///         println!("LOG: {}", msg);
///     }
/// }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton(42usize);
/// collection.add_singleton_trait(Arc::new(ConsoleLogger) as Arc<dyn Logger>);
///
/// let provider = collection.build();
///
/// let number = provider.get_required::<usize>();
/// assert_eq!(*number, 42);
///
/// let logger = provider.get_required_trait::<dyn Logger>();
/// logger.log("Service resolved successfully");
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete service type.
    ///
    /// ```
    /// use ferrous_lifetime::{ServiceCollection, Resolver};
    ///
    /// let mut collection = ServiceCollection::new();
    /// collection.add_singleton("configuration".to_string());
    ///
    /// let provider = collection.build();
    /// let config = provider.get::<String>().unwrap();
    /// assert_eq!(&*config, "configuration");
    /// ```
    fn get<T: 'static + Send + Sync>(&self) -> DiResult<Arc<T>> {
        downcast_concrete(self.resolve_any(&Key::of::<T>(None))?)
    }

    /// Resolves a named concrete service type.
    fn get_named<T: 'static + Send + Sync>(&self, name: &'static str) -> DiResult<Arc<T>> {
        downcast_concrete(self.resolve_any(&Key::of::<T>(Some(name)))?)
    }

    /// Resolves a trait object registered through one of the `*_trait`
    /// registration methods.
    fn get_trait<T: ?Sized + 'static + Send + Sync>(&self) -> DiResult<Arc<T>> {
        downcast_trait(self.resolve_any(&Key::of::<T>(None))?)
    }

    /// Resolves a named trait object.
    fn get_named_trait<T: ?Sized + 'static + Send + Sync>(&self, name: &'static str) -> DiResult<Arc<T>> {
        downcast_trait(self.resolve_any(&Key::of::<T>(Some(name)))?)
    }

    /// Resolves a concrete service type, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if the service cannot be resolved.
    fn get_required<T: 'static + Send + Sync>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {:?}", std::any::type_name::<T>(), e))
    }

    /// Resolves a named concrete service type, panicking on failure.
    fn get_named_required<T: 'static + Send + Sync>(&self, name: &'static str) -> Arc<T> {
        self.get_named::<T>(name).unwrap_or_else(|e| {
            panic!("Failed to resolve named {} ({}): {:?}", std::any::type_name::<T>(), name, e)
        })
    }

    /// Resolves a trait object, panicking on failure.
    fn get_required_trait<T: ?Sized + 'static + Send + Sync>(&self) -> Arc<T> {
        self.get_trait::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve trait {}: {:?}", std::any::type_name::<T>(), e))
    }

    /// Resolves a named trait object, panicking on failure.
    fn get_named_trait_required<T: ?Sized + 'static + Send + Sync>(&self, name: &'static str) -> Arc<T> {
        self.get_named_trait::<T>(name).unwrap_or_else(|e| {
            panic!("Failed to resolve named trait {} ({}): {:?}", std::any::type_name::<T>(), name, e)
        })
    }

    /// Tracks an instance for synchronous disposal with the scope behind
    /// this resolver.
    ///
    /// Useful from factories that create helper objects the container does
    /// not otherwise see. Tracked instances are disposed in reverse order of
    /// tracking, interleaved with the instances the container created.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_lifetime::{Dispose, DisposeResult, ServiceCollection, Resolver};
    /// use std::sync::Arc;
    ///
    /// struct Pool;
    /// impl Dispose for Pool {
    ///     fn dispose(&self) -> DisposeResult { Ok(()) }
    /// }
    ///
    /// struct Repository { _pool: Arc<Pool> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_factory::<Repository, _>(|resolver| {
    ///     let pool = Arc::new(Pool);
    ///     resolver.register_disposer(pool.clone()).unwrap();
    ///     Repository { _pool: pool }
    /// });
    ///
    /// let provider = services.build();
    /// let scope = provider.create_scope().unwrap();
    /// scope.get_required::<Repository>();
    /// assert_eq!(scope.tracked_count(), 1);
    /// ```
    fn register_disposer<T: ?Sized + Dispose>(&self, service: Arc<T>) -> DiResult<bool> {
        self.track(Disposable::sync(service))
    }

    /// Tracks an instance for asynchronous disposal with the scope behind
    /// this resolver.
    fn register_async_disposer<T: ?Sized + AsyncDispose>(&self, service: Arc<T>) -> DiResult<bool> {
        self.track(Disposable::asynchronous(service))
    }
}

fn downcast_concrete<T: 'static + Send + Sync>(any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}

// Trait objects are stored as Arc<Arc<dyn Trait>>
fn downcast_trait<T: ?Sized + 'static + Send + Sync>(any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast::<Arc<T>>()
        .map(|boxed| (*boxed).clone())
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}

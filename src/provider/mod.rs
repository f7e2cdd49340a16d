//! Service provider module.
//!
//! This module contains the ServiceProvider type: the container that owns
//! the registration table and the root scope.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::collection::ServiceCollection;
use crate::config::ContainerOptions;
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::observer::Observers;
use crate::registration::{AnyArc, Registration, Registry};
use crate::traits::{Disposable, Resolver, ResolverCore};

pub mod context;
pub mod scope;

pub use context::ResolverContext;
pub use scope::{Scope, ScopeCompletion, ScopeGuard, ScopeId};
use scope::ScopeNode;

/// The lifetime container.
///
/// Owns the registration table and the root scope. Singletons are cached
/// and tracked in the root scope; scoped and per-resolution services need
/// a scope created with [`create_scope`](Self::create_scope).
///
/// Disposing the provider drains every still-open scope, most recently
/// created first, then releases the singletons in reverse creation order.
///
/// # Thread Safety
///
/// ServiceProvider is `Send + Sync` and cheap to clone; clones share the
/// same container.
///
/// # Examples
///
/// ```
/// use ferrous_lifetime::{Dispose, DisposeResult, ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// impl Dispose for Database {
///     fn dispose(&self) -> DisposeResult { Ok(()) }
/// }
///
/// struct UserService { db: Arc<Database> }
///
/// let mut collection = ServiceCollection::new();
/// collection
///     .add_singleton(Database { url: "postgres://localhost".to_string() })
///     .disposable();
/// collection.add_transient_factory::<UserService, _>(|resolver| {
///     UserService { db: resolver.get_required::<Database>() }
/// });
///
/// let provider = collection.build();
/// let user_service = provider.get_required::<UserService>();
/// assert_eq!(user_service.db.url, "postgres://localhost");
/// provider.dispose().unwrap();
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

pub(crate) struct ProviderInner {
    pub(crate) registry: RwLock<Registry>,
    pub(crate) observers: Observers,
    pub(crate) options: ContainerOptions,
    pub(crate) root: Arc<ScopeNode>,
    next_scope_id: AtomicU64,
}

impl ProviderInner {
    #[inline]
    pub(crate) fn registration(&self, key: &Key) -> Option<Arc<Registration>> {
        self.registry.read().get(key)
    }

    pub(crate) fn next_scope_id(&self) -> ScopeId {
        ScopeId::new(self.next_scope_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl ServiceProvider {
    pub(crate) fn new(registry: Registry, observers: Observers, options: ContainerOptions) -> Self {
        let root = Arc::new(ScopeNode::root(options.warn_on_undisposed_drop));
        observers.scope_created(ScopeId::ROOT, None);
        tracing::debug!(
            container = options.display_label(),
            registrations = registry.len(),
            "container built"
        );
        Self {
            inner: Arc::new(ProviderInner {
                registry: RwLock::new(registry),
                observers,
                options,
                root,
                next_scope_id: AtomicU64::new(1),
            }),
        }
    }

    /// Handle to the root scope.
    pub fn root(&self) -> Scope {
        Scope::root_of(&self.inner)
    }

    /// Creates a scope directly below the root.
    ///
    /// # Errors
    ///
    /// `ScopeDisposed` once the container is disposed, `ScopeDepthExceeded`
    /// if the depth limit is zero.
    pub fn create_scope(&self) -> DiResult<Scope> {
        self.root().begin_child_scope()
    }

    /// Alias of [`create_scope`](Self::create_scope).
    pub fn begin_scope(&self) -> DiResult<Scope> {
        self.create_scope()
    }

    /// Creates a scope below the root that disposes itself when dropped.
    pub fn scope_guard(&self) -> DiResult<ScopeGuard> {
        self.create_scope().map(ScopeGuard::new)
    }

    /// Adds or replaces registrations on a live container.
    ///
    /// Instances already created from a replaced registration stay cached
    /// and tracked where they are; only later resolutions use the new one.
    /// Observers and options set on the temporary collection are ignored.
    ///
    /// ```
    /// use ferrous_lifetime::{ServiceCollection, Resolver};
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(1u32);
    /// let provider = services.build();
    /// let old = provider.get_required::<u32>();
    ///
    /// provider.register(|services| {
    ///     services.add_singleton(2u32);
    /// }).unwrap();
    ///
    /// assert_eq!(*old, 1);
    /// assert_eq!(*provider.get_required::<u32>(), 2);
    /// ```
    ///
    /// # Errors
    ///
    /// `ScopeDisposed` once disposal of the container has begun.
    pub fn register<F>(&self, configure: F) -> DiResult<()>
    where
        F: FnOnce(&mut ServiceCollection),
    {
        if !self.inner.root.is_active() {
            return Err(DiError::ScopeDisposed(ScopeId::ROOT));
        }
        let mut services = ServiceCollection::new();
        configure(&mut services);
        let mut registry = self.inner.registry.write();
        for registration in services.into_registrations() {
            if let Some(previous) = registry.insert(Arc::new(registration)) {
                tracing::debug!(key = %previous.key, "registration replaced");
            }
        }
        Ok(())
    }

    /// Returns `true` if a registration exists for `key`.
    pub fn is_registered(&self, key: &Key) -> bool {
        self.inner.registry.read().contains_key(key)
    }

    /// Descriptors of the current registrations.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.inner
            .registry
            .read()
            .iter()
            .map(|registration| ServiceDescriptor::of(registration))
            .collect()
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    /// Returns `true` once the container has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.root().is_disposed()
    }

    /// Registers a handler called once the container has finished disposing.
    pub fn on_completed<F>(&self, handler: F) -> DiResult<()>
    where
        F: FnOnce(&ScopeCompletion) + Send + 'static,
    {
        self.root().on_completed(handler)
    }

    /// Disposes every open scope, then the singletons, synchronously.
    ///
    /// See [`Scope::dispose`].
    pub fn dispose(&self) -> DiResult<()> {
        self.root().dispose()
    }

    /// Disposes every open scope, then the singletons, awaiting
    /// asynchronous disposals one at a time.
    ///
    /// See [`Scope::dispose_async`].
    pub async fn dispose_async(&self) -> DiResult<()> {
        self.root().dispose_async().await
    }

    /// Dumps the registrations and the tree of open scopes.
    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let mut s = String::new();
        s.push_str("=== Service Provider Debug ===\n");
        s.push_str("Registrations:\n");
        for registration in self.inner.registry.read().iter() {
            s.push_str(&format!("  {}: {:?}\n", registration.key, registration.lifetime));
        }
        s.push_str("Scopes:\n");
        self.inner.root.describe(&mut s);
        s
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.root().resolve_any(key)
    }

    fn track(&self, disposable: Disposable) -> DiResult<bool> {
        self.root().track(disposable)
    }
}

impl Resolver for ServiceProvider {}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("label", &self.inner.options.label)
            .field("registrations", &self.inner.registry.read().len())
            .field("root", &self.root())
            .finish()
    }
}

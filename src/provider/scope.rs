//! Scopes: lifetime boundaries with their own cache and disposal registry.
//!
//! Scopes form a tree rooted at the container's root scope. Every scope
//! caches its scoped instances, tracks the disposable instances it owns in
//! creation order, and holds its still-open children so that disposing a
//! scope drains them first.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::sync::{Arc, Weak};
use std::time::Instant;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::{ProviderInner, ResolverContext};
use crate::disposal::Walk;
use crate::error::{DiError, DiResult, DisposeFailure};
use crate::internal::{BagPush, BoxFuture, DisposeBag, ResolutionFrame};
use crate::key::Key;
use crate::observer::Observers;
use crate::registration::{AnyArc, Registration};
use crate::traits::{Disposable, Resolver, ResolverCore};

/// Identifier of a scope, unique within its container.
///
/// The root scope is always [`ScopeId::ROOT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// The container's root scope.
    pub const ROOT: ScopeId = ScopeId(0);

    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("root")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeState {
    Active,
    Disposing,
    Disposed,
}

/// Summary passed to completion handlers once a scope has finished
/// disposing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeCompletion {
    scope: ScopeId,
    disposed: usize,
    failures: usize,
}

impl ScopeCompletion {
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Instances of this scope released without error.
    pub fn disposed(&self) -> usize {
        self.disposed
    }

    /// Instances of this scope whose disposal failed.
    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

type CompletionHandler = Box<dyn FnOnce(&ScopeCompletion) + Send>;

/// Shared state of one scope. Handles ([`Scope`]) point at a node; the
/// parent holds its open children strongly.
pub(crate) struct ScopeNode {
    id: ScopeId,
    depth: usize,
    parent_id: Option<ScopeId>,
    parent: Option<Weak<ScopeNode>>,
    state: Mutex<ScopeState>,
    bag: Mutex<DisposeBag>,
    slots: Mutex<HashMap<u64, Arc<OnceCell<AnyArc>>>>,
    children: Mutex<Vec<Arc<ScopeNode>>>,
    completion: Mutex<Vec<CompletionHandler>>,
    warn_undisposed: bool,
}

impl ScopeNode {
    pub(crate) fn root(warn_undisposed: bool) -> Self {
        Self::new(ScopeId::ROOT, 0, None, warn_undisposed)
    }

    fn new(id: ScopeId, depth: usize, parent: Option<&Arc<ScopeNode>>, warn_undisposed: bool) -> Self {
        Self {
            id,
            depth,
            parent_id: parent.map(|p| p.id),
            parent: parent.map(Arc::downgrade),
            state: Mutex::new(ScopeState::Active),
            bag: Mutex::new(DisposeBag::default()),
            slots: Mutex::new(HashMap::new()),
            children: Mutex::new(Vec::new()),
            completion: Mutex::new(Vec::new()),
            warn_undisposed,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        *self.state.lock() == ScopeState::Active
    }

    /// Moves the node to `Disposing` and takes everything the teardown
    /// needs. `None` if another caller got there first.
    fn begin_disposal(&self) -> Option<(Vec<Arc<ScopeNode>>, Vec<Disposable>)> {
        let mut state = self.state.lock();
        if *state != ScopeState::Active {
            return None;
        }
        *state = ScopeState::Disposing;
        let children = std::mem::take(&mut *self.children.lock());
        let entries = self.bag.lock().freeze();
        Some((children, entries))
    }

    fn finish(&self, disposed: usize, failures: usize, started: Instant, observers: &Observers) {
        *self.state.lock() = ScopeState::Disposed;
        let slots = std::mem::take(&mut *self.slots.lock());
        drop(slots);

        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            parent
                .children
                .lock()
                .retain(|child| !std::ptr::eq(Arc::as_ptr(child), self));
        }

        let elapsed = started.elapsed();
        observers.scope_disposed(self.id, disposed, failures, elapsed);
        tracing::debug!(scope = %self.id, disposed, failures, ?elapsed, "scope disposed");

        let completion = ScopeCompletion {
            scope: self.id,
            disposed,
            failures,
        };
        let handlers = std::mem::take(&mut *self.completion.lock());
        for handler in handlers {
            handler(&completion);
        }
    }

    fn drain_sync(&self, observers: &Observers) -> Vec<DisposeFailure> {
        match Teardown::begin(self, observers) {
            Some(teardown) => teardown.run_sync(),
            None => Vec::new(),
        }
    }

    fn drain_async<'a>(&'a self, observers: &'a Observers) -> BoxFuture<'a, Vec<DisposeFailure>> {
        Box::pin(async move {
            match Teardown::begin(self, observers) {
                Some(teardown) => teardown.run_async().await,
                None => Vec::new(),
            }
        })
    }
}

#[cfg(feature = "diagnostics")]
impl ScopeNode {
    /// Appends one line per open scope, children indented below parents.
    pub(crate) fn describe(&self, out: &mut String) {
        use std::fmt::Write;

        let indent = "  ".repeat(self.depth + 1);
        let _ = writeln!(
            out,
            "{}scope {}: {:?}, {} tracked, {} cached",
            indent,
            self.id,
            *self.state.lock(),
            self.bag.lock().len(),
            self.slots.lock().len()
        );
        let children = self.children.lock().clone();
        for child in children {
            child.describe(out);
        }
    }
}

impl Drop for ScopeNode {
    fn drop(&mut self) {
        if !self.warn_undisposed || *self.state.get_mut() != ScopeState::Active {
            return;
        }
        let bag = self.bag.get_mut();
        if !bag.is_empty() {
            let undisposed = bag.len();
            tracing::warn!(
                scope = %self.id,
                undisposed,
                "scope dropped with undisposed instances; call dispose() or dispose_async() first"
            );
        }
    }
}

/// One scope's teardown in progress.
///
/// Disposal is not cancellable: if an asynchronous teardown is dropped
/// before it completes, the remaining children and instances are released
/// synchronously and the scope still reaches its disposed state.
struct Teardown<'a> {
    node: &'a ScopeNode,
    observers: &'a Observers,
    children: Vec<Arc<ScopeNode>>,
    walk: Walk,
    child_failures: Vec<DisposeFailure>,
    started: Instant,
    finished: bool,
}

impl<'a> Teardown<'a> {
    fn begin(node: &'a ScopeNode, observers: &'a Observers) -> Option<Self> {
        let (children, entries) = node.begin_disposal()?;
        tracing::debug!(scope = %node.id, children = children.len(), instances = entries.len(), "disposing scope");
        Some(Self {
            node,
            observers,
            children,
            walk: Walk::new(node.id, entries),
            child_failures: Vec::new(),
            started: Instant::now(),
            finished: false,
        })
    }

    fn run_sync(mut self) -> Vec<DisposeFailure> {
        // Most recently created child first
        while let Some(child) = self.children.pop() {
            let failures = child.drain_sync(self.observers);
            self.child_failures.extend(failures);
        }
        self.walk.run_sync(self.observers);
        self.complete()
    }

    async fn run_async(mut self) -> Vec<DisposeFailure> {
        while let Some(child) = self.children.pop() {
            let failures = child.drain_async(self.observers).await;
            self.child_failures.extend(failures);
        }
        self.walk.run_async(self.observers).await;
        self.complete()
    }

    fn complete(&mut self) -> Vec<DisposeFailure> {
        self.finished = true;
        let outcome = self.walk.take_outcome();
        self.node
            .finish(outcome.disposed, outcome.failures.len(), self.started, self.observers);
        let mut failures = std::mem::take(&mut self.child_failures);
        failures.extend(outcome.failures);
        failures
    }
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!(
            scope = %self.node.id,
            children = self.children.len(),
            instances = self.walk.remaining(),
            "scope disposal interrupted; releasing the rest synchronously"
        );
        while let Some(child) = self.children.pop() {
            child.drain_sync(self.observers);
        }
        self.walk.run_sync(self.observers);
        self.complete();
    }
}

/// Handle to a lifetime scope.
///
/// A scope caches scoped services, tracks the disposable instances it
/// created and disposes them in reverse creation order. Singletons are
/// always resolved against the root scope, so they are shared across all
/// scopes and cannot capture scoped dependencies.
///
/// Handles are cheap to clone; every clone refers to the same scope.
///
/// # Examples
///
/// ```
/// use ferrous_lifetime::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct DatabaseConnection(String);
///
/// let mut collection = ServiceCollection::new();
/// collection.add_scoped_factory::<DatabaseConnection, _>(|_| {
///     DatabaseConnection("connection-123".to_string())
/// });
///
/// let provider = collection.build();
/// let scope = provider.create_scope().unwrap();
///
/// let a = scope.get_required::<DatabaseConnection>();
/// let b = scope.get_required::<DatabaseConnection>();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// scope.dispose().unwrap();
/// assert!(scope.get::<DatabaseConnection>().is_err());
/// ```
#[derive(Clone)]
pub struct Scope {
    provider: Arc<ProviderInner>,
    node: Arc<ScopeNode>,
}

impl Scope {
    pub(crate) fn root_of(provider: &Arc<ProviderInner>) -> Self {
        Self {
            provider: provider.clone(),
            node: provider.root.clone(),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.node.id
    }

    /// Id of the scope this one was created from, `None` for the root.
    pub fn parent_id(&self) -> Option<ScopeId> {
        self.node.parent_id
    }

    /// Nesting depth; the root scope is at depth 0.
    pub fn depth(&self) -> usize {
        self.node.depth
    }

    pub fn is_root(&self) -> bool {
        self.node.id.is_root()
    }

    /// Returns `true` once disposal has finished.
    pub fn is_disposed(&self) -> bool {
        *self.node.state.lock() == ScopeState::Disposed
    }

    /// Number of instances currently awaiting disposal in this scope.
    pub fn tracked_count(&self) -> usize {
        self.node.bag.lock().len()
    }

    /// Number of child scopes that are still open.
    pub fn open_children(&self) -> usize {
        self.node.children.lock().len()
    }

    /// Creates a nested scope.
    ///
    /// The child is disposed with this scope if it is still open by then.
    ///
    /// # Errors
    ///
    /// * `ScopeDisposed` if this scope is disposing or disposed
    /// * `ScopeDepthExceeded` if the container's depth limit would be passed
    pub fn begin_child_scope(&self) -> DiResult<Scope> {
        let state = self.node.state.lock();
        if *state != ScopeState::Active {
            return Err(DiError::ScopeDisposed(self.node.id));
        }
        let depth = self.node.depth + 1;
        if let Some(max) = self.provider.options.max_scope_depth {
            if depth > max {
                return Err(DiError::ScopeDepthExceeded(max));
            }
        }
        let id = self.provider.next_scope_id();
        let child = Arc::new(ScopeNode::new(
            id,
            depth,
            Some(&self.node),
            self.provider.options.warn_on_undisposed_drop,
        ));
        self.node.children.lock().push(child.clone());
        drop(state);

        self.provider.observers.scope_created(id, Some(self.node.id));
        tracing::debug!(
            container = self.provider.options.display_label(),
            scope = %id,
            parent = %self.node.id,
            depth,
            "scope created"
        );
        Ok(Scope {
            provider: self.provider.clone(),
            node: child,
        })
    }

    /// Creates a nested scope wrapped in a guard that disposes it on drop.
    pub fn child_guard(&self) -> DiResult<ScopeGuard> {
        self.begin_child_scope().map(ScopeGuard::new)
    }

    /// Adds an instance to this scope's disposal registry.
    ///
    /// Returns `Ok(false)` if the same instance is already tracked here.
    ///
    /// # Errors
    ///
    /// `ScopeDisposed` once disposal of this scope has begun.
    pub fn track(&self, disposable: Disposable) -> DiResult<bool> {
        let service = disposable.service();
        let pushed = self.node.bag.lock().push(disposable);
        match pushed {
            BagPush::Appended(position) => {
                self.provider
                    .observers
                    .instance_tracked(self.node.id, service, position);
                Ok(true)
            }
            BagPush::Duplicate => Ok(false),
            BagPush::Frozen => Err(DiError::ScopeDisposed(self.node.id)),
        }
    }

    /// Registers a handler called once this scope has finished disposing.
    ///
    /// Handlers run synchronously, in registration order, exactly once,
    /// after the reverse walk over the scope's instances completes. They
    /// also run when some instances failed to dispose; the
    /// [`ScopeCompletion`] reports the counts.
    ///
    /// ```
    /// use ferrous_lifetime::ServiceCollection;
    /// use std::sync::atomic::{AtomicBool, Ordering};
    /// use std::sync::Arc;
    ///
    /// let provider = ServiceCollection::new().build();
    /// let scope = provider.create_scope().unwrap();
    /// let completed = Arc::new(AtomicBool::new(false));
    /// let flag = completed.clone();
    /// scope.on_completed(move |_| flag.store(true, Ordering::SeqCst)).unwrap();
    ///
    /// scope.dispose().unwrap();
    /// assert!(completed.load(Ordering::SeqCst));
    /// ```
    ///
    /// # Errors
    ///
    /// `ScopeDisposed` if disposal has already begun.
    pub fn on_completed<F>(&self, handler: F) -> DiResult<()>
    where
        F: FnOnce(&ScopeCompletion) + Send + 'static,
    {
        let state = self.node.state.lock();
        if *state != ScopeState::Active {
            return Err(DiError::ScopeDisposed(self.node.id));
        }
        self.node.completion.lock().push(Box::new(handler));
        Ok(())
    }

    /// Disposes open child scopes, then this scope's instances in reverse
    /// creation order, using their synchronous protocol.
    ///
    /// Instances that only support asynchronous disposal are reported as
    /// [`RequiresAsyncDisposal`](crate::RequiresAsyncDisposal) failures.
    /// Calling this again, or while another call is in flight, is a no-op
    /// returning `Ok(())`.
    ///
    /// # Errors
    ///
    /// `Disposal` for a single failed instance, `Aggregate` for several.
    pub fn dispose(&self) -> DiResult<()> {
        DiError::from_failures(self.node.drain_sync(&self.provider.observers))
    }

    /// Asynchronous counterpart of [`dispose`](Self::dispose), preferring
    /// each instance's asynchronous protocol.
    ///
    /// Each asynchronous disposal is awaited before the previous instance
    /// is touched. If this future is dropped part-way, the remaining
    /// instances are released synchronously.
    pub async fn dispose_async(&self) -> DiResult<()> {
        DiError::from_failures(self.node.drain_async(&self.provider.observers).await)
    }

    /// Runs an async block with this scope, then disposes the scope.
    ///
    /// An error from the block wins over a disposal error; otherwise the
    /// disposal error is returned.
    ///
    /// ```
    /// use ferrous_lifetime::{AsyncDispose, DisposeResult, DiError, ServiceCollection, Resolver};
    /// use async_trait::async_trait;
    ///
    /// struct ApiClient;
    ///
    /// #[async_trait]
    /// impl AsyncDispose for ApiClient {
    ///     async fn dispose_async(&self) -> DisposeResult {
    ///         Ok(())
    ///     }
    /// }
    ///
    /// # async fn example() -> Result<(), DiError> {
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_factory::<ApiClient, _>(|_| ApiClient).async_disposable();
    ///
    /// let provider = services.build();
    /// let scope = provider.create_scope()?;
    ///
    /// let answer = scope
    ///     .using(|scope| async move {
    ///         let _client = scope.get::<ApiClient>()?;
    ///         Ok::<_, DiError>(42)
    ///     })
    ///     .await?;
    ///
    /// assert_eq!(answer, 42);
    /// assert!(scope.is_disposed());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn using<F, Fut, R, E>(&self, block: F) -> Result<R, E>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<DiError>,
    {
        let result = block(self.clone()).await;
        let disposed = self.dispose_async().await;
        merge_block_result(result, disposed)
    }

    /// Synchronous counterpart of [`using`](Self::using).
    pub fn using_sync<F, R, E>(&self, block: F) -> Result<R, E>
    where
        F: FnOnce(&Scope) -> Result<R, E>,
        E: From<DiError>,
    {
        let result = block(self);
        let disposed = self.dispose();
        merge_block_result(result, disposed)
    }

    fn root(&self) -> Scope {
        Scope::root_of(&self.provider)
    }

    fn ensure_active(&self) -> DiResult<()> {
        if self.node.is_active() {
            Ok(())
        } else {
            Err(DiError::ScopeDisposed(self.node.id))
        }
    }

    /// Resolves `registration` against this scope as the owner.
    fn resolve_owned(&self, registration: &Registration) -> DiResult<AnyArc> {
        if !registration.lifetime.is_cached() {
            return self.create(registration);
        }
        self.ensure_active()?;
        let slot = self
            .node
            .slots
            .lock()
            .entry(registration.id)
            .or_default()
            .clone();
        slot.get_or_try_init(|| self.create(registration)).cloned()
    }

    /// Constructs a new instance and tracks it here if its lifetime asks
    /// for tracking.
    fn create(&self, registration: &Registration) -> DiResult<AnyArc> {
        self.ensure_active()?;
        let context = ResolverContext::new(self);
        let instance = (registration.ctor)(&context)?;
        if registration.lifetime.is_tracked() {
            if let Some(disposable) = registration.disposable(&instance) {
                if let Err(error) = self.track(disposable.clone()) {
                    // Disposal began while the factory ran; nobody else will release it
                    release_orphan(self.node.id, &disposable);
                    return Err(error);
                }
            }
        }
        Ok(instance)
    }

    fn resolve_key(&self, key: &Key) -> DiResult<AnyArc> {
        let registration = self
            .provider
            .registration(key)
            .ok_or(DiError::NotFound(key.display_name()))?;
        let _frame = ResolutionFrame::enter(key)?;

        let lifetime = registration.lifetime;
        if lifetime.binds_to_root() {
            return self.root().resolve_owned(&registration);
        }
        if lifetime.requires_scope() && self.is_root() {
            return Err(DiError::NoActiveScope(key.display_name()));
        }
        self.resolve_owned(&registration)
    }
}

fn release_orphan(scope: ScopeId, orphan: &Disposable) {
    match orphan.sync_protocol() {
        Some(protocol) => {
            if let Err(error) = protocol.dispose() {
                tracing::warn!(
                    scope = %scope,
                    service = orphan.service(),
                    error = %error,
                    "disposal of instance built during scope teardown failed"
                );
            }
        }
        None => tracing::warn!(
            scope = %scope,
            service = orphan.service(),
            "instance built during scope teardown only supports asynchronous disposal; it was not released"
        ),
    }
}

fn merge_block_result<R, E: From<DiError>>(result: Result<R, E>, disposed: DiResult<()>) -> Result<R, E> {
    match (result, disposed) {
        (Err(error), _) => Err(error),
        (Ok(_), Err(error)) => Err(error.into()),
        (Ok(value), Ok(())) => Ok(value),
    }
}

impl ResolverCore for Scope {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        let observers = &self.provider.observers;
        if !observers.has_observers() {
            return self.resolve_key(key);
        }
        observers.resolving(key);
        let started = Instant::now();
        let result = self.resolve_key(key);
        observers.resolved(key, started.elapsed());
        result
    }

    fn track(&self, disposable: Disposable) -> DiResult<bool> {
        Scope::track(self, disposable)
    }
}

impl Resolver for Scope {}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.node.id)
            .field("depth", &self.node.depth)
            .field("state", &*self.node.state.lock())
            .field("tracked", &self.node.bag.lock().len())
            .finish()
    }
}

/// Scope that disposes itself synchronously when dropped.
///
/// Failures during the implicit disposal are logged through `tracing`; call
/// [`dispose`](Self::dispose) to observe them instead.
///
/// ```
/// use ferrous_lifetime::{Dispose, DisposeResult, ServiceCollection, Resolver};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// static CLOSED: AtomicBool = AtomicBool::new(false);
///
/// struct Session;
/// impl Dispose for Session {
///     fn dispose(&self) -> DisposeResult {
///         CLOSED.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_factory::<Session, _>(|_| Session).disposable();
/// let provider = services.build();
///
/// {
///     let scope = provider.scope_guard().unwrap();
///     scope.get_required::<Session>();
/// }
/// assert!(CLOSED.load(Ordering::SeqCst));
/// ```
pub struct ScopeGuard {
    scope: Scope,
}

impl ScopeGuard {
    pub(crate) fn new(scope: Scope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Disposes now and reports the outcome.
    pub fn dispose(self) -> DiResult<()> {
        self.scope.dispose()
    }
}

impl Deref for ScopeGuard {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        &self.scope
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Err(error) = self.scope.dispose() {
            tracing::warn!(scope = %self.scope.id(), error = %error, "scope guard disposal failed");
        }
    }
}

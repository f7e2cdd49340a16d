//! Service registration types.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::DiResult;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::traits::{AsyncDispose, Dispose, Disposable};

use crate::provider::ResolverContext;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Ctor = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// Extracts a disposal view from a stored instance.
pub(crate) type Probe = fn(&AnyArc) -> Option<Disposable>;

static NEXT_REGISTRATION_ID: AtomicU64 = AtomicU64::new(1);

/// Service registration with lifetime, constructor and disposal capabilities.
///
/// The `id` names the cache slot: replacing a registration for the same key
/// yields a new id, so instances created from the old one stay where they
/// are.
pub(crate) struct Registration {
    pub(crate) id: u64,
    pub(crate) key: Key,
    pub(crate) lifetime: Lifetime,
    pub(crate) ctor: Ctor,
    pub(crate) sync_probe: Option<Probe>,
    pub(crate) async_probe: Option<Probe>,
}

impl Registration {
    pub(crate) fn new(key: Key, lifetime: Lifetime, ctor: Ctor) -> Self {
        Self {
            id: NEXT_REGISTRATION_ID.fetch_add(1, Ordering::Relaxed),
            key,
            lifetime,
            ctor,
            sync_probe: None,
            async_probe: None,
        }
    }

    /// Disposal view of `instance`, or `None` if it exposes no protocol.
    pub(crate) fn disposable(&self, instance: &AnyArc) -> Option<Disposable> {
        let sync = self.sync_probe.and_then(|probe| probe(instance));
        let asynchronous = self.async_probe.and_then(|probe| probe(instance));
        let view = match (sync, asynchronous) {
            (Some(sync), Some(asynchronous)) => sync.merge(asynchronous),
            (Some(view), None) | (None, Some(view)) => view,
            (None, None) => return None,
        };
        Some(view.named(self.key.display_name()))
    }
}

/// Concrete instances are stored as `Arc<T>` directly.
pub(crate) fn probe_sync<T: Dispose>(instance: &AnyArc) -> Option<Disposable> {
    instance.clone().downcast::<T>().ok().map(Disposable::sync)
}

pub(crate) fn probe_async<T: AsyncDispose>(instance: &AnyArc) -> Option<Disposable> {
    instance.clone().downcast::<T>().ok().map(Disposable::asynchronous)
}

/// Trait objects are stored as `Arc<Arc<dyn Trait>>`.
pub(crate) fn probe_sync_trait<T: ?Sized + Dispose>(instance: &AnyArc) -> Option<Disposable> {
    instance
        .downcast_ref::<Arc<T>>()
        .map(|inner| Disposable::sync(inner.clone()))
}

pub(crate) fn probe_async_trait<T: ?Sized + AsyncDispose>(instance: &AnyArc) -> Option<Disposable> {
    instance
        .downcast_ref::<Arc<T>>()
        .map(|inner| Disposable::asynchronous(inner.clone()))
}

/// Registration table keyed by service key, last registration wins.
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<Key, Arc<Registration>>,
    /// Keys in first-registration order, for stable descriptor listings.
    order: Vec<Key>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the registration for its key.
    pub(crate) fn insert(&mut self, registration: Arc<Registration>) -> Option<Arc<Registration>> {
        let key = registration.key;
        let previous = self.entries.insert(key, registration);
        if previous.is_none() {
            self.order.push(key);
        }
        previous
    }

    #[inline]
    pub(crate) fn get(&self, key: &Key) -> Option<Arc<Registration>> {
        self.entries.get(key).cloned()
    }

    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterator over registrations in first-registration order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<Registration>> {
        self.order.iter().filter_map(|key| self.entries.get(key))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

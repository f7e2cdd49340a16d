//! Service collection module.
//!
//! This module contains the ServiceCollection type used to register
//! services and build a [`ServiceProvider`].

use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::ContainerOptions;
use crate::descriptors::ServiceDescriptor;
use crate::error::DiResult;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::observer::{LifetimeObserver, Observers};
use crate::provider::{ResolverContext, ServiceProvider};
use crate::registration::{
    probe_async, probe_async_trait, probe_sync, probe_sync_trait, AnyArc, Ctor, Registration, Registry,
};
use crate::traits::{AsyncDispose, Dispose};

/// Registration surface of the container.
///
/// Every `add_*` method returns a builder on which the disposal protocols
/// of the registered instances are declared. Without such a declaration the
/// container never disposes the instances.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifetime::{Dispose, DisposeResult, ServiceCollection, Resolver};
///
/// struct Connection;
/// impl Dispose for Connection {
///     fn dispose(&self) -> DisposeResult { Ok(()) }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_factory::<Connection, _>(|_| Connection).disposable();
///
/// let provider = services.build();
/// let scope = provider.create_scope().unwrap();
/// scope.get_required::<Connection>();
/// assert_eq!(scope.tracked_count(), 1);
/// scope.dispose().unwrap();
/// ```
#[derive(Default)]
pub struct ServiceCollection {
    registrations: Vec<Registration>,
    observers: Observers,
    options: ContainerOptions,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the container options applied by [`build`](Self::build).
    pub fn with_options(&mut self, options: ContainerOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Adds an observer notified about resolutions and scope lifecycle.
    ///
    /// Observers are called in the order they were added.
    pub fn add_observer(&mut self, observer: Arc<dyn LifetimeObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    // ----- Concrete types -----

    /// Registers an existing value as a singleton.
    ///
    /// The value is tracked for disposal the first time it is resolved, if a
    /// disposal protocol is declared on the returned builder.
    pub fn add_singleton<T: 'static + Send + Sync>(&mut self, value: T) -> ServiceBuilder<'_, T> {
        self.add_instance(Key::of::<T>(None), value)
    }

    /// Registers a named singleton value.
    pub fn add_named_singleton<T: 'static + Send + Sync>(
        &mut self,
        name: &'static str,
        value: T,
    ) -> ServiceBuilder<'_, T> {
        self.add_instance(Key::of::<T>(Some(name)), value)
    }

    /// Registers a factory called once for the whole container.
    ///
    /// The factory receives a context bound to the root scope.
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> ServiceBuilder<'_, T>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Singleton, factory)
    }

    /// Registers a factory called once per scope.
    ///
    /// ```rust
    /// use ferrous_lifetime::{ServiceCollection, Resolver};
    /// use std::sync::Arc;
    ///
    /// struct RequestContext { request_id: String }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_factory::<RequestContext, _>(|_| {
    ///     RequestContext { request_id: "req-123".to_string() }
    /// });
    ///
    /// let provider = services.build();
    /// let first = provider.create_scope().unwrap();
    /// let second = provider.create_scope().unwrap();
    /// let a = first.get_required::<RequestContext>();
    /// assert!(Arc::ptr_eq(&a, &first.get_required::<RequestContext>()));
    /// assert!(!Arc::ptr_eq(&a, &second.get_required::<RequestContext>()));
    /// ```
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> ServiceBuilder<'_, T>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, factory)
    }

    /// Registers a factory called on every resolution, with each instance
    /// owned and disposed by the resolving scope.
    pub fn add_per_resolution_factory<T, F>(&mut self, factory: F) -> ServiceBuilder<'_, T>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::PerResolution, factory)
    }

    /// Registers a factory called on every resolution. Instances are never
    /// tracked; the caller owns them.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> ServiceBuilder<'_, T>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Transient, factory)
    }

    /// Registers a factory with an explicit lifetime.
    pub fn add_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> ServiceBuilder<'_, T>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_try_factory(lifetime, move |r| Ok(factory(r)))
    }

    /// Registers a fallible factory; its errors are returned by the
    /// resolution that triggered it.
    ///
    /// ```rust
    /// use ferrous_lifetime::{Lifetime, ServiceCollection, Resolver};
    /// use std::sync::Arc;
    ///
    /// struct Port(u16);
    /// struct Listener { port: Arc<Port> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_try_factory::<Listener, _>(Lifetime::Scoped, |r| {
    ///     Ok(Listener { port: r.get::<Port>()? })
    /// });
    ///
    /// let provider = services.build();
    /// let scope = provider.create_scope().unwrap();
    /// assert!(scope.get::<Listener>().is_err());
    /// ```
    pub fn add_try_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> ServiceBuilder<'_, T>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |r: &ResolverContext<'_>| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(r)?) as AnyArc)
        });
        ServiceBuilder::new(self.push(Key::of::<T>(None), lifetime, ctor))
    }

    /// Registers a named singleton factory.
    pub fn add_named_singleton_factory<T, F>(&mut self, name: &'static str, factory: F) -> ServiceBuilder<'_, T>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_named_factory(name, Lifetime::Singleton, factory)
    }

    /// Registers a named scoped factory.
    pub fn add_named_scoped_factory<T, F>(&mut self, name: &'static str, factory: F) -> ServiceBuilder<'_, T>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_named_factory(name, Lifetime::Scoped, factory)
    }

    /// Registers a named per-resolution factory.
    pub fn add_named_per_resolution_factory<T, F>(
        &mut self,
        name: &'static str,
        factory: F,
    ) -> ServiceBuilder<'_, T>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_named_factory(name, Lifetime::PerResolution, factory)
    }

    /// Registers a named transient factory.
    pub fn add_named_transient_factory<T, F>(&mut self, name: &'static str, factory: F) -> ServiceBuilder<'_, T>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_named_factory(name, Lifetime::Transient, factory)
    }

    /// Registers a named factory with an explicit lifetime.
    pub fn add_named_factory<T, F>(
        &mut self,
        name: &'static str,
        lifetime: Lifetime,
        factory: F,
    ) -> ServiceBuilder<'_, T>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |r: &ResolverContext<'_>| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(r)) as AnyArc)
        });
        ServiceBuilder::new(self.push(Key::of::<T>(Some(name)), lifetime, ctor))
    }

    // ----- Trait objects -----

    /// Registers an existing trait object as a singleton.
    ///
    /// ```rust
    /// use ferrous_lifetime::{ServiceCollection, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Clock: Send + Sync { fn now(&self) -> u64; }
    /// struct Fixed;
    /// impl Clock for Fixed { fn now(&self) -> u64 { 7 } }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_trait(Arc::new(Fixed) as Arc<dyn Clock>);
    ///
    /// let provider = services.build();
    /// assert_eq!(provider.get_required_trait::<dyn Clock>().now(), 7);
    /// ```
    pub fn add_singleton_trait<T>(&mut self, value: Arc<T>) -> TraitServiceBuilder<'_, T>
    where
        T: ?Sized + 'static + Send + Sync,
    {
        self.add_trait_instance(Key::of::<T>(None), value)
    }

    /// Registers a named trait object singleton.
    pub fn add_named_singleton_trait<T>(&mut self, name: &'static str, value: Arc<T>) -> TraitServiceBuilder<'_, T>
    where
        T: ?Sized + 'static + Send + Sync,
    {
        self.add_trait_instance(Key::of::<T>(Some(name)), value)
    }

    /// Registers a trait object factory with an explicit lifetime.
    pub fn add_trait_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> TraitServiceBuilder<'_, T>
    where
        T: ?Sized + 'static + Send + Sync,
        F: Fn(&ResolverContext) -> Arc<T> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |r: &ResolverContext<'_>| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(r)) as AnyArc)
        });
        TraitServiceBuilder::new(self.push(Key::of::<T>(None), lifetime, ctor))
    }

    /// Registers a named trait object factory with an explicit lifetime.
    ///
    /// ```rust
    /// use ferrous_lifetime::{Dispose, DisposeResult, Lifetime, ServiceCollection, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Store: Dispose {}
    /// struct Memory;
    /// impl Dispose for Memory {
    ///     fn dispose(&self) -> DisposeResult { Ok(()) }
    /// }
    /// impl Store for Memory {}
    ///
    /// let mut services = ServiceCollection::new();
    /// services
    ///     .add_named_trait_factory::<dyn Store, _>("cache", Lifetime::Scoped, |_| Arc::new(Memory))
    ///     .disposable();
    ///
    /// let provider = services.build();
    /// let scope = provider.create_scope().unwrap();
    /// scope.get_named_trait_required::<dyn Store>("cache");
    /// assert_eq!(scope.tracked_count(), 1);
    /// ```
    pub fn add_named_trait_factory<T, F>(
        &mut self,
        name: &'static str,
        lifetime: Lifetime,
        factory: F,
    ) -> TraitServiceBuilder<'_, T>
    where
        T: ?Sized + 'static + Send + Sync,
        F: Fn(&ResolverContext) -> Arc<T> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |r: &ResolverContext<'_>| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(r)) as AnyArc)
        });
        TraitServiceBuilder::new(self.push(Key::of::<T>(Some(name)), lifetime, ctor))
    }

    // ----- Introspection and build -----

    /// Descriptors of every registration, in registration order. Replaced
    /// registrations are listed once, with their latest settings.
    pub fn get_service_descriptors(&self) -> Vec<ServiceDescriptor> {
        let mut seen = Vec::<Key>::new();
        let mut descriptors = Vec::new();
        for registration in self.registrations.iter().rev() {
            if seen.contains(&registration.key) {
                continue;
            }
            seen.push(registration.key);
            descriptors.push(ServiceDescriptor::of(registration));
        }
        descriptors.reverse();
        descriptors
    }

    /// Builds the container. Later registrations for a key replace earlier
    /// ones.
    pub fn build(self) -> ServiceProvider {
        let Self {
            registrations,
            observers,
            options,
        } = self;
        ServiceProvider::new(into_registry(registrations), observers, options)
    }

    /// Registrations only; observers and options are left behind.
    pub(crate) fn into_registrations(self) -> Vec<Registration> {
        self.registrations
    }

    fn add_instance<T: 'static + Send + Sync>(&mut self, key: Key, value: T) -> ServiceBuilder<'_, T> {
        let instance: AnyArc = Arc::new(value);
        let ctor: Ctor = Arc::new(move |_: &ResolverContext<'_>| -> DiResult<AnyArc> { Ok(instance.clone()) });
        ServiceBuilder::new(self.push(key, Lifetime::Singleton, ctor))
    }

    fn add_trait_instance<T>(&mut self, key: Key, value: Arc<T>) -> TraitServiceBuilder<'_, T>
    where
        T: ?Sized + 'static + Send + Sync,
    {
        // Arc<Arc<dyn Trait>> storage
        let instance: AnyArc = Arc::new(value);
        let ctor: Ctor = Arc::new(move |_: &ResolverContext<'_>| -> DiResult<AnyArc> { Ok(instance.clone()) });
        TraitServiceBuilder::new(self.push(key, Lifetime::Singleton, ctor))
    }

    fn push(&mut self, key: Key, lifetime: Lifetime, ctor: Ctor) -> &mut Registration {
        self.registrations.push(Registration::new(key, lifetime, ctor));
        let index = self.registrations.len() - 1;
        &mut self.registrations[index]
    }
}

pub(crate) fn into_registry(registrations: Vec<Registration>) -> Registry {
    let mut registry = Registry::new();
    for registration in registrations {
        registry.insert(Arc::new(registration));
    }
    registry
}

/// Declares the disposal protocols of a concrete service's instances.
pub struct ServiceBuilder<'a, T> {
    registration: &'a mut Registration,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: 'static + Send + Sync> ServiceBuilder<'a, T> {
    fn new(registration: &'a mut Registration) -> Self {
        Self {
            registration,
            _marker: PhantomData,
        }
    }

    /// Instances are released through [`Dispose`].
    pub fn disposable(self) -> Self
    where
        T: Dispose,
    {
        self.registration.sync_probe = Some(probe_sync::<T>);
        self
    }

    /// Instances are released through [`AsyncDispose`].
    pub fn async_disposable(self) -> Self
    where
        T: AsyncDispose,
    {
        self.registration.async_probe = Some(probe_async::<T>);
        self
    }

    pub fn key(&self) -> Key {
        self.registration.key
    }

    pub fn lifetime(&self) -> Lifetime {
        self.registration.lifetime
    }
}

/// Declares the disposal protocols of a trait object service.
///
/// The trait must have [`Dispose`] or [`AsyncDispose`] as a supertrait for
/// the corresponding declaration to be available.
pub struct TraitServiceBuilder<'a, T: ?Sized> {
    registration: &'a mut Registration,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<'a, T: ?Sized + 'static + Send + Sync> TraitServiceBuilder<'a, T> {
    fn new(registration: &'a mut Registration) -> Self {
        Self {
            registration,
            _marker: PhantomData,
        }
    }

    pub fn disposable(self) -> Self
    where
        T: Dispose,
    {
        self.registration.sync_probe = Some(probe_sync_trait::<T>);
        self
    }

    pub fn async_disposable(self) -> Self
    where
        T: AsyncDispose,
    {
        self.registration.async_probe = Some(probe_async_trait::<T>);
        self
    }

    pub fn key(&self) -> Key {
        self.registration.key
    }

    pub fn lifetime(&self) -> Lifetime {
        self.registration.lifetime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DisposeResult;

    struct Handle;
    impl Dispose for Handle {
        fn dispose(&self) -> DisposeResult {
            Ok(())
        }
    }

    #[test]
    fn builders_record_capabilities() {
        let mut services = ServiceCollection::new();
        let builder = services.add_per_resolution_factory::<Handle, _>(|_| Handle).disposable();
        assert_eq!(builder.lifetime(), Lifetime::PerResolution);

        let descriptors = services.get_service_descriptors();
        assert_eq!(descriptors.len(), 1);
        assert!(descriptors[0].sync_disposable);
        assert!(descriptors[0].is_disposable());
    }

    #[test]
    fn later_registrations_replace_earlier_ones() {
        let mut services = ServiceCollection::new();
        services.add_singleton(1u32);
        services.add_named_singleton("other", 2u32);
        services.add_singleton(3u32).key();

        let descriptors = services.get_service_descriptors();
        let names: Vec<_> = descriptors.iter().map(|d| d.service_name()).collect();
        assert_eq!(names, vec![Some("other"), None]);
    }
}

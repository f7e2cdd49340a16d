//! Service descriptors for introspection and diagnostics.

use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::registration::Registration;

/// Description of one registration: its key, lifetime and the disposal
/// protocols declared for its instances.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifetime::{Dispose, DisposeResult, Lifetime, ServiceCollection};
///
/// struct Connection;
/// impl Dispose for Connection {
///     fn dispose(&self) -> DisposeResult { Ok(()) }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(42u32);
/// services.add_named_scoped_factory::<Connection, _>("primary", |_| Connection).disposable();
///
/// let descriptors = services.get_service_descriptors();
/// assert_eq!(descriptors.len(), 2);
///
/// let connection = descriptors.iter().find(|d| d.is_named()).unwrap();
/// assert_eq!(connection.service_name(), Some("primary"));
/// assert_eq!(connection.lifetime, Lifetime::Scoped);
/// assert!(connection.sync_disposable);
/// assert!(!connection.async_disposable);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// The service key (type or trait name with optional service name)
    pub key: Key,
    /// Service lifetime
    pub lifetime: Lifetime,
    /// Instances are released through [`Dispose`](crate::Dispose)
    pub sync_disposable: bool,
    /// Instances are released through [`AsyncDispose`](crate::AsyncDispose)
    pub async_disposable: bool,
}

impl ServiceDescriptor {
    pub(crate) fn of(registration: &Registration) -> Self {
        Self {
            key: registration.key,
            lifetime: registration.lifetime,
            sync_disposable: registration.sync_probe.is_some(),
            async_disposable: registration.async_probe.is_some(),
        }
    }

    /// Service name for named registrations.
    pub fn service_name(&self) -> Option<&'static str> {
        self.key.service_name()
    }

    /// Type or trait name, as given by `std::any::type_name`.
    pub fn type_name(&self) -> &'static str {
        self.key.display_name()
    }

    pub fn is_named(&self) -> bool {
        self.service_name().is_some()
    }

    /// Returns `true` if the container will track and dispose instances of
    /// this registration.
    pub fn is_disposable(&self) -> bool {
        self.lifetime.is_tracked() && (self.sync_disposable || self.async_disposable)
    }
}

//! Service key types for the lifetime container.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Key for service storage and lookup.
///
/// A key is a contract (a concrete type or a trait object type) plus an
/// optional service name, so several registrations of the same contract can
/// coexist under different names.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifetime::{Key, key_of_type, key_of_named};
///
/// let plain = key_of_type::<u32>();
/// let named = key_of_named::<u32>("port");
///
/// assert_eq!(plain.display_name(), "u32");
/// assert_eq!(plain.service_name(), None);
/// assert_eq!(named.service_name(), Some("port"));
/// assert_ne!(plain, named);
/// ```
#[derive(Clone, Copy)]
pub struct Key {
    id: TypeId,
    type_name: &'static str,
    name: Option<&'static str>,
}

impl Key {
    /// Creates a key for contract `T`, which may be a trait object type.
    #[inline]
    pub fn of<T: ?Sized + 'static>(name: Option<&'static str>) -> Self {
        Self {
            id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name,
        }
    }

    /// Get the type or trait name for display
    ///
    /// Returns the `std::any::type_name` of the contract, used in errors and
    /// in disposal failure reports.
    pub fn display_name(&self) -> &'static str {
        self.type_name
    }

    /// Get the service name for named services, or None for unnamed services
    pub fn service_name(&self) -> Option<&'static str> {
        self.name
    }

    /// Returns `true` if this key carries a service name.
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// Returns the `TypeId` of the contract.
    pub fn type_id(&self) -> TypeId {
        self.id
    }
}

// Equality and hashing ignore the type name: it is derived from the TypeId.
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "Key({} @ {:?})", self.type_name, name),
            None => write!(f, "Key({})", self.type_name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "{} ({})", self.type_name, name),
            None => f.write_str(self.type_name),
        }
    }
}

/// Key for an unnamed concrete type or trait object.
#[inline(always)]
pub fn key_of_type<T: ?Sized + 'static>() -> Key {
    Key::of::<T>(None)
}

/// Key for a named concrete type or trait object.
#[inline(always)]
pub fn key_of_named<T: ?Sized + 'static>(name: &'static str) -> Key {
    Key::of::<T>(Some(name))
}

//! Service lifetime definitions.

use std::fmt;

/// Lifetime policy deciding where an instance is cached and which scope
/// disposes it.
///
/// | Lifetime | Owning scope | Instances |
/// |---|---|---|
/// | `Singleton` | the root (container) scope | one, ever |
/// | `Scoped` | the scope resolving it | one per scope |
/// | `PerResolution` | the scope resolving it | one per call, tracked for disposal |
/// | `Transient` | none | one per call, never tracked |
///
/// # Examples
///
/// ```rust
/// use ferrous_lifetime::{ServiceCollection, Resolver, Lifetime};
///
/// struct Database { url: String }
/// struct Repository { db_url: String }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() });
/// services.add_scoped_factory::<Repository, _>(|r| {
///     let db = r.get_required::<Database>();
///     Repository { db_url: db.url.clone() }
/// });
///
/// let provider = services.build();
/// let scope = provider.create_scope().unwrap();
///
/// let db1 = provider.get_required::<Database>();
/// let db2 = scope.get_required::<Database>();
/// assert!(std::sync::Arc::ptr_eq(&db1, &db2));
///
/// let repo1 = scope.get_required::<Repository>();
/// let repo2 = scope.get_required::<Repository>();
/// assert!(std::sync::Arc::ptr_eq(&repo1, &repo2));
///
/// // Scope-bound services cannot be resolved from the root
/// assert!(provider.get::<Repository>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Single instance per container, owned and disposed by the root scope.
    ///
    /// The factory always runs against the root scope, so a singleton can
    /// never capture a scope-bound dependency.
    Singleton,
    /// Single instance per scope, disposed when that scope ends.
    Scoped,
    /// New instance on every resolution, still tracked by the resolving
    /// scope and disposed with it.
    PerResolution,
    /// New instance on every resolution, never tracked. Disposal is the
    /// caller's responsibility.
    Transient,
}

impl Lifetime {
    /// Returns `true` if instances are cached in a scope slot.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, Lifetime::Singleton | Lifetime::Scoped)
    }

    /// Returns `true` if disposable instances are tracked by a scope.
    #[inline]
    pub fn is_tracked(&self) -> bool {
        !matches!(self, Lifetime::Transient)
    }

    /// Returns `true` if resolution needs a scope below the root.
    #[inline]
    pub fn requires_scope(&self) -> bool {
        matches!(self, Lifetime::Scoped | Lifetime::PerResolution)
    }

    /// Returns `true` if instances belong to the root scope.
    #[inline]
    pub fn binds_to_root(&self) -> bool {
        matches!(self, Lifetime::Singleton)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => f.write_str("Singleton"),
            Lifetime::Scoped => f.write_str("Scoped"),
            Lifetime::PerResolution => f.write_str("PerResolution"),
            Lifetime::Transient => f.write_str("Transient"),
        }
    }
}

//! Resolver context handed to factories.

use super::Scope;
use crate::error::DiResult;
use crate::key::Key;
use crate::registration::AnyArc;
use crate::traits::{Disposable, Resolver, ResolverCore};

/// Context passed to factory functions for resolving dependencies.
///
/// The context carries the scope that will own the instance being built,
/// so dependencies resolve against that scope and helpers tracked through
/// [`Resolver::register_disposer`] land in its registry. Singleton
/// factories always receive a context for the root scope.
///
/// # Examples
///
/// ```
/// use ferrous_lifetime::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database {
///     url: "postgres://localhost".to_string()
/// });
/// services.add_transient_factory::<UserService, _>(|resolver| {
///     UserService {
///         db: resolver.get_required::<Database>(),
///     }
/// });
///
/// let provider = services.build();
/// assert_eq!(provider.get_required::<UserService>().db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    scope: &'a Scope,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(scope: &'a Scope) -> Self {
        Self { scope }
    }

    /// The scope that owns the instance under construction.
    pub fn scope(&self) -> &Scope {
        self.scope
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.scope.resolve_any(key)
    }

    fn track(&self, disposable: Disposable) -> DiResult<bool> {
        self.scope.track(disposable)
    }
}

impl Resolver for ResolverContext<'_> {}

//! Error types for the lifetime container.

use std::fmt;
use std::sync::Arc;

use crate::provider::ScopeId;

/// Error returned by a single disposal protocol invocation.
pub type DisposeError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a single [`Dispose`](crate::Dispose) or
/// [`AsyncDispose`](crate::AsyncDispose) call.
pub type DisposeResult = Result<(), DisposeError>;

/// Lifetime container errors
///
/// Represents the error conditions of registration, resolution, scope
/// management and disposal.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifetime::{DiError, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build();
/// match provider.get::<String>() {
///     Err(DiError::NotFound(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone)]
pub enum DiError {
    /// Service not registered
    NotFound(&'static str),
    /// Type downcast failed
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    Circular(Vec<&'static str>),
    /// Maximum resolution depth exceeded
    DepthExceeded(usize),
    /// A scope-bound service was resolved with no active scope
    NoActiveScope(&'static str),
    /// The scope is disposing or already disposed
    ScopeDisposed(ScopeId),
    /// Scope nesting exceeded the configured maximum
    ScopeDepthExceeded(usize),
    /// Exactly one instance failed to dispose
    Disposal(DisposeFailure),
    /// Several instances failed to dispose, in the order they were encountered
    Aggregate(Vec<DisposeFailure>),
}

impl DiError {
    /// Disposal failures carried by this error, empty for non-disposal errors.
    ///
    /// ```rust
    /// use ferrous_lifetime::DiError;
    ///
    /// assert!(DiError::NotFound("x").failures().is_empty());
    /// ```
    pub fn failures(&self) -> &[DisposeFailure] {
        match self {
            DiError::Disposal(failure) => std::slice::from_ref(failure),
            DiError::Aggregate(failures) => failures,
            _ => &[],
        }
    }

    /// Returns `true` for errors produced by a disposal walk.
    pub fn is_disposal(&self) -> bool {
        matches!(self, DiError::Disposal(_) | DiError::Aggregate(_))
    }

    /// Folds collected failures into a result: none is success, one is
    /// surfaced as itself, several become an aggregate.
    pub(crate) fn from_failures(mut failures: Vec<DisposeFailure>) -> DiResult<()> {
        match failures.len() {
            0 => Ok(()),
            1 => Err(DiError::Disposal(failures.remove(0))),
            _ => Err(DiError::Aggregate(failures)),
        }
    }
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::NotFound(name) => write!(f, "Service not found: {}", name),
            DiError::TypeMismatch(name) => write!(f, "Type mismatch for: {}", name),
            DiError::Circular(path) => {
                write!(f, "Circular dependency: {}", path.join(" -> "))
            }
            DiError::DepthExceeded(depth) => write!(f, "Max depth {} exceeded", depth),
            DiError::NoActiveScope(name) => {
                write!(f, "Cannot resolve scope-bound service {} without an active scope", name)
            }
            DiError::ScopeDisposed(id) => write!(f, "Scope {} is disposing or disposed", id),
            DiError::ScopeDepthExceeded(depth) => write!(f, "Max scope depth {} exceeded", depth),
            DiError::Disposal(failure) => write!(f, "Disposal failed: {}", failure),
            DiError::Aggregate(failures) => {
                write!(f, "{} disposals failed", failures.len())?;
                for failure in failures {
                    write!(f, "; {}", failure)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for DiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiError::Disposal(failure) => Some(failure.error()),
            _ => None,
        }
    }
}

/// Result type for container operations
pub type DiResult<T> = Result<T, DiError>;

/// One instance whose disposal protocol returned an error.
///
/// Identifies the instance by the scope that owned it, its service type and
/// its creation position inside that scope's registry.
#[derive(Debug, Clone)]
pub struct DisposeFailure {
    scope: ScopeId,
    service: &'static str,
    position: usize,
    error: Arc<dyn std::error::Error + Send + Sync>,
}

impl DisposeFailure {
    pub(crate) fn new(scope: ScopeId, service: &'static str, position: usize, error: DisposeError) -> Self {
        Self {
            scope,
            service,
            position,
            error: Arc::from(error),
        }
    }

    /// Scope whose registry held the instance.
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Type name of the failed instance.
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Zero-based creation position of the instance in its scope.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The error returned by the disposal protocol.
    pub fn error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.error
    }
}

impl fmt::Display for DisposeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} in scope {}: {}",
            self.service, self.position, self.scope, self.error
        )
    }
}

/// Recorded when the synchronous entry point meets an instance that only
/// supports asynchronous disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiresAsyncDisposal;

impl fmt::Display for RequiresAsyncDisposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("instance only supports asynchronous disposal; use dispose_async()")
    }
}

impl std::error::Error for RequiresAsyncDisposal {}

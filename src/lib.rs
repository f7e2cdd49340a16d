//! # ferrous-lifetime
//!
//! Lifetime scopes and ordered disposal for a dependency injection container.
//!
//! ## Features
//!
//! - **Lifetimes**: Singleton, Scoped, PerResolution and Transient services
//! - **Scope tree**: nested scopes, drained child-first when a parent is disposed
//! - **Ordered teardown**: instances are disposed in strict reverse creation order
//! - **Mixed protocols**: synchronous [`Dispose`] and asynchronous [`AsyncDispose`],
//!   declared per registration
//! - **Continue on error**: one failing disposal never stops the rest; failures are
//!   reported together
//! - **Completion handlers**: callbacks fired once a scope has finished disposing
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_lifetime::{Dispose, DisposeResult, ServiceCollection, Resolver};
//! use std::sync::{Arc, Mutex};
//!
//! struct Connection {
//!     log: Arc<Mutex<Vec<&'static str>>>,
//! }
//!
//! impl Dispose for Connection {
//!     fn dispose(&self) -> DisposeResult {
//!         self.log.lock().unwrap().push("connection closed");
//!         Ok(())
//!     }
//! }
//!
//! struct Repository {
//!     log: Arc<Mutex<Vec<&'static str>>>,
//!     _connection: Arc<Connection>,
//! }
//!
//! impl Dispose for Repository {
//!     fn dispose(&self) -> DisposeResult {
//!         self.log.lock().unwrap().push("repository flushed");
//!         Ok(())
//!     }
//! }
//!
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let mut services = ServiceCollection::new();
//! let l = log.clone();
//! services
//!     .add_scoped_factory::<Connection, _>(move |_| Connection { log: l.clone() })
//!     .disposable();
//! let l = log.clone();
//! services
//!     .add_scoped_factory::<Repository, _>(move |r| Repository {
//!         log: l.clone(),
//!         _connection: r.get_required::<Connection>(),
//!     })
//!     .disposable();
//!
//! let provider = services.build();
//! let scope = provider.create_scope().unwrap();
//! scope.get_required::<Repository>();
//! scope.dispose().unwrap();
//!
//! // The connection was created first, so it is released last
//! assert_eq!(*log.lock().unwrap(), vec!["repository flushed", "connection closed"]);
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: created once, owned by the root scope
//! - **Scoped**: created once per scope, owned by that scope
//! - **PerResolution**: created on every resolution, owned by the resolving scope
//! - **Transient**: created on every resolution, never tracked
//!
//! Scoped and per-resolution services cannot be resolved from the root; doing so
//! fails with [`DiError::NoActiveScope`] instead of quietly stretching the
//! instance's lifetime to the container's.
//!
//! ## Asynchronous Disposal
//!
//! ```rust
//! use ferrous_lifetime::{AsyncDispose, DisposeResult, ServiceCollection, Resolver};
//! use async_trait::async_trait;
//!
//! struct Client;
//!
//! #[async_trait]
//! impl AsyncDispose for Client {
//!     async fn dispose_async(&self) -> DisposeResult {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() {
//! let mut services = ServiceCollection::new();
//! services.add_singleton_factory::<Client, _>(|_| Client).async_disposable();
//!
//! let provider = services.build();
//! provider.get_required::<Client>();
//! provider.dispose_async().await.unwrap();
//! # }
//! ```

// Module declarations
pub mod collection;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod provider;
pub mod traits;

// Internal modules
mod disposal;
mod internal;
mod registration;

// Re-exports
pub use collection::{ServiceBuilder, ServiceCollection, TraitServiceBuilder};
pub use config::ContainerOptions;
pub use descriptors::ServiceDescriptor;
pub use error::{DiError, DiResult, DisposeError, DisposeFailure, DisposeResult, RequiresAsyncDisposal};
pub use key::{key_of_named, key_of_type, Key};
pub use lifetime::Lifetime;
pub use observer::{LifetimeObserver, LoggingObserver, MetricsObserver};
pub use provider::{ResolverContext, Scope, ScopeCompletion, ScopeGuard, ScopeId, ServiceProvider};
pub use traits::{AsyncDispose, Disposable, Dispose, Resolver, ResolverCore};

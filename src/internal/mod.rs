//! Internal implementation details.

use std::future::Future;
use std::pin::Pin;

pub(crate) mod dispose_bag;
pub(crate) mod resolution_stack;

pub(crate) use dispose_bag::{BagPush, DisposeBag};
pub(crate) use resolution_stack::ResolutionFrame;

/// Boxed future used where disposal recurses through child scopes.
pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

//! Core traits for the lifetime container.

mod dispose;
mod resolver;

pub use dispose::{AsyncDispose, Disposable, Dispose};
pub use resolver::{Resolver, ResolverCore};

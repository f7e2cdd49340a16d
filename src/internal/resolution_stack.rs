//! Per-thread resolution stack for cycle detection.
//!
//! Cached slots block concurrent initializers, so a factory that resolves
//! its own key would wait on itself forever. The stack turns that into a
//! `DiError::Circular` before the slot is touched.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};
use crate::key::Key;

const MAX_DEPTH: usize = 1024;

thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<Key>> = const { RefCell::new(Vec::new()) };
}

/// Marks `key` as being resolved on this thread until dropped.
pub(crate) struct ResolutionFrame {
    key: Key,
}

impl ResolutionFrame {
    pub(crate) fn enter(key: &Key) -> DiResult<Self> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(key) {
                let mut path: Vec<&'static str> = stack.iter().map(Key::display_name).collect();
                path.push(key.display_name());
                return Err(DiError::Circular(path));
            }
            if stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(stack.len()));
            }
            stack.push(*key);
            Ok(Self { key: *key })
        })
    }
}

impl Drop for ResolutionFrame {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(popped, Some(self.key));
        });
    }
}

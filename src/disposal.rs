//! Disposal coordinator: the reverse walk over a frozen registry snapshot.
//!
//! Instances are released strictly one at a time, last created first. A
//! failing instance is recorded and the walk moves on, so instances created
//! earlier still get their chance to release. Asynchronous disposals are
//! awaited before the walk advances.

use std::time::Instant;

use crate::error::{DisposeError, DisposeFailure, RequiresAsyncDisposal};
use crate::observer::Observers;
use crate::provider::ScopeId;
use crate::traits::Disposable;

/// What a walk has done so far.
#[derive(Debug, Default)]
pub(crate) struct WalkOutcome {
    pub(crate) disposed: usize,
    pub(crate) failures: Vec<DisposeFailure>,
}

/// Reverse walk over one scope's snapshot.
///
/// The walk keeps its unvisited entries, so an asynchronous walk that is
/// abandoned part-way can be finished with [`run_sync`](Self::run_sync).
pub(crate) struct Walk {
    scope: ScopeId,
    entries: Vec<Disposable>,
    outcome: WalkOutcome,
}

impl Walk {
    pub(crate) fn new(scope: ScopeId, entries: Vec<Disposable>) -> Self {
        Self {
            scope,
            entries,
            outcome: WalkOutcome::default(),
        }
    }

    /// Entries not yet visited.
    pub(crate) fn remaining(&self) -> usize {
        self.entries.len()
    }

    /// Synchronous walk. Instances exposing only the asynchronous protocol
    /// are reported as failures instead of being blocked on.
    pub(crate) fn run_sync(&mut self, observers: &Observers) {
        while let Some(entry) = self.entries.pop() {
            let position = self.entries.len();
            let started = Instant::now();
            let result = match entry.sync_protocol() {
                Some(protocol) => protocol.dispose(),
                None => Err(Box::new(RequiresAsyncDisposal) as DisposeError),
            };
            observers.instance_disposed(self.scope, entry.service(), started.elapsed(), result.is_err());
            self.record(&entry, position, result);
        }
    }

    /// Asynchronous walk, preferring the asynchronous protocol when an
    /// instance exposes both.
    pub(crate) async fn run_async(&mut self, observers: &Observers) {
        while let Some(entry) = self.entries.pop() {
            let position = self.entries.len();
            let started = Instant::now();
            let result = match (entry.async_protocol(), entry.sync_protocol()) {
                (Some(protocol), _) => protocol.dispose_async().await,
                (None, Some(protocol)) => protocol.dispose(),
                (None, None) => Ok(()),
            };
            observers.instance_disposed(self.scope, entry.service(), started.elapsed(), result.is_err());
            self.record(&entry, position, result);
        }
    }

    pub(crate) fn take_outcome(&mut self) -> WalkOutcome {
        std::mem::take(&mut self.outcome)
    }

    fn record(&mut self, entry: &Disposable, position: usize, result: Result<(), DisposeError>) {
        match result {
            Ok(()) => self.outcome.disposed += 1,
            Err(error) => {
                tracing::warn!(
                    scope = %self.scope,
                    service = entry.service(),
                    position,
                    error = %error,
                    "instance disposal failed"
                );
                self.outcome
                    .failures
                    .push(DisposeFailure::new(self.scope, entry.service(), position, error));
            }
        }
    }
}

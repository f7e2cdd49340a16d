/// Concurrent access integration tests
///
/// These tests verify that scopes stay consistent when many threads resolve,
/// track and create scopes at once, and that teardown still sees every
/// instance exactly once.

use ferrous_lifetime::{DiError, Dispose, DisposeResult, Resolver, ServiceCollection};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

const THREADS: usize = 8;

// ===== Test Services =====

struct Connection {
    id: usize,
    disposed: Arc<Mutex<Vec<usize>>>,
}

impl Dispose for Connection {
    fn dispose(&self) -> DisposeResult {
        self.disposed.lock().unwrap().push(self.id);
        Ok(())
    }
}

struct Counter {
    disposals: Arc<AtomicUsize>,
}

impl Dispose for Counter {
    fn dispose(&self) -> DisposeResult {
        self.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ===== Tests =====

#[test]
fn scoped_instance_is_constructed_once_under_contention() {
    let constructed = Arc::new(AtomicUsize::new(0));
    let disposed = Arc::new(Mutex::new(Vec::new()));

    let mut services = ServiceCollection::new();
    let c = constructed.clone();
    let d = disposed.clone();
    services
        .add_scoped_factory::<Connection, _>(move |_| Connection {
            id: c.fetch_add(1, Ordering::SeqCst),
            disposed: d.clone(),
        })
        .disposable();

    let provider = services.build();
    let scope = provider.create_scope().unwrap();
    let barrier = Barrier::new(THREADS);

    let ids: Vec<usize> = crossbeam_utils::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    scope.get_required::<Connection>().id
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert!(ids.iter().all(|&id| id == ids[0]));
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert_eq!(scope.tracked_count(), 1);

    scope.dispose().unwrap();
    assert_eq!(*disposed.lock().unwrap(), vec![0]);
}

#[test]
fn singleton_is_shared_by_threads_using_different_scopes() {
    let constructed = Arc::new(AtomicUsize::new(0));
    let disposed = Arc::new(Mutex::new(Vec::new()));

    let mut services = ServiceCollection::new();
    let c = constructed.clone();
    let d = disposed.clone();
    services
        .add_singleton_factory::<Connection, _>(move |_| Connection {
            id: c.fetch_add(1, Ordering::SeqCst),
            disposed: d.clone(),
        })
        .disposable();

    let provider = services.build();
    let barrier = Barrier::new(THREADS);

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                let scope = provider.create_scope().unwrap();
                barrier.wait();
                scope.get_required::<Connection>();
                // Singletons belong to the root, not to this scope
                assert_eq!(scope.tracked_count(), 0);
                scope.dispose().unwrap();
            });
        }
    })
    .unwrap();

    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert!(disposed.lock().unwrap().is_empty());

    provider.dispose().unwrap();
    assert_eq!(*disposed.lock().unwrap(), vec![0]);
}

#[test]
fn concurrent_per_resolution_instances_are_all_tracked_and_disposed() {
    const PER_THREAD: usize = 50;
    let disposals = Arc::new(AtomicUsize::new(0));

    let mut services = ServiceCollection::new();
    let counter = disposals.clone();
    services
        .add_per_resolution_factory::<Counter, _>(move |_| Counter {
            disposals: counter.clone(),
        })
        .disposable();

    let provider = services.build();
    let scope = provider.create_scope().unwrap();
    let barrier = Barrier::new(THREADS);

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                barrier.wait();
                for _ in 0..PER_THREAD {
                    scope.get_required::<Counter>();
                }
            });
        }
    })
    .unwrap();

    assert_eq!(scope.tracked_count(), THREADS * PER_THREAD);
    scope.dispose().unwrap();
    assert_eq!(disposals.load(Ordering::SeqCst), THREADS * PER_THREAD);
}

#[test]
fn concurrent_child_scopes_are_all_drained_by_the_parent() {
    let disposals = Arc::new(AtomicUsize::new(0));

    let mut services = ServiceCollection::new();
    let counter = disposals.clone();
    services
        .add_scoped_factory::<Counter, _>(move |_| Counter {
            disposals: counter.clone(),
        })
        .disposable();

    let provider = services.build();
    let parent = provider.create_scope().unwrap();
    let barrier = Barrier::new(THREADS);

    let ids: Vec<u64> = crossbeam_utils::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    let child = parent.begin_child_scope().unwrap();
                    child.get_required::<Counter>();
                    child.id().as_u64()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), THREADS);
    assert_eq!(parent.open_children(), THREADS);

    provider.dispose().unwrap();
    assert_eq!(disposals.load(Ordering::SeqCst), THREADS);
    assert_eq!(parent.open_children(), 0);
}

#[test]
fn racing_disposals_release_each_instance_once() {
    let disposals = Arc::new(AtomicUsize::new(0));

    let mut services = ServiceCollection::new();
    let counter = disposals.clone();
    services
        .add_per_resolution_factory::<Counter, _>(move |_| Counter {
            disposals: counter.clone(),
        })
        .disposable();

    let provider = services.build();
    let scope = provider.create_scope().unwrap();
    for _ in 0..100 {
        scope.get_required::<Counter>();
    }
    let barrier = Barrier::new(THREADS);

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                barrier.wait();
                scope.dispose().unwrap();
            });
        }
    })
    .unwrap();

    assert_eq!(disposals.load(Ordering::SeqCst), 100);
    assert!(scope.is_disposed());
}

#[test]
fn instance_built_while_its_scope_disposes_is_still_released() {
    let disposals = Arc::new(AtomicUsize::new(0));
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));

    let mut services = ServiceCollection::new();
    let (counter, e, r) = (disposals.clone(), entered.clone(), release.clone());
    services
        .add_scoped_factory::<Counter, _>(move |_| {
            e.wait();
            r.wait();
            Counter {
                disposals: counter.clone(),
            }
        })
        .disposable();

    let provider = services.build();
    let scope = provider.create_scope().unwrap();

    let result = crossbeam_utils::thread::scope(|s| {
        let resolving = s.spawn(|_| scope.get::<Counter>().map(|_| ()));

        // The factory is running; tear the scope down underneath it
        entered.wait();
        scope.dispose().unwrap();
        release.wait();

        resolving.join().unwrap()
    })
    .unwrap();

    assert!(matches!(result, Err(DiError::ScopeDisposed(_))));
    assert_eq!(disposals.load(Ordering::SeqCst), 1);
    assert_eq!(scope.tracked_count(), 0);
}

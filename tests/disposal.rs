use async_trait::async_trait;
use ferrous_lifetime::{
    AsyncDispose, DiError, Dispose, DisposeResult, RequiresAsyncDisposal, Resolver, ServiceCollection,
};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

struct SyncService {
    name: &'static str,
    log: Log,
    fail: bool,
}

impl Dispose for SyncService {
    fn dispose(&self) -> DisposeResult {
        self.log.lock().unwrap().push(self.name.to_string());
        if self.fail {
            return Err(format!("{} refused to close", self.name).into());
        }
        Ok(())
    }
}

struct AsyncService {
    name: &'static str,
    log: Log,
}

#[async_trait]
impl AsyncDispose for AsyncService {
    async fn dispose_async(&self) -> DisposeResult {
        tokio::task::yield_now().await;
        self.log.lock().unwrap().push(self.name.to_string());
        Ok(())
    }
}

struct DualService {
    name: &'static str,
    log: Log,
}

impl Dispose for DualService {
    fn dispose(&self) -> DisposeResult {
        self.log.lock().unwrap().push(format!("sync:{}", self.name));
        Ok(())
    }
}

#[async_trait]
impl AsyncDispose for DualService {
    async fn dispose_async(&self) -> DisposeResult {
        tokio::task::yield_now().await;
        self.log.lock().unwrap().push(format!("async:{}", self.name));
        Ok(())
    }
}

const NAMES: [&str; 5] = ["S1", "S2", "S3", "S4", "S5"];

#[test]
fn container_disposes_five_singletons_in_reverse_creation_order() {
    let log = new_log();
    let mut services = ServiceCollection::new();
    for name in NAMES {
        let l = log.clone();
        services
            .add_named_singleton_factory::<SyncService, _>(name, move |_| SyncService {
                name,
                log: l.clone(),
                fail: false,
            })
            .disposable();
    }

    let provider = services.build();
    for name in NAMES {
        provider.get_named_required::<SyncService>(name);
    }

    provider.dispose().unwrap();
    assert_eq!(entries(&log), vec!["S5", "S4", "S3", "S2", "S1"]);
}

#[test]
fn scope_disposes_five_scoped_instances_in_reverse_creation_order() {
    let log = new_log();
    let mut services = ServiceCollection::new();
    for name in NAMES {
        let l = log.clone();
        services
            .add_named_scoped_factory::<SyncService, _>(name, move |_| SyncService {
                name,
                log: l.clone(),
                fail: false,
            })
            .disposable();
    }

    let provider = services.build();
    let scope = provider.create_scope().unwrap();
    for name in NAMES {
        scope.get_named_required::<SyncService>(name);
    }

    scope.dispose().unwrap();
    assert_eq!(entries(&log), vec!["S5", "S4", "S3", "S2", "S1"]);
}

#[test]
fn creation_order_not_registration_order_drives_disposal() {
    let log = new_log();
    let mut services = ServiceCollection::new();
    for name in NAMES {
        let l = log.clone();
        services
            .add_named_scoped_factory::<SyncService, _>(name, move |_| SyncService {
                name,
                log: l.clone(),
                fail: false,
            })
            .disposable();
    }

    let provider = services.build();
    let scope = provider.create_scope().unwrap();
    for name in ["S3", "S1", "S5"] {
        scope.get_named_required::<SyncService>(name);
    }

    scope.dispose().unwrap();
    assert_eq!(entries(&log), vec!["S5", "S1", "S3"]);
}

#[test]
fn repeated_resolution_tracks_a_cached_instance_once() {
    let log = new_log();
    let l = log.clone();
    let mut services = ServiceCollection::new();
    services
        .add_scoped_factory::<SyncService, _>(move |_| SyncService {
            name: "once",
            log: l.clone(),
            fail: false,
        })
        .disposable();

    let provider = services.build();
    let scope = provider.create_scope().unwrap();
    for _ in 0..3 {
        scope.get_required::<SyncService>();
    }
    assert_eq!(scope.tracked_count(), 1);

    scope.dispose().unwrap();
    assert_eq!(entries(&log), vec!["once"]);
}

#[tokio::test]
async fn mixed_sync_and_async_scoped_and_per_resolution_instances_are_all_disposed() {
    let log = new_log();
    let mut services = ServiceCollection::new();
    let l = log.clone();
    services
        .add_scoped_factory::<SyncService, _>(move |_| SyncService {
            name: "scoped-sync",
            log: l.clone(),
            fail: false,
        })
        .disposable();
    let l = log.clone();
    services
        .add_scoped_factory::<AsyncService, _>(move |_| AsyncService {
            name: "scoped-async",
            log: l.clone(),
        })
        .async_disposable();
    let l = log.clone();
    services
        .add_named_per_resolution_factory::<SyncService, _>("transient", move |_| SyncService {
            name: "per-resolution-sync",
            log: l.clone(),
            fail: false,
        })
        .disposable();
    let l = log.clone();
    services
        .add_named_per_resolution_factory::<AsyncService, _>("transient", move |_| AsyncService {
            name: "per-resolution-async",
            log: l.clone(),
        })
        .async_disposable();

    let provider = services.build();
    let scope = provider.create_scope().unwrap();
    scope.get_required::<SyncService>();
    scope.get_required::<AsyncService>();
    scope.get_named_required::<SyncService>("transient");
    scope.get_named_required::<AsyncService>("transient");

    scope.dispose_async().await.unwrap();
    assert_eq!(
        entries(&log),
        vec!["per-resolution-async", "per-resolution-sync", "scoped-async", "scoped-sync"]
    );
}

#[tokio::test]
async fn named_sync_and_async_singletons_of_one_contract_are_both_disposed() {
    struct AsyncOnly(AsyncService);

    #[async_trait]
    impl AsyncDispose for AsyncOnly {
        async fn dispose_async(&self) -> DisposeResult {
            self.0.dispose_async().await
        }
    }

    let log = new_log();
    let mut services = ServiceCollection::new();
    let l = log.clone();
    services
        .add_named_singleton_factory::<SyncService, _>("sync", move |_| SyncService {
            name: "sync",
            log: l.clone(),
            fail: false,
        })
        .disposable();
    let l = log.clone();
    services
        .add_named_singleton_factory::<AsyncOnly, _>("async", move |_| {
            AsyncOnly(AsyncService { name: "async", log: l.clone() })
        })
        .async_disposable();

    let provider = services.build();
    // Resolution order must not matter
    provider.get_named_required::<AsyncOnly>("async");
    provider.get_named_required::<SyncService>("sync");

    provider.dispose_async().await.unwrap();
    let mut disposed = entries(&log);
    disposed.sort();
    assert_eq!(disposed, vec!["async", "sync"]);
}

#[tokio::test]
async fn async_entry_point_prefers_the_async_protocol() {
    let log = new_log();
    let l = log.clone();
    let mut services = ServiceCollection::new();
    services
        .add_scoped_factory::<DualService, _>(move |_| DualService { name: "dual", log: l.clone() })
        .disposable()
        .async_disposable();

    let provider = services.build();
    let sync_scope = provider.create_scope().unwrap();
    sync_scope.get_required::<DualService>();
    sync_scope.dispose().unwrap();

    let async_scope = provider.create_scope().unwrap();
    async_scope.get_required::<DualService>();
    async_scope.dispose_async().await.unwrap();

    assert_eq!(entries(&log), vec!["sync:dual", "async:dual"]);
}

#[test]
fn sync_entry_point_reports_async_only_instances_and_keeps_going() {
    let log = new_log();
    let mut services = ServiceCollection::new();
    let l = log.clone();
    services
        .add_scoped_factory::<SyncService, _>(move |_| SyncService {
            name: "first",
            log: l.clone(),
            fail: false,
        })
        .disposable();
    let l = log.clone();
    services
        .add_scoped_factory::<AsyncService, _>(move |_| AsyncService { name: "second", log: l.clone() })
        .async_disposable();

    let provider = services.build();
    let scope = provider.create_scope().unwrap();
    scope.get_required::<SyncService>();
    scope.get_required::<AsyncService>();

    let err = scope.dispose().unwrap_err();
    match &err {
        DiError::Disposal(failure) => {
            assert!(failure.error().is::<RequiresAsyncDisposal>());
            assert_eq!(failure.position(), 1);
            assert!(failure.service().contains("AsyncService"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(entries(&log), vec!["first"]);
}

#[test]
fn a_failing_disposal_does_not_stop_earlier_instances() {
    let log = new_log();
    let mut services = ServiceCollection::new();
    for (name, fail) in [("S1", false), ("S2", true), ("S3", false)] {
        let l = log.clone();
        services
            .add_named_scoped_factory::<SyncService, _>(name, move |_| SyncService {
                name,
                log: l.clone(),
                fail,
            })
            .disposable();
    }

    let provider = services.build();
    let scope = provider.create_scope().unwrap();
    for name in ["S1", "S2", "S3"] {
        scope.get_named_required::<SyncService>(name);
    }

    let err = scope.dispose().unwrap_err();
    assert_eq!(entries(&log), vec!["S3", "S2", "S1"]);
    assert_eq!(err.failures().len(), 1);
    assert_eq!(err.failures()[0].error().to_string(), "S2 refused to close");
    assert_eq!(err.failures()[0].scope(), scope.id());
}

#[test]
fn several_failures_are_aggregated_in_encounter_order() {
    let log = new_log();
    let mut services = ServiceCollection::new();
    for (name, fail) in [("S1", true), ("S2", false), ("S3", true)] {
        let l = log.clone();
        services
            .add_named_scoped_factory::<SyncService, _>(name, move |_| SyncService {
                name,
                log: l.clone(),
                fail,
            })
            .disposable();
    }

    let provider = services.build();
    let scope = provider.create_scope().unwrap();
    for name in ["S1", "S2", "S3"] {
        scope.get_named_required::<SyncService>(name);
    }

    match scope.dispose().unwrap_err() {
        DiError::Aggregate(failures) => {
            let messages: Vec<_> = failures.iter().map(|f| f.error().to_string()).collect();
            assert_eq!(messages, vec!["S3 refused to close", "S1 refused to close"]);
            let positions: Vec<_> = failures.iter().map(|f| f.position()).collect();
            assert_eq!(positions, vec![2, 0]);
        }
        other => panic!("expected an aggregate, got {:?}", other),
    }
    assert_eq!(entries(&log).len(), 3);
}

#[test]
fn second_dispose_is_a_silent_no_op() {
    let log = new_log();
    let l = log.clone();
    let mut services = ServiceCollection::new();
    services
        .add_scoped_factory::<SyncService, _>(move |_| SyncService {
            name: "failing",
            log: l.clone(),
            fail: true,
        })
        .disposable();

    let provider = services.build();
    let scope = provider.create_scope().unwrap();
    scope.get_required::<SyncService>();

    assert!(scope.dispose().is_err());
    assert!(scope.dispose().is_ok());
    assert_eq!(entries(&log), vec!["failing"]);
}

#[test]
fn helpers_registered_from_factories_interleave_with_container_instances() {
    let log = new_log();
    let mut services = ServiceCollection::new();
    let l = log.clone();
    services
        .add_scoped_factory::<SyncService, _>(move |r| {
            let helper = Arc::new(SyncService {
                name: "helper",
                log: l.clone(),
                fail: false,
            });
            r.register_disposer(helper.clone()).unwrap();
            // Registering the same instance again is a no-op
            assert!(!r.register_disposer(helper).unwrap());
            SyncService {
                name: "service",
                log: l.clone(),
                fail: false,
            }
        })
        .disposable();

    let provider = services.build();
    let scope = provider.create_scope().unwrap();
    scope.get_required::<SyncService>();
    assert_eq!(scope.tracked_count(), 2);

    scope.dispose().unwrap();
    assert_eq!(entries(&log), vec!["service", "helper"]);
}

#[tokio::test]
async fn disposable_trait_objects_are_released_through_their_implementation() {
    trait Store: Dispose + AsyncDispose {
        fn name(&self) -> &'static str;
    }
    impl Store for DualService {
        fn name(&self) -> &'static str {
            self.name
        }
    }

    let log = new_log();
    let l = log.clone();
    let mut services = ServiceCollection::new();
    services
        .add_trait_factory::<dyn Store, _>(ferrous_lifetime::Lifetime::Scoped, move |_| {
            Arc::new(DualService { name: "store", log: l.clone() })
        })
        .disposable()
        .async_disposable();

    let provider = services.build();
    let scope = provider.create_scope().unwrap();
    assert_eq!(scope.get_required_trait::<dyn Store>().name(), "store");
    assert_eq!(scope.tracked_count(), 1);

    scope.dispose_async().await.unwrap();
    assert_eq!(entries(&log), vec!["async:store"]);
}

#[test]
fn instances_without_a_declared_protocol_are_not_tracked() {
    let log = new_log();
    let l = log.clone();
    let mut services = ServiceCollection::new();
    services.add_scoped_factory::<SyncService, _>(move |_| SyncService {
        name: "undeclared",
        log: l.clone(),
        fail: false,
    });

    let provider = services.build();
    let scope = provider.create_scope().unwrap();
    scope.get_required::<SyncService>();
    assert_eq!(scope.tracked_count(), 0);
    scope.dispose().unwrap();
    assert!(entries(&log).is_empty());
}

#![no_main]

use libfuzzer_sys::fuzz_target;
use ferrous_lifetime::{Dispose, DisposeResult, Resolver, Scope, ServiceCollection};
use std::sync::{Arc, Mutex};

struct Probe {
    serial: usize,
    log: Arc<Mutex<Vec<usize>>>,
}

impl Dispose for Probe {
    fn dispose(&self) -> DisposeResult {
        self.log.lock().unwrap().push(self.serial);
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let log = Arc::new(Mutex::new(Vec::new()));
    let created = Arc::new(Mutex::new(0usize));

    let mut services = ServiceCollection::new();
    let (l, c) = (log.clone(), created.clone());
    services
        .add_scoped_factory::<Probe, _>(move |_| {
            let mut created = c.lock().unwrap();
            *created += 1;
            Probe { serial: *created, log: l.clone() }
        })
        .disposable();
    let (l, c) = (log.clone(), created.clone());
    services
        .add_named_per_resolution_factory::<Probe, _>("fresh", move |_| {
            let mut created = c.lock().unwrap();
            *created += 1;
            Probe { serial: *created, log: l.clone() }
        })
        .disposable();

    let provider = services.build();
    let mut scopes: Vec<Scope> = Vec::new();

    for pair in data.chunks(2) {
        let op = pair[0] % 6;
        let target = pair.get(1).copied().unwrap_or(0) as usize;
        let scope = if scopes.is_empty() {
            None
        } else {
            Some(scopes[target % scopes.len()].clone())
        };

        match (op, scope) {
            (0, _) | (_, None) => {
                if let Ok(scope) = provider.create_scope() {
                    scopes.push(scope);
                }
            }
            (1, Some(scope)) => {
                if let Ok(child) = scope.begin_child_scope() {
                    scopes.push(child);
                }
            }
            (2, Some(scope)) => {
                let _ = scope.get::<Probe>();
            }
            (3, Some(scope)) => {
                let _ = scope.get_named::<Probe>("fresh");
            }
            (4, Some(scope)) => {
                assert!(scope.dispose().is_ok());
                assert!(scope.is_disposed());
            }
            (_, Some(scope)) => {
                let _ = scope.dispose();
                assert!(scope.dispose().is_ok());
            }
        }
    }

    assert!(provider.dispose().is_ok());

    // Every instance is released exactly once
    let mut released = log.lock().unwrap().clone();
    released.sort_unstable();
    let expected: Vec<usize> = (1..=*created.lock().unwrap()).collect();
    assert_eq!(released, expected);
});

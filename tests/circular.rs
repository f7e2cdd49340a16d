use ferrous_lifetime::{DiError, Dispose, DisposeResult, Lifetime, Resolver, ServiceCollection};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_self_circular_dependency() {
    struct SelfReferencing;

    let mut sc = ServiceCollection::new();
    sc.add_try_factory::<SelfReferencing, _>(Lifetime::Transient, |r| {
        r.get::<SelfReferencing>()?;
        Ok(SelfReferencing)
    });

    let sp = sc.build();
    match sp.get::<SelfReferencing>() {
        Err(DiError::Circular(path)) => {
            assert_eq!(path.len(), 2);
            assert!(path[0].contains("SelfReferencing"));
            assert!(path[1].contains("SelfReferencing"));
        }
        _ => panic!("Expected Circular error"),
    }
}

#[test]
fn test_three_level_circular_in_scope() {
    struct A;
    struct B;
    struct C;

    let mut sc = ServiceCollection::new();
    sc.add_try_factory::<A, _>(Lifetime::Scoped, |r| {
        r.get::<B>()?;
        Ok(A)
    });
    sc.add_try_factory::<B, _>(Lifetime::PerResolution, |r| {
        r.get::<C>()?;
        Ok(B)
    });
    sc.add_try_factory::<C, _>(Lifetime::Scoped, |r| {
        r.get::<A>()?;
        Ok(C)
    });

    let sp = sc.build();
    let scope = sp.create_scope().unwrap();
    match scope.get::<A>() {
        Err(DiError::Circular(path)) => {
            assert_eq!(path.len(), 4);
            assert!(path[0].ends_with("A"));
            assert!(path[1].ends_with("B"));
            assert!(path[2].ends_with("C"));
            assert!(path[3].ends_with("A"));
        }
        _ => panic!("Expected Circular error"),
    }
}

#[test]
fn test_failed_cycle_tracks_nothing() {
    struct Leaf;
    impl Dispose for Leaf {
        fn dispose(&self) -> DisposeResult {
            Ok(())
        }
    }
    struct Loop;

    let mut sc = ServiceCollection::new();
    sc.add_try_factory::<Loop, _>(Lifetime::Scoped, |r| {
        r.get::<Leaf>()?;
        r.get::<Loop>()?;
        Ok(Loop)
    });
    sc.add_per_resolution_factory::<Leaf, _>(|_| Leaf).disposable();

    let sp = sc.build();
    let scope = sp.create_scope().unwrap();
    assert!(matches!(scope.get::<Loop>(), Err(DiError::Circular(_))));
    // The leaf built before the cycle was detected is still owned by the scope
    assert_eq!(scope.tracked_count(), 1);
    scope.dispose().unwrap();
}

#[test]
fn test_diamond_is_not_a_cycle() {
    struct Shared;
    struct Left(Arc<Shared>);
    struct Right(Arc<Shared>);
    struct Top;

    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();

    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<Shared, _>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Shared
    });
    sc.add_scoped_factory::<Left, _>(|r| Left(r.get_required::<Shared>()));
    sc.add_scoped_factory::<Right, _>(|r| Right(r.get_required::<Shared>()));
    sc.add_try_factory::<Top, _>(Lifetime::Scoped, |r| {
        let left = r.get::<Left>()?;
        let right = r.get::<Right>()?;
        assert!(Arc::ptr_eq(&left.0, &right.0));
        Ok(Top)
    });

    let sp = sc.build();
    let scope = sp.create_scope().unwrap();
    assert!(scope.get::<Top>().is_ok());
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

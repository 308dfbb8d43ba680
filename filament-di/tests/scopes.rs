use filament_di::binding::Binding;
use filament_di::error::ResolveError;
use filament_di::injector::{provider_type_of, Injector, InjectorBuilder};
use filament_di::key::{Dependency, Instance};
use filament_di::scope::{
    ApplicationScope, Expiry, RepositoryPtr, Scope, ScopePtr, DEPENDENCY_TYPE, INJECTION,
};
use filament_di::supplier::{factory, produce};
use filament_di::ty::Type;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

struct Service;

#[test]
fn application_scope_should_return_the_identical_instance() {
    let injector = Injector::new(vec![Binding::new(
        Instance::of(Type::of::<Service>()),
        factory(|| Service),
    )])
    .unwrap();

    let first = injector.resolve_typed::<Service>().unwrap();
    let second = injector.resolve_typed::<Service>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn injection_scope_should_produce_fresh_instances() {
    let injector = Injector::new(vec![Binding::new(
        Instance::of(Type::of::<Service>()),
        factory(|| Service),
    )
    .in_scope(INJECTION)])
    .unwrap();

    let first = injector.resolve_typed::<Service>().unwrap();
    let second = injector.resolve_typed::<Service>().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn dependency_type_scope_should_cache_per_exact_resolved_type() {
    struct Pool;

    let injector = Injector::new(vec![Binding::new(
        Instance::of(Type::of::<Pool>()),
        produce(|dependency, _| Ok(dependency.instance().ty.to_string())),
    )
    .in_scope(DEPENDENCY_TYPE)])
    .unwrap();

    let ints = Type::of::<Pool>().parameterized([Type::of::<i32>()]);
    let strings = Type::of::<Pool>().parameterized([Type::of::<String>()]);

    let first = injector
        .resolve_instance::<String>(&Dependency::of(ints.clone()))
        .unwrap();
    let again = injector
        .resolve_instance::<String>(&Dependency::of(ints))
        .unwrap();
    let other = injector
        .resolve_instance::<String>(&Dependency::of(strings))
        .unwrap();

    assert!(Arc::ptr_eq(&first, &again));
    assert!(!Arc::ptr_eq(&first, &other));
    assert_ne!(*first, *other);
}

#[test]
fn concurrent_first_resolution_should_produce_exactly_once() {
    let produced = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&produced);
    let injector = Injector::new(vec![Binding::new(
        Instance::of(Type::of::<Service>()),
        factory(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            // widen the race window
            thread::sleep(Duration::from_millis(50));
            Service
        }),
    )])
    .unwrap();

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let injector = injector.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                injector.resolve_typed::<Service>().unwrap()
            })
        })
        .collect();

    let instances: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(produced.load(Ordering::SeqCst), 1);
    assert!(instances
        .iter()
        .all(|instance| Arc::ptr_eq(instance, &instances[0])));
}

struct SessionScope;

impl Scope for SessionScope {
    fn init(&self) -> RepositoryPtr {
        ApplicationScope.init()
    }

    fn expiry(&self) -> Expiry {
        Expiry::Expires(5)
    }
}

fn session_injector() -> Injector {
    InjectorBuilder::new()
        .with_scope("SESSION", Box::new(SessionScope) as ScopePtr)
        .bind(Binding::new(Instance::of(Type::of::<u8>()), factory(|| 9u8)).in_scope("SESSION"))
        .build()
        .unwrap()
}

#[test]
fn expiring_instance_should_not_inject_into_longer_lived_target() {
    struct Holder;

    let injector = session_injector();
    let target = Instance::of(Type::of::<Holder>());
    let direct = Dependency::of(Type::of::<u8>())
        .injecting_into(target.clone(), Expiry::Never)
        .unwrap();

    assert!(matches!(
        injector.resolve(&direct).unwrap_err(),
        ResolveError::UnstableDependency { .. }
    ));

    // deferred access through the provider bridge is allowed
    let deferred = Dependency::of(provider_type_of(Type::of::<u8>()))
        .injecting_into(target, Expiry::Never)
        .unwrap();
    let provider = injector
        .resolve_instance::<filament_di::injector::Provider>(&deferred)
        .unwrap();
    assert_eq!(*provider.get_typed::<u8>().unwrap(), 9);
}

#[test]
fn provider_should_observe_singleton_semantics_of_its_scope() {
    let injector = session_injector();

    let provider = injector.provider_of::<u8>().unwrap();
    let first = provider.get_typed::<u8>().unwrap();
    let second = provider.get_typed::<u8>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

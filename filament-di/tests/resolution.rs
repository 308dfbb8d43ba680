use filament_di::binding::Binding;
use filament_di::error::ResolveError;
use filament_di::injector::{list_type_of, Injector};
use filament_di::key::{Dependency, Instance, Name};
use filament_di::scope::INJECTION;
use filament_di::supplier::{constant, factory, instance_ref, produce, required, value_eq, Value};
use filament_di::ty::Type;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn i32_binding(name: Name, value: i32) -> Binding {
    Binding::new(Instance::named(name, Type::of::<i32>()), constant(value))
        .with_value_eq(value_eq::<i32>())
}

fn injector(bindings: Vec<Binding>) -> Injector {
    Injector::new(bindings).unwrap()
}

#[test]
fn named_binding_should_win_for_named_request() {
    let injector = injector(vec![
        i32_binding(Name::Default, 1),
        i32_binding(Name::named("foo"), 7),
    ]);

    assert_eq!(*injector.resolve_named::<i32>("foo").unwrap(), 7);
    assert_eq!(*injector.resolve_typed::<i32>().unwrap(), 1);
}

#[test]
fn wildcard_request_should_resolve_to_most_precise_binding() {
    let injector = injector(vec![
        i32_binding(Name::Default, 1),
        i32_binding(Name::named("foo"), 7),
    ]);

    // repeated resolution is deterministic
    for _ in 0..3 {
        assert_eq!(*injector.resolve_named::<i32>(Name::Any).unwrap(), 7);
    }
}

#[test]
fn unbound_type_should_be_unresolvable() {
    let injector = injector(vec![i32_binding(Name::Default, 1)]);

    assert!(matches!(
        injector.resolve_typed::<String>().unwrap_err(),
        ResolveError::NoMatchingBinding { .. }
    ));
}

#[test]
fn bound_raw_type_with_incompatible_name_should_be_unresolvable() {
    let injector = injector(vec![
        i32_binding(Name::named("foo"), 7),
        i32_binding(Name::named("bar"), 8),
    ]);

    assert!(matches!(
        injector.resolve_typed::<i32>().unwrap_err(),
        ResolveError::NoMatchingBinding { .. }
    ));
}

#[test]
fn multiple_named_elements_can_be_bound_and_aggregated() {
    let injector = injector(vec![
        i32_binding(Name::Default, 1),
        i32_binding(Name::named("foo"), 2),
        i32_binding(Name::named("bar"), 4),
        i32_binding(Name::Default, 11),
        i32_binding(Name::named("foo"), 3),
        i32_binding(Name::named("bar"), 5),
    ]);

    let foos: Vec<i32> = injector
        .resolve_all::<i32>("foo")
        .unwrap()
        .iter()
        .map(|value| **value)
        .collect();
    assert_eq!(foos, vec![2, 3]);

    let defaults: Vec<i32> = injector
        .resolve_all::<i32>(Name::Default)
        .unwrap()
        .iter()
        .map(|value| **value)
        .collect();
    assert_eq!(defaults, vec![1, 11]);

    let mut all: Vec<i32> = injector
        .resolve_all::<i32>(Name::Any)
        .unwrap()
        .iter()
        .map(|value| **value)
        .collect();
    all.sort_unstable();
    assert_eq!(all, vec![1, 2, 3, 4, 5, 11]);
}

#[test]
fn empty_aggregation_should_be_valid_unless_demanded_otherwise() {
    let injector = injector(vec![]);

    assert!(injector.resolve_all::<i32>(Name::Any).unwrap().is_empty());

    let demanding = Dependency::of(Type::of::<i32>().array_type())
        .named(Name::Any)
        .non_empty();
    assert!(matches!(
        injector.resolve(&demanding).unwrap_err(),
        ResolveError::EmptyAggregation(..)
    ));
}

#[test]
fn list_bridge_should_preserve_declaration_order() {
    let injector = injector(vec![
        i32_binding(Name::Default, 5),
        i32_binding(Name::Default, 6),
        i32_binding(Name::Default, 7),
    ]);

    let request = Dependency::of(list_type_of(Type::of::<i32>()));
    let list = injector
        .resolve_instance::<Vec<Value>>(&request)
        .unwrap();
    let values: Vec<i32> = list
        .iter()
        .map(|value| *value.downcast_ref::<i32>().unwrap())
        .collect();
    assert_eq!(values, vec![5, 6, 7]);
}

#[test]
fn set_bridge_should_collapse_duplicates_by_value() {
    let injector = injector(vec![
        i32_binding(Name::Default, 1),
        i32_binding(Name::Default, 2),
        i32_binding(Name::Default, 2),
    ]);

    let mut set: Vec<i32> = injector
        .resolve_set::<i32>(Name::Any)
        .unwrap()
        .iter()
        .map(|value| **value)
        .collect();
    set.sort_unstable();
    assert_eq!(set, vec![1, 2]);

    let list: Vec<i32> = injector
        .resolve_all::<i32>(Name::Any)
        .unwrap()
        .iter()
        .map(|value| **value)
        .collect();
    assert_eq!(list, vec![1, 2, 2]);
}

#[test]
fn set_collapsing_should_only_consult_witnesses_of_contributing_bindings() {
    // the named binding carries a by-value witness but does not apply to default requests;
    // the contributing bindings have none, so equal values in distinct instances both survive
    let injector = injector(vec![
        Binding::new(Instance::named("other", Type::of::<i32>()), constant(9))
            .with_value_eq(value_eq::<i32>()),
        Binding::new(Instance::of(Type::of::<i32>()), constant(2)),
        Binding::new(Instance::of(Type::of::<i32>()), constant(2)),
    ]);

    let values: Vec<i32> = injector
        .resolve_set::<i32>(Name::Default)
        .unwrap()
        .iter()
        .map(|value| **value)
        .collect();
    assert_eq!(values, vec![2, 2]);
}

#[test]
fn direct_binding_should_beat_bridge_synthesis() {
    let list_instance = Instance::of(list_type_of(Type::of::<i32>()));
    let injector = injector(vec![
        i32_binding(Name::Default, 1),
        Binding::new(list_instance.clone(), constant("direct".to_string())),
    ]);

    let direct = injector
        .resolve_instance::<String>(&Dependency::on(list_instance))
        .unwrap();
    assert_eq!(*direct, "direct");
}

#[test]
fn provider_bridge_should_defer_resolution() {
    let produced = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&produced);
    let injector = injector(vec![Binding::new(
        Instance::of(Type::of::<usize>()),
        factory(move || counter.fetch_add(1, Ordering::SeqCst)),
    )
    .in_scope(INJECTION)]);

    let provider = injector.provider_of::<usize>().unwrap();
    assert_eq!(produced.load(Ordering::SeqCst), 0);

    // unscoped: each deferred access produces a fresh value
    assert_eq!(*provider.get_typed::<usize>().unwrap(), 0);
    assert_eq!(*provider.get_typed::<usize>().unwrap(), 1);
    assert_eq!(produced.load(Ordering::SeqCst), 2);
}

#[test]
fn targeted_binding_should_apply_only_when_injecting_into_its_target() {
    struct Holder(Arc<i32>);

    let holder_instance = Instance::of(Type::of::<Holder>());
    let injector = injector(vec![
        i32_binding(Name::Default, 1),
        Binding::new(Instance::of(Type::of::<i32>()), constant(2))
            .injecting_into(holder_instance.clone()),
        Binding::new(
            holder_instance,
            produce(|dependency, injector| {
                let value = injector.resolve_instance::<i32>(
                    &dependency
                        .clone()
                        .instanced(Instance::of(Type::of::<i32>())),
                )?;
                Ok(Holder(value))
            }),
        ),
    ]);

    assert_eq!(*injector.resolve_typed::<Holder>().unwrap().0, 2);
    assert_eq!(*injector.resolve_typed::<i32>().unwrap(), 1);
}

#[test]
fn reference_binding_should_resolve_its_referent() {
    let injector = injector(vec![
        i32_binding(Name::Default, 42),
        Binding::new(
            Instance::named("alias", Type::of::<i32>()),
            instance_ref(Instance::of(Type::of::<i32>())),
        ),
    ]);

    assert_eq!(*injector.resolve_named::<i32>("alias").unwrap(), 42);
}

#[test]
fn unfulfilled_required_binding_should_fail_loudly() {
    let injector = injector(vec![Binding::new(
        Instance::of(Type::of::<String>()),
        required(),
    )]);

    assert!(matches!(
        injector.resolve_typed::<String>().unwrap_err(),
        ResolveError::RequiredNotProvided(..)
    ));
}

#[test]
fn self_referential_binding_should_be_reported_as_cycle() {
    let injector = injector(vec![Binding::new(
        Instance::of(Type::of::<i32>()),
        instance_ref(Instance::of(Type::of::<i32>())),
    )]);

    assert!(matches!(
        injector.resolve_typed::<i32>().unwrap_err(),
        ResolveError::DependencyCycle(..)
    ));
}

#[test]
fn production_failure_should_carry_the_requested_instance() {
    let injector = injector(vec![Binding::new(
        Instance::of(Type::of::<u8>()),
        produce::<u8, _>(|_, _| Err("boom".into())),
    )]);

    match injector.resolve_typed::<u8>().unwrap_err() {
        ResolveError::Production { instance, source } => {
            assert_eq!(instance, Instance::of(Type::of::<u8>()));
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn exact_parameterization_should_beat_erasure_at_resolution() {
    struct Repo;

    let erased = Type::of::<Repo>();
    let exact = erased.clone().parameterized([Type::of::<i32>()]);
    let injector = injector(vec![
        Binding::new(Instance::of(erased.clone()), constant("erased".to_string())),
        Binding::new(Instance::of(exact.clone()), constant("ints".to_string())),
    ]);

    let for_exact = injector
        .resolve_instance::<String>(&Dependency::of(exact.clone()))
        .unwrap();
    assert_eq!(*for_exact, "ints");

    let for_erased = injector
        .resolve_instance::<String>(&Dependency::of(erased))
        .unwrap();
    assert_eq!(*for_erased, "erased");

    let for_bound = injector
        .resolve_instance::<String>(&Dependency::of(exact.as_upper_bound()))
        .unwrap();
    assert_eq!(*for_bound, "ints");
}

#[test]
fn resolution_should_survive_reentrant_producers() {
    struct Outer(Arc<Inner>);
    struct Inner(i32);

    let injector = injector(vec![
        Binding::new(
            Instance::of(Type::of::<Inner>()),
            produce(|dependency, injector| {
                let value = injector.resolve_instance::<i32>(
                    &dependency
                        .clone()
                        .instanced(Instance::of(Type::of::<i32>())),
                )?;
                Ok(Inner(*value))
            }),
        ),
        Binding::new(
            Instance::of(Type::of::<Outer>()),
            produce(|dependency, injector| {
                let inner = injector.resolve_instance::<Inner>(
                    &dependency
                        .clone()
                        .instanced(Instance::of(Type::of::<Inner>())),
                )?;
                Ok(Outer(inner))
            }),
        ),
        i32_binding(Name::Default, 3),
    ]);

    assert_eq!(injector.resolve_typed::<Outer>().unwrap().0 .0, 3);
    assert_eq!(injector.binding_count(), 3);
}

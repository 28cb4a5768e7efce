#![forbid(unsafe_code)]

//! Integration tests: render coalescing and no-op detection.

use elementa_core::{ChangeType, PropertySpec, PropsSpec, Value};
use elementa_harness::strategies::{category, numbers};
use elementa_harness::{Fixture, TestComponent};
use elementa_runtime::{RuntimeConfig, Runtime};
use proptest::prelude::*;

fn five_numbers() -> PropsSpec {
    (0..5).fold(PropsSpec::new(), |spec, i| {
        spec.reflect(format!("p{i}"), PropertySpec::number())
    })
}

fn mounted(runtime: &Runtime) -> Fixture {
    let fx = Fixture::mount(runtime, "x-coalesce", TestComponent::new());
    let _ready = fx.define(&five_numbers());
    fx.element.connect();
    runtime.flush();
    fx
}

// ============================================================================
// Coalescing
// ============================================================================

proptest! {
    #[test]
    fn one_render_per_turn_with_merged_mask(categories in prop::collection::vec(category(), 1..40)) {
        let runtime = Runtime::new();
        let fx = mounted(&runtime);
        let before = fx.render_count();

        let mut expected = ChangeType::empty();
        for (i, change) in categories.iter().enumerate() {
            if *change == ChangeType::PROP {
                let key = format!("p{}", i % 5);
                fx.props().set(&key, i32::try_from(i).unwrap() + 1).unwrap();
            } else {
                fx.element.request_render(*change);
            }
            expected |= *change;
        }
        prop_assert_eq!(fx.render_count(), before);

        runtime.flush();
        prop_assert_eq!(fx.render_count(), before + 1);
        prop_assert_eq!(fx.last_change(), Some(expected));

        runtime.flush();
        prop_assert_eq!(fx.render_count(), before + 1);
    }

    #[test]
    fn rewriting_the_current_value_is_silent(values in numbers(12)) {
        let runtime = Runtime::new();
        let fx = mounted(&runtime);
        for v in &values {
            fx.props().set("p0", *v).unwrap();
        }
        runtime.flush();
        let renders = fx.render_count();
        let events = fx.record_prop_changes();

        let last = *values.last().unwrap();
        prop_assert_eq!(fx.props().set("p0", last), Ok(false));
        fx.element.set_attribute("p0", &last.to_string());
        runtime.flush();

        prop_assert!(events.is_empty());
        prop_assert_eq!(fx.render_count(), renders);
    }
}

#[test]
fn separate_turns_render_separately() {
    let runtime = Runtime::new();
    let fx = mounted(&runtime);
    fx.props().set("p0", 1).unwrap();
    runtime.flush();
    fx.props().set("p1", 2).unwrap();
    runtime.flush();
    assert_eq!(
        fx.changes(),
        vec![ChangeType::ALWAYS, ChangeType::PROP, ChangeType::PROP]
    );
}

#[test]
fn separate_components_render_independently() {
    let runtime = Runtime::new();
    let a = mounted(&runtime);
    let b = mounted(&runtime);
    a.props().set("p0", 1).unwrap();
    b.element.request_render(ChangeType::THEME);
    b.element.request_render(ChangeType::LANG);
    runtime.flush();
    assert_eq!(a.last_change(), Some(ChangeType::PROP));
    assert_eq!(b.last_change(), Some(ChangeType::THEME | ChangeType::LANG));
}

#[test]
fn structurally_equal_object_is_still_a_new_value() {
    let runtime = Runtime::new();
    let fx = Fixture::mount(&runtime, "x-obj", TestComponent::new());
    let _ready = fx.define(&PropsSpec::new().reflect("data", PropertySpec::complex()));
    fx.element.connect();
    fx.props()
        .set("data", Value::object([("a", Value::from(1))]))
        .unwrap();
    runtime.flush();
    let renders = fx.render_count();

    assert_eq!(
        fx.props().set("data", Value::object([("a", Value::from(1))])),
        Ok(true)
    );
    runtime.flush();
    assert_eq!(fx.render_count(), renders + 1);
}

#[test]
fn nan_attribute_twice_renders_once() {
    let runtime = Runtime::new();
    let fx = mounted(&runtime);
    fx.element.set_attribute("p2", "abc");
    runtime.flush();
    let renders = fx.render_count();
    assert!(fx.props().get("p2").as_f64().is_some_and(f64::is_nan));

    fx.element.set_attribute("p2", "xyz");
    runtime.flush();
    assert_eq!(fx.render_count(), renders);
}

#[test]
fn self_rescheduling_render_stops_at_turn_limit() {
    let runtime = Runtime::with_config(RuntimeConfig::default().with_max_flush_turns(4));
    let fx = mounted(&runtime);
    let again = fx.element.downgrade();
    let _sub = fx.element.on_render(move |_| {
        if let Some(el) = again.upgrade() {
            el.request_render(ChangeType::PROP);
        }
    });

    fx.element.request_render(ChangeType::PROP);
    let stats = runtime.flush();
    assert!(stats.truncated);
    assert_eq!(stats.turns, 4);
    assert!(runtime.has_pending_work());
}

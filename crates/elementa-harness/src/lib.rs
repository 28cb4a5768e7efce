#![forbid(unsafe_code)]

//! Test fixtures for elementa.
//!
//! [`TestComponent`] is a host with an in-memory attribute store that
//! records every render it receives, optionally running templates and
//! keeping their text output. [`Fixture`] bundles it with its [`Element`]
//! and exposes the assertions integration tests need.
//!
//! ```ignore
//! let runtime = Runtime::new();
//! let fx = Fixture::mount(&runtime, "x-counter", TestComponent::new());
//! fx.define(&PropsSpec::new().reflect("x", PropertySpec::number()));
//! fx.element.connect();
//! assert_eq!(fx.render_count(), 1);
//! ```
//!
//! [`strategies`] holds `proptest` strategies shared by the property tests.

use std::cell::RefCell;
use std::rc::Rc;

use elementa_core::{ChangeType, PropsSpec};
use elementa_runtime::{
    AttributeHost, AttributeMap, ChangeNotice, Component, Element, PropChange, Props, Ready,
    Renderable, Runtime, Subscription, Template,
};

// ---------------------------------------------------------------------------
// Test component
// ---------------------------------------------------------------------------

/// One `render_to_dom` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRecord {
    /// Mask the render ran with.
    pub change: ChangeType,
    /// Text of every template, in registration order.
    pub output: Vec<String>,
}

/// Recording host component.
#[derive(Default)]
pub struct TestComponent {
    attributes: AttributeMap,
    owned: Vec<String>,
    templates: Vec<Box<dyn Template>>,
    log: RefCell<Vec<RenderRecord>>,
}

impl TestComponent {
    /// A component with no attributes or templates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `name` set on the host.
    #[must_use]
    pub fn with_attribute(self, name: &str, value: &str) -> Self {
        self.attributes.set_attribute_raw(name, value);
        self
    }

    /// Pretend the component already has a member named `key`.
    #[must_use]
    pub fn owning(mut self, key: &str) -> Self {
        self.owned.push(key.to_owned());
        self
    }

    /// Run `template` on every render.
    #[must_use]
    pub fn with_template(mut self, template: impl Template + 'static) -> Self {
        self.templates.push(Box::new(template));
        self
    }

    /// Every render so far.
    #[must_use]
    pub fn renders(&self) -> Vec<RenderRecord> {
        self.log.borrow().clone()
    }

    /// Render log as JSON, one object per render.
    #[must_use]
    pub fn log_json(&self) -> serde_json::Value {
        let entries = self
            .log
            .borrow()
            .iter()
            .map(|r| {
                serde_json::json!({
                    "change": r.change.bits(),
                    "output": r.output,
                })
            })
            .collect();
        serde_json::Value::Array(entries)
    }
}

impl AttributeHost for TestComponent {
    fn get_attribute(&self, name: &str) -> Option<String> {
        self.attributes.get_attribute(name)
    }

    fn set_attribute_raw(&self, name: &str, value: &str) {
        self.attributes.set_attribute_raw(name, value);
    }

    fn remove_attribute_raw(&self, name: &str) {
        self.attributes.remove_attribute_raw(name);
    }

    fn has_own_property(&self, key: &str) -> bool {
        self.owned.iter().any(|k| k == key)
    }
}

impl Renderable for TestComponent {
    fn render_to_dom(&self, element: &Element, change: ChangeType) {
        let output = self
            .templates
            .iter()
            .map(|t| t.render_as_text(change, element))
            .collect();
        tracing::trace!(component = %element.id(), change = change.bits(), "test component rendered");
        self.log.borrow_mut().push(RenderRecord { change, output });
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// An element and its recording host.
pub struct Fixture {
    /// The runtime element.
    pub element: Element,
    /// Its host.
    pub host: Rc<TestComponent>,
}

impl Fixture {
    /// Create an element for `component`. The element is not connected.
    #[must_use]
    pub fn mount(runtime: &Runtime, tag: &str, component: TestComponent) -> Self {
        let host = Rc::new(component);
        let element = runtime.create_element(tag, Rc::clone(&host) as Rc<dyn Component>);
        Self { element, host }
    }

    /// Compile and define `spec` on the element.
    ///
    /// # Panics
    ///
    /// If `spec` does not compile or properties were already defined.
    #[must_use = "the ready handle reports when initial values are assigned"]
    pub fn define(&self, spec: &PropsSpec) -> Ready {
        let compiled = self
            .element
            .runtime()
            .compile(spec)
            .unwrap_or_else(|e| panic!("spec does not compile: {e}"));
        Props::define(&self.element, &compiled).unwrap_or_else(|e| panic!("define failed: {e}"))
    }

    /// The element's properties.
    #[must_use]
    pub fn props(&self) -> Props {
        self.element.props()
    }

    /// Number of renders recorded.
    #[must_use]
    pub fn render_count(&self) -> usize {
        self.host.log.borrow().len()
    }

    /// Masks of every render, in order.
    #[must_use]
    pub fn changes(&self) -> Vec<ChangeType> {
        self.host.log.borrow().iter().map(|r| r.change).collect()
    }

    /// Mask of the latest render.
    #[must_use]
    pub fn last_change(&self) -> Option<ChangeType> {
        self.host.log.borrow().last().map(|r| r.change)
    }

    /// Template output of the latest render.
    #[must_use]
    pub fn last_output(&self) -> Vec<String> {
        self.host
            .log
            .borrow()
            .last()
            .map(|r| r.output.clone())
            .unwrap_or_default()
    }

    /// Record change notices until the returned recorder is dropped.
    #[must_use]
    pub fn record_changes(&self) -> EventLog<ChangeNotice> {
        let events: Rc<RefCell<Vec<ChangeNotice>>> = Rc::default();
        let sink = Rc::clone(&events);
        let sub = self
            .element
            .listen(move |n| sink.borrow_mut().push(n.clone()));
        EventLog { events, _sub: sub }
    }

    /// Record `prop_change` events until the returned recorder is dropped.
    #[must_use]
    pub fn record_prop_changes(&self) -> EventLog<PropChange> {
        let events: Rc<RefCell<Vec<PropChange>>> = Rc::default();
        let sink = Rc::clone(&events);
        let sub = self
            .element
            .on_prop_change(move |e| sink.borrow_mut().push(e.clone()));
        EventLog { events, _sub: sub }
    }
}

/// Events captured from an element.
pub struct EventLog<E> {
    events: Rc<RefCell<Vec<E>>>,
    _sub: Subscription,
}

impl<E: Clone> EventLog<E> {
    /// Captured events so far.
    #[must_use]
    pub fn events(&self) -> Vec<E> {
        self.events.borrow().clone()
    }

    /// Number of captured events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// Whether nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl EventLog<ChangeNotice> {
    /// Captured notices as `key` or `key:a.b.c` strings.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .map(|n| {
                if n.path.is_empty() {
                    n.key.clone()
                } else {
                    let dotted: Vec<String> = n.path.iter().map(ToString::to_string).collect();
                    format!("{}:{}", n.key, dotted.join("."))
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

pub mod strategies {
    //! `proptest` strategies for change masks and property writes.

    use elementa_core::ChangeType;
    use proptest::prelude::*;

    /// A single named category.
    pub fn category() -> impl Strategy<Value = ChangeType> {
        prop_oneof![
            Just(ChangeType::PROP),
            Just(ChangeType::THEME),
            Just(ChangeType::LANG),
            Just(ChangeType::SUBTREE_PROPS),
            Just(ChangeType::GLOBAL_PROPS),
        ]
    }

    /// Any mask a template may declare, `NEVER` included.
    pub fn mask() -> impl Strategy<Value = ChangeType> {
        (0_u32..32).prop_map(ChangeType::from_bits_truncate)
    }

    /// Numeric property writes.
    pub fn numbers(max_len: usize) -> impl Strategy<Value = Vec<i32>> {
        proptest::collection::vec(-1000_i32..1000, 1..=max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elementa_core::PropertySpec;
    use elementa_runtime::TemplateFn;

    #[test]
    fn records_renders_with_template_output() {
        let runtime = Runtime::new();
        let component = TestComponent::new()
            .with_template(TemplateFn::new(ChangeType::PROP, |el: &Element| {
                el.props().get("label").to_string()
            }));
        let fx = Fixture::mount(&runtime, "x-label", component);
        let _ready = fx.define(&PropsSpec::new().reflect("label", PropertySpec::string()));
        fx.element.connect();
        fx.props().set("label", "hi").unwrap();
        runtime.flush();

        assert_eq!(fx.render_count(), 2);
        assert_eq!(fx.last_output(), vec!["hi"]);
        assert_eq!(
            fx.host.log_json(),
            serde_json::json!([
                {"change": 63, "output": ["undefined"]},
                {"change": 1, "output": ["hi"]},
            ])
        );
    }

    #[test]
    fn event_log_formats_paths() {
        let runtime = Runtime::new();
        let fx = Fixture::mount(&runtime, "x-paths", TestComponent::new());
        let _ready = fx.define(&PropsSpec::new().reflect("data", PropertySpec::complex()));
        fx.element.connect();
        let log = fx.record_changes();
        fx.props()
            .set("data", elementa_core::Value::object([("a", 1.into())]))
            .unwrap();
        fx.props().get("data").set("a", 2);
        assert_eq!(log.paths(), vec!["data", "data:a"]);
    }
}

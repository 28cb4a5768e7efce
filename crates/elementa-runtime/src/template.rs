#![forbid(unsafe_code)]

//! The template contract.
//!
//! A template declares the change categories it depends on once, at
//! creation. On every render the component asks each template to
//! [`render_template`](TemplateFn::render_template) with the incoming
//! mask; the template recomputes only when
//! [`should_recompute`] says so and otherwise returns its cached output.
//!
//! Two caches are kept, both per template instance:
//!
//! - computed output per component, so one template shared by many
//!   components recomputes independently for each;
//! - last written output per [`RenderTarget`], so
//!   [`render_if_new`](TemplateFn::render_if_new) skips identical writes.
//!
//! Computed output is evicted when its component is torn down. A torn-down
//! component can still be rendered through a template, but its output is
//! not cached.
//!
//! A panic inside a template closure propagates to the caller; no cache
//! entry is written for the failed computation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use elementa_core::{ChangeType, should_recompute};

use crate::element::Element;
use crate::reactive::Subscription;
use crate::registry::ComponentId;

static TARGET_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocate a fresh id.
    #[must_use]
    pub fn next() -> Self {
        Self(TARGET_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Somewhere template output is written.
pub trait RenderTarget<T: ?Sized> {
    /// Stable identity of this target.
    fn target_id(&self) -> TargetId;

    /// Replace the target's content with `value`.
    fn write(&self, value: &T);
}

/// Object-safe view of a template, for components holding templates of
/// different output types.
pub trait Template {
    /// Categories this template depends on.
    fn change_on(&self) -> ChangeType;

    /// Render for `element` and format the result as text.
    fn render_as_text(&self, change: ChangeType, element: &Element) -> String;
}

type RenderFn<T> = Box<dyn Fn(&Element) -> T>;
type Cache<V> = Rc<RefCell<AHashMap<ComponentId, V>>>;

/// A template backed by a closure.
pub struct TemplateFn<T> {
    change_on: ChangeType,
    render: RenderFn<T>,
    computed: Cache<T>,
    // Teardown listeners of the components in `computed`.
    evictions: Cache<Subscription>,
    written: RefCell<AHashMap<TargetId, T>>,
}

impl<T: Clone + PartialEq + 'static> TemplateFn<T> {
    /// A template recomputed by `render` for the categories in `change_on`.
    pub fn new(change_on: ChangeType, render: impl Fn(&Element) -> T + 'static) -> Self {
        Self {
            change_on,
            render: Box::new(render),
            computed: Rc::default(),
            evictions: Rc::default(),
            written: RefCell::new(AHashMap::new()),
        }
    }

    /// Declared categories.
    #[must_use]
    pub const fn change_on(&self) -> ChangeType {
        self.change_on
    }

    /// Output for `element` under `change`, recomputed only when needed.
    pub fn render_template(&self, change: ChangeType, element: &Element) -> T {
        let id = element.id();
        let cached = self.computed.borrow().get(&id).cloned();
        if let Some(value) = &cached {
            if !should_recompute(self.change_on, change, true) {
                return value.clone();
            }
        }
        let value = (self.render)(element);
        tracing::trace!(
            component = %id,
            change = change.bits(),
            change_on = self.change_on.bits(),
            "template recomputed"
        );
        if element.is_torn_down() {
            return value;
        }
        if self.computed.borrow_mut().insert(id, value.clone()).is_none() {
            self.evict_on_teardown(element);
        }
        value
    }

    fn evict_on_teardown(&self, element: &Element) {
        let computed = Rc::downgrade(&self.computed);
        let evictions = Rc::downgrade(&self.evictions);
        let hook = element.on_teardown(move |id| {
            if let Some(computed) = computed.upgrade() {
                computed.borrow_mut().remove(id);
            }
            if let Some(evictions) = evictions.upgrade() {
                let hook = evictions.borrow_mut().remove(id);
                drop(hook);
            }
        });
        self.evictions.borrow_mut().insert(element.id(), hook);
    }

    /// Write `value` to `target` unconditionally.
    pub fn render(&self, value: &T, target: &dyn RenderTarget<T>) {
        target.write(value);
        self.written
            .borrow_mut()
            .insert(target.target_id(), value.clone());
    }

    /// Write `value` to `target` unless it equals the last value this
    /// template wrote there. Returns whether it wrote.
    pub fn render_if_new(&self, value: &T, target: &dyn RenderTarget<T>) -> bool {
        let unchanged = self
            .written
            .borrow()
            .get(&target.target_id())
            .is_some_and(|last| last == value);
        if unchanged {
            return false;
        }
        self.render(value, target);
        true
    }

    /// [`render_template`](Self::render_template) then
    /// [`render_if_new`](Self::render_if_new).
    pub fn update(&self, change: ChangeType, element: &Element, target: &dyn RenderTarget<T>) -> bool {
        let value = self.render_template(change, element);
        self.render_if_new(&value, target)
    }

    /// Drop cached output for a component. Teardown does this on its own.
    pub fn forget(&self, id: ComponentId) -> bool {
        self.evictions.borrow_mut().remove(&id);
        self.computed.borrow_mut().remove(&id).is_some()
    }

    /// Number of components with cached output.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.computed.borrow().len()
    }
}

impl<T: Clone + PartialEq + fmt::Display + 'static> Template for TemplateFn<T> {
    fn change_on(&self) -> ChangeType {
        self.change_on
    }

    fn render_as_text(&self, change: ChangeType, element: &Element) -> String {
        self.render_template(change, element).to_string()
    }
}

impl<T> fmt::Debug for TemplateFn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateFn")
            .field("change_on", &self.change_on)
            .field("cached", &self.computed.borrow().len())
            .finish_non_exhaustive()
    }
}

/// A text buffer target that counts writes.
#[derive(Debug)]
pub struct TextTarget {
    id: TargetId,
    text: RefCell<String>,
    writes: std::cell::Cell<usize>,
}

impl TextTarget {
    /// An empty target.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: TargetId::next(),
            text: RefCell::new(String::new()),
            writes: std::cell::Cell::new(0),
        }
    }

    /// Current content.
    #[must_use]
    pub fn text(&self) -> String {
        self.text.borrow().clone()
    }

    /// Number of writes so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl Default for TextTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Display + ?Sized> RenderTarget<T> for TextTarget {
    fn target_id(&self) -> TargetId {
        self.id
    }

    fn write(&self, value: &T) {
        *self.text.borrow_mut() = value.to_string();
        self.writes.set(self.writes.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::test_support::Recorder;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting(change_on: ChangeType) -> (TemplateFn<String>, Rc<Cell<u32>>) {
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let template = TemplateFn::new(change_on, move |el: &Element| {
            counter.set(counter.get() + 1);
            format!("{}:{}", el.tag(), counter.get())
        });
        (template, runs)
    }

    #[test]
    fn recomputes_per_mask() {
        let runtime = Runtime::new();
        let (el, _) = Recorder::element(&runtime, "x-t");
        let (template, runs) = counting(ChangeType::PROP | ChangeType::THEME);

        assert_eq!(template.render_template(ChangeType::LANG, &el), "x-t:1");
        assert_eq!(template.render_template(ChangeType::PROP, &el), "x-t:2");
        assert_eq!(template.render_template(ChangeType::LANG, &el), "x-t:2");
        assert_eq!(template.render_template(ChangeType::ALWAYS, &el), "x-t:3");
        assert_eq!(template.render_template(ChangeType::FORCE, &el), "x-t:4");
        assert_eq!(runs.get(), 4);
    }

    #[test]
    fn never_templates_render_once() {
        let runtime = Runtime::new();
        let (el, _) = Recorder::element(&runtime, "x-n");
        let (template, runs) = counting(ChangeType::NEVER);
        template.render_template(ChangeType::ALWAYS, &el);
        template.render_template(ChangeType::PROP, &el);
        assert_eq!(runs.get(), 1);
        template.render_template(ChangeType::FORCE, &el);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn caches_are_per_component() {
        let runtime = Runtime::new();
        let (a, _) = Recorder::element(&runtime, "x-a");
        let (b, _) = Recorder::element(&runtime, "x-b");
        let (template, runs) = counting(ChangeType::PROP);
        template.render_template(ChangeType::LANG, &a);
        template.render_template(ChangeType::LANG, &b);
        template.render_template(ChangeType::LANG, &a);
        assert_eq!(runs.get(), 2);
        assert_eq!(template.cached_len(), 2);
        assert!(template.forget(a.id()));
        template.render_template(ChangeType::LANG, &a);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn teardown_evicts_cached_output() {
        let runtime = Runtime::new();
        let (template, runs) = counting(ChangeType::PROP);
        let (survivor, _) = Recorder::element(&runtime, "x-keep");
        template.render_template(ChangeType::PROP, &survivor);

        for _ in 0..100 {
            let (el, _) = Recorder::element(&runtime, "x-gone");
            el.connect();
            template.render_template(ChangeType::PROP, &el);
            template.render_template(ChangeType::PROP, &el);
            el.teardown();
        }
        assert_eq!(template.cached_len(), 1);
        assert_eq!(runs.get(), 201);

        let (late, _) = Recorder::element(&runtime, "x-late");
        late.teardown();
        template.render_template(ChangeType::PROP, &late);
        assert_eq!(template.cached_len(), 1);

        assert!(template.forget(survivor.id()));
        survivor.teardown();
        assert_eq!(template.cached_len(), 0);
    }

    #[test]
    fn render_if_new_tracks_each_target() {
        let template = TemplateFn::new(ChangeType::PROP, |_: &Element| 1_u32);
        let first = TextTarget::new();
        let second = TextTarget::new();

        assert!(template.render_if_new(&7, &first));
        assert!(!template.render_if_new(&7, &first));
        assert!(template.render_if_new(&7, &second));
        assert!(template.render_if_new(&8, &first));
        template.render(&8, &first);
        assert_eq!(first.writes(), 3);
        assert_eq!(second.writes(), 1);
        assert_eq!(first.text(), "8");
    }

    #[test]
    fn update_skips_unchanged_output() {
        let runtime = Runtime::new();
        let (el, _) = Recorder::element(&runtime, "x-u");
        let template = TemplateFn::new(ChangeType::PROP, |el: &Element| el.tag().to_uppercase());
        let target = TextTarget::new();
        assert!(template.update(ChangeType::PROP, &el, &target));
        assert!(!template.update(ChangeType::PROP, &el, &target));
        assert_eq!(target.text(), "X-U");
    }

    #[test]
    fn trait_objects_render_text() {
        let runtime = Runtime::new();
        let (el, _) = Recorder::element(&runtime, "x-o");
        let templates: Vec<Box<dyn Template>> = vec![
            Box::new(TemplateFn::new(ChangeType::NEVER, |_: &Element| 42_i64)),
            Box::new(TemplateFn::new(ChangeType::LANG, |el: &Element| el.tag().to_owned())),
        ];
        let texts: Vec<String> = templates
            .iter()
            .map(|t| t.render_as_text(ChangeType::ALWAYS, &el))
            .collect();
        assert_eq!(texts, vec!["42", "x-o"]);
        assert_eq!(templates[1].change_on(), ChangeType::LANG);
    }
}

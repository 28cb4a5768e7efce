#![forbid(unsafe_code)]

//! Per-instance component state and lifecycle.
//!
//! An [`Element`] is the runtime's handle on one component instance. It
//! owns the instance's property table, its connect queue, its event
//! listeners and its place in the component hierarchy, and it intercepts
//! attribute writes so they reach the property table.
//!
//! # Lifecycle
//!
//! ```text
//! create_element ──► (define props, set attributes: deferred)
//!       │
//!    connect() ──► drain connect queue in order ──► mount render (ALWAYS)
//!       │
//!   mutations ──► scheduled renders, one per flush
//!       │
//!   teardown() ──► registry eviction, subscriptions released
//! ```
//!
//! # Invariants
//!
//! 1. `connect` takes effect once; later calls are no-ops.
//! 2. Before `connect`, attribute syncs are queued once per property key
//!    and renders are merged into a single queued request.
//! 3. Work queued before `connect` and the mount render produce exactly one
//!    `render_to_dom` call.
//! 4. No `RefCell` borrow of element state is held while host code or
//!    listeners run.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use elementa_core::prop::dash_to_camel;
use elementa_core::{ChangeType, Key, Value};
use indexmap::IndexMap;

use crate::host::Component;
use crate::props::{PropTable, Ready};
use crate::reactive::{Subscribers, Subscription, SubscriptionScope};
use crate::registry::ComponentId;
use crate::runtime::Runtime;
use crate::scheduler::RenderRequest;

/// Payload of `before_prop_change` and `prop_change` events.
#[derive(Debug, Clone)]
pub struct PropChange {
    /// Canonical property key.
    pub key: String,
    /// Value being committed.
    pub new_value: Value,
    /// Value being replaced.
    pub old_value: Value,
}

/// Payload of change listeners: a committed property or a relevant nested
/// write inside one.
#[derive(Debug, Clone)]
pub struct ChangeNotice {
    /// Canonical property key.
    pub key: String,
    /// Path of the nested write below the property; empty when the whole
    /// value was replaced.
    pub path: Vec<Key>,
}

/// Payload of render listeners.
#[derive(Debug, Clone)]
pub struct RenderNotice {
    /// Merged change mask the render ran with.
    pub change: ChangeType,
    /// Keys whose changes were merged into this render.
    pub keys: Vec<String>,
}

pub(crate) enum Deferred {
    Init(Box<dyn FnOnce(&Element)>),
    AttributeSync(String),
    Render(RenderRequest),
    Ready(Ready),
}

#[derive(Default)]
pub(crate) struct Events {
    pub(crate) before_prop_change: Subscribers<PropChange>,
    pub(crate) prop_change: Subscribers<PropChange>,
    pub(crate) change: Subscribers<ChangeNotice>,
    pub(crate) render: Subscribers<RenderNotice>,
    pub(crate) teardown: Subscribers<ComponentId>,
}

#[derive(Default)]
pub(crate) struct ElementState {
    pub(crate) connected: bool,
    pub(crate) torn_down: bool,
    pub(crate) deferred: VecDeque<Deferred>,
    pub(crate) props: Option<PropTable>,
    pub(crate) scope: SubscriptionScope,
    pub(crate) parent: Option<Weak<ElementInner>>,
    pub(crate) children: Vec<Weak<ElementInner>>,
    pub(crate) subtree_props: IndexMap<String, Value>,
    pub(crate) global_props: IndexMap<String, Value>,
    pub(crate) refs: AHashMap<String, Value>,
    pub(crate) render_count: u64,
}

pub(crate) struct ElementInner {
    id: ComponentId,
    tag: String,
    runtime: Runtime,
    host: Rc<dyn Component>,
    pub(crate) state: RefCell<ElementState>,
    pub(crate) events: Events,
}

/// Handle on one component instance. Clones share the instance.
#[derive(Clone)]
pub struct Element {
    pub(crate) inner: Rc<ElementInner>,
}

/// Non-owning element handle.
#[derive(Clone, Default)]
pub struct WeakElement(Weak<ElementInner>);

impl WeakElement {
    /// The element, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Element> {
        self.0.upgrade().map(Element::from_inner)
    }
}

impl fmt::Debug for WeakElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(el) => write!(f, "WeakElement({})", el.id()),
            None => f.write_str("WeakElement(dropped)"),
        }
    }
}

impl Element {
    pub(crate) fn new(runtime: Runtime, tag: String, host: Rc<dyn Component>) -> Self {
        Self {
            inner: Rc::new(ElementInner {
                id: ComponentId::next(),
                tag,
                runtime,
                host,
                state: RefCell::new(ElementState::default()),
                events: Events::default(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<ElementInner>) -> Self {
        Self { inner }
    }

    /// Registry id.
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.inner.id
    }

    /// Tag name given at creation.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    /// The owning runtime.
    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// The component implementation.
    #[must_use]
    pub fn host(&self) -> &Rc<dyn Component> {
        &self.inner.host
    }

    /// A weak handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakElement {
        WeakElement(Rc::downgrade(&self.inner))
    }

    /// Whether `connect` has run and `teardown` has not.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.state.borrow().connected
    }

    /// Whether `teardown` has run.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.inner.state.borrow().torn_down
    }

    /// Number of `render_to_dom` calls so far.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.inner.state.borrow().render_count
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    /// Current attribute value.
    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.inner.host.get_attribute(name)
    }

    /// Set an attribute. The host attribute changes immediately; the
    /// matching reflected property follows now if connected, otherwise on
    /// connect.
    pub fn set_attribute(&self, name: &str, value: &str) {
        self.inner.host.set_attribute_raw(name, value);
        self.attribute_changed(name);
    }

    /// Remove an attribute, syncing the matching property like
    /// [`Element::set_attribute`].
    pub fn remove_attribute(&self, name: &str) {
        self.inner.host.remove_attribute_raw(name);
        self.attribute_changed(name);
    }

    fn attribute_changed(&self, name: &str) {
        let key = dash_to_camel(name);
        let (tracked, connected) = {
            let state = self.inner.state.borrow();
            if state.torn_down {
                return;
            }
            let tracked = state
                .props
                .as_ref()
                .and_then(|t| t.config(&key))
                .is_some_and(|c| c.is_attribute_visible());
            (tracked, state.connected)
        };
        if !tracked {
            return;
        }
        if connected {
            self.sync_from_attribute(&key);
            return;
        }
        let mut state = self.inner.state.borrow_mut();
        let queued = state
            .deferred
            .iter()
            .any(|d| matches!(d, Deferred::AttributeSync(k) if *k == key));
        if !queued {
            tracing::trace!(component = %self.id(), key = %key, "attribute sync deferred until connect");
            state.deferred.push_back(Deferred::AttributeSync(key));
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Attach the element. Drains the connect queue in order, then performs
    /// the mount render with [`ChangeType::ALWAYS`] merged with anything
    /// the queue scheduled. Idempotent.
    pub fn connect(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.connected || state.torn_down {
                return;
            }
            state.connected = true;
        }
        self.subscribe_contexts();

        loop {
            let next = self.inner.state.borrow_mut().deferred.pop_front();
            match next {
                Some(task) => self.run_deferred(task),
                None => break,
            }
        }

        let (change, keys) = match self.runtime().inner.scheduler.take(self.id()) {
            Some(request) => (
                request.change | ChangeType::ALWAYS,
                request.keys.into_iter().collect(),
            ),
            None => (ChangeType::ALWAYS, Vec::new()),
        };
        tracing::debug!(component = %self.id(), tag = self.tag(), "connected");
        self.render_now(change, keys);
    }

    /// Detach permanently: evict from the registry, drop pending work and
    /// subscriptions, and leave the parent's child list. Children become
    /// roots. Teardown listeners run last.
    pub fn teardown(&self) {
        let (scope, deferred, parent, children) = {
            let mut state = self.inner.state.borrow_mut();
            if state.torn_down {
                return;
            }
            state.torn_down = true;
            state.connected = false;
            (
                std::mem::take(&mut state.scope),
                std::mem::take(&mut state.deferred),
                state.parent.take(),
                std::mem::take(&mut state.children),
            )
        };
        drop(scope);
        drop(deferred);

        let runtime = self.runtime();
        runtime.inner.registry.remove(self.id());
        runtime.inner.scheduler.take(self.id());

        if let Some(parent) = parent.and_then(|w| w.upgrade()) {
            let me = Rc::as_ptr(&self.inner);
            parent
                .state
                .borrow_mut()
                .children
                .retain(|w| !std::ptr::eq(w.as_ptr(), me));
        }
        for child in children.iter().filter_map(Weak::upgrade) {
            child.state.borrow_mut().parent = None;
        }
        tracing::debug!(component = %self.id(), tag = self.tag(), "torn down");
        self.inner.events.teardown.emit(&self.id());
    }

    fn subscribe_contexts(&self) {
        let runtime = self.runtime();
        let theme_target = self.downgrade();
        let theme = runtime.theme().subscribe(move |_| {
            if let Some(el) = theme_target.upgrade() {
                el.request_render_for(ChangeType::THEME, None);
            }
        });
        let locale_target = self.downgrade();
        let locale = runtime.locale().subscribe(move |_| {
            if let Some(el) = locale_target.upgrade() {
                el.request_render_for(ChangeType::LANG, None);
            }
        });
        let mut state = self.inner.state.borrow_mut();
        state.scope.hold(theme);
        state.scope.hold(locale);
    }

    fn run_deferred(&self, task: Deferred) {
        match task {
            Deferred::Init(init) => init(self),
            Deferred::AttributeSync(key) => self.sync_from_attribute(&key),
            Deferred::Render(request) => {
                let runtime = self.runtime();
                if request.keys.is_empty() {
                    runtime.schedule_render(self, request.change, None);
                }
                for key in &request.keys {
                    runtime.schedule_render(self, request.change, Some(key));
                }
            }
            Deferred::Ready(ready) => ready.resolve(),
        }
    }

    /// Queue `task` for connect, or run it now if already connected.
    pub(crate) fn defer_or_run(&self, task: Deferred) {
        {
            let mut state = self.inner.state.borrow_mut();
            if !state.connected {
                state.deferred.push_back(task);
                return;
            }
        }
        self.run_deferred(task);
    }

    /// Merge a render request into the single queued render.
    pub(crate) fn defer_render(&self, change: ChangeType, key: Option<&str>) {
        let mut state = self.inner.state.borrow_mut();
        if !state.deferred.iter().any(|d| matches!(d, Deferred::Render(_))) {
            state.deferred.push_back(Deferred::Render(RenderRequest::default()));
        }
        for task in &mut state.deferred {
            if let Deferred::Render(request) = task {
                request.change |= change;
                if let Some(key) = key {
                    request.keys.insert(key.to_owned());
                }
                break;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Request a render for `change`, coalesced with any pending request.
    pub fn request_render(&self, change: ChangeType) {
        self.request_render_for(change, None);
    }

    pub(crate) fn request_render_for(&self, change: ChangeType, key: Option<&str>) {
        self.runtime().schedule_render(self, change, key);
    }

    pub(crate) fn render_now(&self, change: ChangeType, keys: Vec<String>) {
        let _span = tracing::debug_span!(
            "element_render",
            component = %self.id(),
            tag = self.tag(),
            change = change.bits()
        )
        .entered();
        self.inner.state.borrow_mut().render_count += 1;
        let host = Rc::clone(&self.inner.host);
        host.render_to_dom(self, change);
        self.inner.events.render.emit(&RenderNotice { change, keys });
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    /// Called before a property value is committed.
    pub fn on_before_prop_change(&self, f: impl Fn(&PropChange) + 'static) -> Subscription {
        self.inner.events.before_prop_change.subscribe(f)
    }

    /// Called after a property value is committed.
    pub fn on_prop_change(&self, f: impl Fn(&PropChange) + 'static) -> Subscription {
        self.inner.events.prop_change.subscribe(f)
    }

    /// Called synchronously for every committed property change and every
    /// relevant nested write.
    pub fn listen(&self, f: impl Fn(&ChangeNotice) + 'static) -> Subscription {
        self.inner.events.change.subscribe(f)
    }

    /// Called after each render with the keys merged into it.
    pub fn on_render(&self, f: impl Fn(&RenderNotice) + 'static) -> Subscription {
        self.inner.events.render.subscribe(f)
    }

    /// Called once when the element is torn down.
    pub fn on_teardown(&self, f: impl Fn(&ComponentId) + 'static) -> Subscription {
        self.inner.events.teardown.subscribe(f)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.try_borrow();
        let mut out = f.debug_struct("Element");
        out.field("id", &self.id()).field("tag", &self.tag());
        if let Ok(state) = state {
            out.field("connected", &state.connected)
                .field("torn_down", &state.torn_down)
                .field("deferred", &state.deferred.len())
                .field("renders", &state.render_count);
        }
        out.finish_non_exhaustive()
    }
}

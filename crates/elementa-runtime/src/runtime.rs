#![forbid(unsafe_code)]

//! The runtime handle.
//!
//! A [`Runtime`] owns everything components share: the task queue, the
//! render scheduler, the component registry, the theme and locale contexts,
//! and the watch-tree cache. It is a cheap `Rc` handle; elements keep one,
//! scheduled tasks keep only a weak reference.
//!
//! # Render pipeline
//!
//! ```text
//! mutation ──► schedule_render ──► not connected? ──► element's connect queue
//!                    │
//!                    ▼
//!        RenderScheduler::request ── first request? ──► post one task
//!                                                          │
//!                    flush() ◄─────────────────────────────┘
//!                      │
//!                      ▼
//!        take request ──► render_to_dom(mask) ──► render listeners(keys)
//! ```
//!
//! # Invariants
//!
//! 1. Between two flushes a connected component renders at most once per
//!    pending request, with the OR of every requested category.
//! 2. A torn-down component never renders; its queued task finds no
//!    registry entry and does nothing.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use elementa_core::{ChangeType, CompiledProps, ConfigError, PropsSpec, WatchTreeCache};

use crate::config::RuntimeConfig;
use crate::element::{Element, ElementInner};
use crate::host::Component;
use crate::locale::LocaleContext;
use crate::registry::{ComponentId, ComponentRegistry};
use crate::scheduler::RenderScheduler;
use crate::task::{FlushStats, TaskQueue};
use crate::theme::ThemeContext;

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    tasks: TaskQueue,
    pub(crate) scheduler: RenderScheduler,
    pub(crate) registry: ComponentRegistry<ElementInner>,
    theme: ThemeContext,
    locale: LocaleContext,
    trees: WatchTreeCache,
    structural_warned: Cell<bool>,
}

/// Shared runtime state for a tree of components.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// A runtime with default configuration, theme, and locale.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// A runtime with `config` and default contexts.
    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_contexts(config, ThemeContext::default(), LocaleContext::default())
    }

    /// A runtime sharing existing theme and locale contexts.
    #[must_use]
    pub fn with_contexts(config: RuntimeConfig, theme: ThemeContext, locale: LocaleContext) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                tasks: TaskQueue::new(),
                scheduler: RenderScheduler::new(),
                registry: ComponentRegistry::new(),
                theme,
                locale,
                trees: WatchTreeCache::new(),
                structural_warned: Cell::new(false),
            }),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Theme context; switching it re-renders connected elements.
    #[must_use]
    pub fn theme(&self) -> &ThemeContext {
        &self.inner.theme
    }

    /// Locale context; switching it re-renders connected elements.
    #[must_use]
    pub fn locale(&self) -> &LocaleContext {
        &self.inner.locale
    }

    /// Compile a property declaration, sharing watch trees with every other
    /// declaration compiled by this runtime.
    ///
    /// # Errors
    ///
    /// See [`PropsSpec::compile`].
    pub fn compile(&self, spec: &PropsSpec) -> Result<Rc<CompiledProps>, ConfigError> {
        spec.compile_with(&self.inner.trees)
    }

    /// Create and register an element for `host`. The element starts
    /// disconnected.
    pub fn create_element(&self, tag: impl Into<String>, host: Rc<dyn Component>) -> Element {
        let element = Element::new(self.clone(), tag.into(), host);
        self.inner.registry.insert(element.id(), &element.inner);
        tracing::trace!(component = %element.id(), tag = element.tag(), "element created");
        element
    }

    /// Look up a live element by id.
    #[must_use]
    pub fn element(&self, id: ComponentId) -> Option<Element> {
        self.inner.registry.get(id).map(Element::from_inner)
    }

    /// Number of registered elements.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Whether any task is queued.
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        !self.inner.tasks.is_empty()
    }

    /// Run queued work: the task boundary at which coalesced renders fire.
    pub fn flush(&self) -> FlushStats {
        let stats = self.inner.tasks.flush(self.inner.config.max_flush_turns);
        if stats.tasks > 0 {
            tracing::trace!(turns = stats.turns, tasks = stats.tasks, "flushed");
        }
        stats
    }

    /// Request a render of `element` for `change`.
    pub(crate) fn schedule_render(&self, element: &Element, change: ChangeType, key: Option<&str>) {
        if element.is_torn_down() {
            return;
        }
        if !element.is_connected() {
            element.defer_render(change, key);
            return;
        }
        let id = element.id();
        if self.inner.scheduler.request(id, change, key) {
            tracing::trace!(component = %id, change = change.bits(), "render scheduled");
            let weak: Weak<RuntimeInner> = Rc::downgrade(&self.inner);
            self.inner.tasks.post(move || {
                if let Some(inner) = weak.upgrade() {
                    Runtime { inner }.fire(id);
                }
            });
        }
    }

    fn fire(&self, id: ComponentId) {
        // Absorbed by a mount render, or torn down since.
        let Some(request) = self.inner.scheduler.take(id) else {
            return;
        };
        let Some(element) = self.element(id) else {
            return;
        };
        element.render_now(request.change, request.keys.into_iter().collect());
    }

    /// Whether values may be wrapped in watched handles. Logs a warning the
    /// first time watching is requested while disabled.
    pub(crate) fn structural_watching(&self) -> bool {
        if self.inner.config.structural_watching {
            return true;
        }
        if !self.inner.structural_warned.replace(true) {
            tracing::warn!("structural watching is disabled; nested mutations will not re-render");
        }
        false
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Runtime {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("components", &self.inner.registry.len())
            .field("pending_renders", &self.inner.scheduler.len())
            .field("queued_tasks", &self.inner.tasks.len())
            .finish()
    }
}

#![forbid(unsafe_code)]

//! Single-threaded component runtime for elementa.
//!
//! # Role in elementa
//! `elementa-runtime` turns the declarative pieces of `elementa-core` into
//! live components: it stores property values per element, keeps them in
//! sync with host attributes, and decides when each component renders.
//!
//! # Primary responsibilities
//! - **Property registry**: [`Props`] defines, reads and writes properties,
//!   reflecting them to attributes and wrapping complex values in watched
//!   handles.
//! - **Render scheduling**: mutations within one turn coalesce into a
//!   single render per component at the next [`Runtime::flush`].
//! - **Lifecycle**: [`Element::connect`] replays work queued before
//!   attachment; [`Element::teardown`] evicts the element.
//! - **Contexts**: theme, locale, global and subtree props, and references.
//! - **Templates**: the [`Template`] contract and [`TemplateFn`].
//!
//! # How it fits in the system
//! A concrete component implements [`AttributeHost`] and [`Renderable`],
//! is created through [`Runtime::create_element`], and receives
//! `render_to_dom(change)` calls whose mask it hands to its templates.
//!
//! # Feature Flags
//!
//! - `tracing`: forward to `elementa-core/tracing`.
//! - `policy-config`: load [`RuntimeConfig`] from TOML.
//! - `log-init`: [`logging::init`] installs a formatted subscriber.

pub mod config;
pub mod element;
pub mod error;
pub mod hierarchy;
pub mod host;
pub mod locale;
pub mod logging;
pub mod props;
pub mod reactive;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod task;
pub mod template;
pub mod theme;

pub use config::{ConfigLoadError, DEFAULT_MAX_FLUSH_TURNS, RuntimeConfig};
pub use element::{ChangeNotice, Element, PropChange, RenderNotice, WeakElement};
pub use error::{ConfigError, DecodeError, EncodeError, HierarchyError, PropError};
pub use host::{AttributeHost, AttributeMap, Component, Renderable};
pub use locale::{Locale, LocaleContext, detect_system_locale};
pub use props::{Props, Ready};
pub use reactive::{Observable, Subscribers, Subscription, SubscriptionScope};
pub use registry::{ComponentId, ComponentRegistry};
pub use runtime::Runtime;
pub use scheduler::{RenderRequest, RenderScheduler};
pub use task::{FlushStats, TaskQueue};
pub use template::{RenderTarget, TargetId, Template, TemplateFn, TextTarget};
pub use theme::{DEFAULT_THEME, ThemeContext};

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::RefCell;
    use std::rc::Rc;

    use elementa_core::ChangeType;

    use crate::element::Element;
    use crate::host::{AttributeHost, AttributeMap, Renderable};
    use crate::runtime::Runtime;

    /// Host that records every render mask.
    #[derive(Default)]
    pub(crate) struct Recorder {
        attributes: AttributeMap,
        owned: Vec<String>,
        changes: RefCell<Vec<ChangeType>>,
    }

    impl Recorder {
        pub(crate) fn element(runtime: &Runtime, tag: &str) -> (Element, Rc<Self>) {
            Self::element_owning(runtime, tag, &[])
        }

        pub(crate) fn element_owning(runtime: &Runtime, tag: &str, owned: &[&str]) -> (Element, Rc<Self>) {
            let host = Rc::new(Self {
                owned: owned.iter().map(|s| (*s).to_owned()).collect(),
                ..Self::default()
            });
            let element = runtime.create_element(tag, Rc::clone(&host) as Rc<dyn crate::host::Component>);
            (element, host)
        }

        pub(crate) fn changes(&self) -> Vec<ChangeType> {
            self.changes.borrow().clone()
        }

        pub(crate) fn get_attribute(&self, name: &str) -> Option<String> {
            self.attributes.get_attribute(name)
        }
    }

    impl AttributeHost for Recorder {
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

    impl Renderable for Recorder {
        fn render_to_dom(&self, _element: &Element, change: ChangeType) {
            self.changes.borrow_mut().push(change);
        }
    }
}

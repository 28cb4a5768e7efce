#![forbid(unsafe_code)]

//! elementa public facade.
//!
//! Re-exports the data model from `elementa-core` and the component runtime
//! from `elementa-runtime`. Most users only need the [`prelude`].
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use elementa::prelude::*;
//!
//! struct Counter {
//!     attributes: AttributeMap,
//!     renders: Cell<u32>,
//! }
//!
//! impl AttributeHost for Counter {
//!     fn get_attribute(&self, name: &str) -> Option<String> {
//!         self.attributes.get_attribute(name)
//!     }
//!     fn set_attribute_raw(&self, name: &str, value: &str) {
//!         self.attributes.set_attribute_raw(name, value);
//!     }
//!     fn remove_attribute_raw(&self, name: &str) {
//!         self.attributes.remove_attribute_raw(name);
//!     }
//! }
//!
//! impl Renderable for Counter {
//!     fn render_to_dom(&self, _element: &Element, _change: ChangeType) {
//!         self.renders.set(self.renders.get() + 1);
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = Runtime::new();
//! let host = Rc::new(Counter { attributes: AttributeMap::new(), renders: Cell::new(0) });
//! let element = runtime.create_element("x-counter", host.clone());
//! let spec = PropsSpec::new().reflect("count", PropertySpec::number().default_value(0));
//! let _ready = Props::define(&element, &runtime.compile(&spec)?)?;
//!
//! element.connect();
//! element.props().set("count", 1)?;
//! element.props().set("count", 2)?;
//! runtime.flush();
//! assert_eq!(host.renders.get(), 2);
//! assert_eq!(element.get_attribute("count").as_deref(), Some("2"));
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `tracing`: trace events inside watched handles.
//! - `policy-config`: load [`RuntimeConfig`](runtime::RuntimeConfig) from TOML.
//! - `log-init`: [`logging::init`](runtime::logging) installs a subscriber.

pub use elementa_core as data;
pub use elementa_runtime as runtime;

pub use elementa_core::{
    ChangeType, ConfigError, DecodeError, EncodeError, Key, PropKind, PropertySpec, PropsSpec,
    Value, Watched, should_recompute,
};
pub use elementa_runtime::{
    AttributeHost, AttributeMap, ChangeNotice, Component, ComponentId, Element, HierarchyError,
    LocaleContext, PropChange, PropError, Props, Ready, RenderNotice, RenderTarget, Runtime,
    RuntimeConfig, Subscription, Template, TemplateFn, TextTarget, ThemeContext,
};

/// The types needed to declare, host and render a component.
pub mod prelude {
    pub use elementa_core::{ChangeType, PropertySpec, PropsSpec, Value, Watched};
    pub use elementa_runtime::{
        AttributeHost, AttributeMap, Element, Props, Renderable, Runtime, Subscription, Template,
        TemplateFn,
    };
}

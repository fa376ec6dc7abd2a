use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use thiserror::Error;

use super::element::{Element, ElementConstructor};
use super::markup::Markup;

/// Marker stamped on every element the host has upgraded.
pub const FRAMEWORK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How markup reaches the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MountMode {
    /// Markup compiled by the host: declared tags are upgraded on mount.
    #[default]
    Compiled,
    /// Raw string injection: declared tags stay static until recreated.
    RawInjection,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("custom tag <{0}> is already defined")]
    AlreadyDefined(String),
    #[error("custom tag name '{0}' must contain a hyphen")]
    InvalidTagName(String),
}

struct HostInner {
    registry: RefCell<IndexMap<String, ElementConstructor>>,
    root: Element,
    refreshes: Cell<u64>,
}

/// Reference UI host: custom tag registry, document root and refresh scheduling.
#[derive(Clone)]
pub struct UiHost {
    inner: Rc<HostInner>,
}

#[derive(Clone, Default)]
pub struct WeakUiHost(Weak<HostInner>);

impl WeakUiHost {
    pub fn upgrade(&self) -> Option<UiHost> {
        self.0.upgrade().map(|inner| UiHost { inner })
    }
}

impl Default for UiHost {
    fn default() -> Self {
        Self::new()
    }
}

impl UiHost {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(HostInner {
                registry: RefCell::new(IndexMap::new()),
                root: Element::new("fb-root"),
                refreshes: Cell::new(0),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakUiHost {
        WeakUiHost(Rc::downgrade(&self.inner))
    }

    pub fn root(&self) -> Element {
        self.inner.root.clone()
    }

    pub fn define(&self, tag: &str, constructor: ElementConstructor) -> Result<(), HostError> {
        if !tag.contains('-') {
            return Err(HostError::InvalidTagName(tag.to_string()));
        }
        let mut registry = self.inner.registry.borrow_mut();
        if registry.contains_key(tag) {
            return Err(HostError::AlreadyDefined(tag.to_string()));
        }
        registry.insert(tag.to_string(), constructor);
        tracing::trace!(tag, "custom tag defined");
        Ok(())
    }

    pub fn is_defined(&self, tag: &str) -> bool {
        self.inner.registry.borrow().contains_key(tag)
    }

    pub fn defined_tags(&self) -> Vec<String> {
        self.inner.registry.borrow().keys().cloned().collect()
    }

    /// Create an element through the host, which always upgrades declared tags.
    pub fn create_element(&self, tag: &str) -> Element {
        let element = Element::new(tag);
        self.upgrade(&element);
        element
    }

    /// Build `markup` under the document root and return the mounted subtree.
    pub fn mount(&self, markup: &Markup, mode: MountMode) -> Element {
        let element = build(markup);
        self.inner.root.append_child(&element);
        if mode == MountMode::Compiled {
            self.upgrade_tree(&element);
        }
        self.request_refresh();
        element
    }

    /// Detach `element` and notify every upgraded element below it.
    pub fn unmount(&self, element: &Element) {
        if let Some(parent) = element.parent() {
            parent.remove_child(element);
        }
        disconnect_tree(element);
        self.request_refresh();
    }

    pub fn upgrade_tree(&self, element: &Element) {
        self.upgrade(element);
        for child in element.children() {
            self.upgrade_tree(&child);
        }
    }

    /// Instantiate the visual behind a declared tag; no-op when already upgraded.
    pub fn upgrade(&self, element: &Element) -> bool {
        if element.is_upgraded() {
            return false;
        }
        let constructor = self.inner.registry.borrow().get(element.tag()).cloned();
        let Some(constructor) = constructor else {
            return false;
        };
        let custom = constructor(element, self);
        element.install_custom(custom, FRAMEWORK_VERSION);
        true
    }

    /// Ask for a change-detection pass; passes are coalesced until taken.
    pub fn request_refresh(&self) {
        self.inner.refreshes.set(self.inner.refreshes.get() + 1);
    }

    pub fn pending_refreshes(&self) -> u64 {
        self.inner.refreshes.get()
    }

    pub fn take_refresh(&self) -> bool {
        self.inner.refreshes.replace(0) > 0
    }
}

fn build(markup: &Markup) -> Element {
    match markup {
        Markup::Text(text) => Element::text_node(text.clone()),
        Markup::Element {
            tag,
            attrs,
            children,
        } => {
            let element = Element::new(tag.clone());
            for (name, value) in attrs {
                element.set_attribute(name, value.clone());
            }
            for child in children {
                element.append_child(&build(child));
            }
            element
        }
    }
}

fn disconnect_tree(element: &Element) {
    for child in element.children() {
        disconnect_tree(&child);
    }
    if let Some(custom) = element.take_custom() {
        custom.disconnected();
    }
}

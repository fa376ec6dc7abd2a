use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::host::UiHost;
use super::markup::Markup;

/// Outbound notification a visual raises through its element.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEvent {
    pub name: String,
    pub data: Value,
}

impl FieldEvent {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Behaviour the host attaches to an upgraded custom tag.
pub trait CustomElement {
    fn value(&self) -> Option<Value>;

    fn set_value(&self, value: Value);

    fn attribute_changed(&self, _name: &str, _value: Option<&str>) {}

    fn property_changed(&self, _name: &str, _value: &Value) {}

    /// Called once when the element leaves the document.
    fn disconnected(&self);

    fn as_any(&self) -> &dyn Any;
}

pub type ElementConstructor = Rc<dyn Fn(&Element, &UiHost) -> Rc<dyn CustomElement>>;

type FieldEventHandler = Rc<dyn Fn(&FieldEvent)>;

struct Node {
    tag: String,
    attrs: RefCell<IndexMap<String, String>>,
    props: RefCell<Map<String, Value>>,
    text: RefCell<Option<String>>,
    children: RefCell<Vec<Element>>,
    parent: RefCell<Weak<Node>>,
    custom: RefCell<Option<Rc<dyn CustomElement>>>,
    version: RefCell<Option<String>>,
    listeners: RefCell<Vec<FieldEventHandler>>,
}

/// Shared handle to one node of the mounted document.
#[derive(Clone)]
pub struct Element(Rc<Node>);

#[derive(Clone, Default)]
pub struct WeakElement(Weak<Node>);

impl WeakElement {
    pub fn upgrade(&self) -> Option<Element> {
        self.0.upgrade().map(Element)
    }
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Element(Rc::new(Node {
            tag: tag.into(),
            attrs: RefCell::new(IndexMap::new()),
            props: RefCell::new(Map::new()),
            text: RefCell::new(None),
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            custom: RefCell::new(None),
            version: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
        }))
    }

    pub fn text_node(text: impl Into<String>) -> Self {
        let element = Element::new("#text");
        *element.0.text.borrow_mut() = Some(text.into());
        element
    }

    /// Snapshot of the live subtree, including attributes set after mount.
    pub fn to_markup(&self) -> Markup {
        if let Some(text) = self.text() {
            return Markup::text(text);
        }
        let markup = self
            .attributes()
            .into_iter()
            .fold(Markup::element(self.tag()), |markup, (name, value)| {
                markup.with_attr(name, value)
            });
        markup.with_children(self.children().iter().map(Element::to_markup))
    }

    pub fn downgrade(&self) -> WeakElement {
        WeakElement(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn tag(&self) -> &str {
        &self.0.tag
    }

    pub fn text(&self) -> Option<String> {
        self.0.text.borrow().clone()
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0.attrs.borrow().get(name).cloned()
    }

    pub fn attributes(&self) -> IndexMap<String, String> {
        self.0.attrs.borrow().clone()
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let changed = {
            let mut attrs = self.0.attrs.borrow_mut();
            attrs.insert(name.to_string(), value.clone()).as_deref() != Some(value.as_str())
        };
        if changed && let Some(custom) = self.custom() {
            custom.attribute_changed(name, Some(&value));
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        let removed = self.0.attrs.borrow_mut().shift_remove(name).is_some();
        if removed && let Some(custom) = self.custom() {
            custom.attribute_changed(name, None);
        }
    }

    /// Direct property assignment, as opposed to a string attribute.
    pub fn set_property(&self, name: &str, value: Value) {
        self.0
            .props
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        if let Some(custom) = self.custom() {
            custom.property_changed(name, &value);
        }
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.0.props.borrow().get(name).cloned()
    }

    pub fn parent(&self) -> Option<Element> {
        self.0.parent.borrow().upgrade().map(Element)
    }

    pub fn children(&self) -> Vec<Element> {
        self.0.children.borrow().clone()
    }

    pub fn append_child(&self, child: &Element) {
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(child.clone());
    }

    pub fn remove_child(&self, child: &Element) -> bool {
        let mut children = self.0.children.borrow_mut();
        let before = children.len();
        children.retain(|existing| !existing.ptr_eq(child));
        let removed = children.len() != before;
        if removed {
            *child.0.parent.borrow_mut() = Weak::new();
        }
        removed
    }

    /// Swap this element for `replacement` in its parent, moving children across.
    pub fn replace_with(&self, replacement: &Element) -> bool {
        let Some(parent) = self.parent() else {
            return false;
        };
        let moved: Vec<Element> = self.0.children.borrow_mut().drain(..).collect();
        for child in &moved {
            replacement.append_child(child);
        }
        let mut siblings = parent.0.children.borrow_mut();
        let Some(position) = siblings.iter().position(|item| item.ptr_eq(self)) else {
            return false;
        };
        siblings[position] = replacement.clone();
        *replacement.0.parent.borrow_mut() = Rc::downgrade(&parent.0);
        *self.0.parent.borrow_mut() = Weak::new();
        true
    }

    /// Depth-first search over descendants, excluding `self`.
    pub fn find(&self, predicate: &dyn Fn(&Element) -> bool) -> Option<Element> {
        for child in self.children() {
            if predicate(&child) {
                return Some(child);
            }
            if let Some(found) = child.find(predicate) {
                return Some(found);
            }
        }
        None
    }

    pub fn find_all(&self, predicate: &dyn Fn(&Element) -> bool) -> Vec<Element> {
        let mut found = Vec::new();
        self.collect(predicate, &mut found);
        found
    }

    fn collect(&self, predicate: &dyn Fn(&Element) -> bool, acc: &mut Vec<Element>) {
        for child in self.children() {
            if predicate(&child) {
                acc.push(child.clone());
            }
            child.collect(predicate, acc);
        }
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<Element> {
        self.find(&|element| element.tag() == tag)
    }

    pub fn find_by_attribute(&self, name: &str, value: &str) -> Option<Element> {
        self.find(&|element| element.attribute(name).as_deref() == Some(value))
    }

    pub fn is_upgraded(&self) -> bool {
        self.0.version.borrow().is_some()
    }

    pub fn framework_version(&self) -> Option<String> {
        self.0.version.borrow().clone()
    }

    pub fn custom(&self) -> Option<Rc<dyn CustomElement>> {
        self.0.custom.borrow().clone()
    }

    pub(crate) fn install_custom(&self, custom: Rc<dyn CustomElement>, version: &str) {
        *self.0.custom.borrow_mut() = Some(custom);
        *self.0.version.borrow_mut() = Some(version.to_string());
    }

    pub(crate) fn take_custom(&self) -> Option<Rc<dyn CustomElement>> {
        self.0.custom.borrow_mut().take()
    }

    /// Value exposed by the upgraded custom element, if any.
    pub fn value(&self) -> Option<Value> {
        self.custom().and_then(|custom| custom.value())
    }

    pub fn set_value(&self, value: Value) {
        if let Some(custom) = self.custom() {
            custom.set_value(value);
        }
    }

    pub fn add_field_event_listener(&self, handler: impl Fn(&FieldEvent) + 'static) {
        self.0.listeners.borrow_mut().push(Rc::new(handler));
    }

    pub fn clear_field_event_listeners(&self) {
        self.0.listeners.borrow_mut().clear();
    }

    pub fn field_event_listeners(&self) -> usize {
        self.0.listeners.borrow().len()
    }

    pub fn dispatch_field_event(&self, event: &FieldEvent) {
        let listeners = self.0.listeners.borrow().clone();
        for listener in listeners {
            listener(event);
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.0.tag)
            .field("attrs", &*self.0.attrs.borrow())
            .field("upgraded", &self.is_upgraded())
            .field("children", &self.0.children.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_with_moves_children_and_parent_link() {
        let root = Element::new("div");
        let old = Element::new("fb-text");
        let child = Element::new("span");
        root.append_child(&old);
        old.append_child(&child);

        let replacement = Element::new("fb-text");
        assert!(old.replace_with(&replacement));

        let children = root.children();
        assert_eq!(children.len(), 1);
        assert!(children[0].ptr_eq(&replacement));
        assert!(replacement.parent().expect("parent").ptr_eq(&root));
        assert!(old.parent().is_none());
        assert!(child.parent().expect("moved child").ptr_eq(&replacement));
    }

    #[test]
    fn finds_descendants_by_attribute() {
        let root = Element::new("div");
        let wrapper = Element::new("div");
        let input = Element::new("input");
        input.set_attribute("ref", "input");
        root.append_child(&wrapper);
        wrapper.append_child(&input);
        let found = root.find_by_attribute("ref", "input").expect("input");
        assert!(found.ptr_eq(&input));
        assert!(root.find_by_tag("select").is_none());
    }

    #[test]
    fn field_events_reach_every_listener() {
        let element = Element::new("fb-text");
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b"] {
            let seen = Rc::clone(&seen);
            element.add_field_event_listener(move |event| {
                seen.borrow_mut().push(format!("{tag}:{}", event.name));
            });
        }
        element.dispatch_field_event(&FieldEvent::new("blur", Value::Null));
        assert_eq!(*seen.borrow(), vec!["a:blur", "b:blur"]);
    }
}

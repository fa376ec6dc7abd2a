use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::dom::Element;
use crate::domain::FormDisplay;
use crate::engine::{EngineInstance, InstanceId};

/// Identity pairing one engine instance with one visual.
///
/// `field` is only set in PDF display, where several logical fields share a
/// single DOM id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    id: String,
    field: Option<String>,
}

pub(crate) const FIELD_ATTR: &str = "field";

impl BindingKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn for_instance(instance: &EngineInstance) -> Self {
        let key = Self::new(instance.node_id());
        match instance.display() {
            FormDisplay::Pdf => key.with_field(instance.key()),
            _ => key,
        }
    }

    /// Key announced by a mounted tag, if it carries an id yet.
    pub fn from_element(element: &Element) -> Option<Self> {
        let id = element.attribute("id").filter(|id| !id.is_empty())?;
        let key = Self::new(id);
        Some(match element.attribute(FIELD_ATTR) {
            Some(field) => key.with_field(field),
            None => key,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub(crate) fn stamp(&self, element: &Element) {
        element.set_attribute("id", self.id.as_str());
        match &self.field {
            Some(field) => element.set_attribute(FIELD_ATTR, field.as_str()),
            None => element.remove_attribute(FIELD_ATTR),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}#{}", self.id, field),
            None => f.write_str(&self.id),
        }
    }
}

/// Identity of one visual component, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisualId(u64);

impl VisualId {
    pub(crate) fn next() -> Self {
        thread_local! {
            static NEXT: Cell<u64> = const { Cell::new(1) };
        }
        NEXT.with(|next| {
            let id = next.get();
            next.set(id + 1);
            VisualId(id)
        })
    }
}

impl fmt::Display for VisualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub instance: InstanceId,
    pub visual: VisualId,
}

/// The live engine/visual pairings, at most one per key.
#[derive(Clone, Default)]
pub struct BindingTable {
    pairings: Rc<RefCell<HashMap<BindingKey, Pairing>>>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `pairing` under `key`, returning the pairing it displaced.
    pub fn claim(&self, key: &BindingKey, pairing: Pairing) -> Option<Pairing> {
        let previous = self.pairings.borrow_mut().insert(key.clone(), pairing);
        match previous {
            Some(stale) if stale != pairing => {
                tracing::debug!(
                    %key,
                    stale_instance = %stale.instance,
                    stale_visual = %stale.visual,
                    instance = %pairing.instance,
                    visual = %pairing.visual,
                    "discarding stale pairing"
                );
                Some(stale)
            }
            _ => None,
        }
    }

    /// Drop the pairing under `key` if `visual` still owns it.
    pub fn release(&self, key: &BindingKey, visual: VisualId) -> bool {
        let mut pairings = self.pairings.borrow_mut();
        match pairings.get(key) {
            Some(pairing) if pairing.visual == visual => {
                pairings.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn active(&self, key: &BindingKey) -> Option<Pairing> {
        self.pairings.borrow().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.pairings.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairings.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairing(instance: InstanceId, visual: VisualId) -> Pairing {
        Pairing { instance, visual }
    }

    fn instance_ids() -> (InstanceId, InstanceId) {
        use crate::domain::parse_form_definition;
        use crate::engine::{ComponentCatalog, EngineOptions, Form};
        use serde_json::json;

        let definition = parse_form_definition(&json!({
            "components": [
                {"type": "textfield", "key": "a"},
                {"type": "textfield", "key": "b"}
            ]
        }))
        .expect("definition");
        let form = Form::create(definition, &ComponentCatalog::with_natives(), EngineOptions::default())
            .expect("form");
        let instances = form.instances();
        (instances[0].id(), instances[1].id())
    }

    #[test]
    fn keys_render_with_optional_field() {
        assert_eq!(BindingKey::new("c1").to_string(), "c1");
        assert_eq!(BindingKey::new("c1").with_field("name").to_string(), "c1#name");
    }

    #[test]
    fn keys_read_back_from_elements() {
        let element = Element::new("fb-textfield");
        assert_eq!(BindingKey::from_element(&element), None);
        BindingKey::new("c4").with_field("total").stamp(&element);
        assert_eq!(
            BindingKey::from_element(&element),
            Some(BindingKey::new("c4").with_field("total"))
        );
        BindingKey::new("c4").stamp(&element);
        assert_eq!(BindingKey::from_element(&element), Some(BindingKey::new("c4")));
    }

    #[test]
    fn a_new_claim_displaces_the_stale_pairing() {
        let table = BindingTable::new();
        let key = BindingKey::new("field1");
        let (a, b) = instance_ids();
        let visual = VisualId::next();
        assert_eq!(table.claim(&key, pairing(a, visual)), None);
        assert_eq!(table.claim(&key, pairing(a, visual)), None);
        assert_eq!(table.claim(&key, pairing(b, visual)), Some(pairing(a, visual)));
        assert_eq!(table.len(), 1);
        assert_eq!(table.active(&key), Some(pairing(b, visual)));
    }

    #[test]
    fn only_the_owning_visual_releases() {
        let table = BindingTable::new();
        let key = BindingKey::new("field1");
        let (a, _) = instance_ids();
        let owner = VisualId::next();
        let other = VisualId::next();
        table.claim(&key, pairing(a, owner));
        assert!(!table.release(&key, other));
        assert!(table.release(&key, owner));
        assert!(table.is_empty());
    }
}

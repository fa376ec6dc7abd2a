//! Template helpers producing the markup embedded in rendered forms.
use crate::dom::{Element, Markup};

use super::instance::EngineInstance;

pub const INPUT_REF: &str = "input";

pub fn component_ref(node_id: &str) -> String {
    format!("component-{node_id}")
}

/// Template-string helper: one element with the given attributes.
pub fn tag(name: &str, attrs: &[(&str, &str)]) -> Markup {
    attrs
        .iter()
        .fold(Markup::element(name), |markup, (key, value)| {
            markup.with_attr(*key, *value)
        })
}

/// Outer container every instance renders into.
pub fn wrapper(instance: &EngineInstance) -> Markup {
    let class = format!(
        "formio-component formio-component-{} formio-component-{}",
        instance.category().type_name(),
        instance.key()
    );
    tag(
        "div",
        &[
            ("ref", component_ref(instance.node_id()).as_str()),
            ("id", instance.node_id()),
            ("class", class.as_str()),
        ],
    )
}

pub fn label(instance: &EngineInstance) -> Option<Markup> {
    if instance.options().hide_labels {
        return None;
    }
    let text = instance.schema().label.clone()?;
    Some(
        tag("label", &[("for", input_id(instance).as_str())])
            .with_child(Markup::text(text)),
    )
}

pub fn input_id(instance: &EngineInstance) -> String {
    format!("{}-{}", instance.node_id(), instance.key())
}

/// Input refs owned by `element`, not counting nested components.
pub fn count_input_refs(element: &Element) -> usize {
    element
        .children()
        .iter()
        .map(|child| {
            let reference = child.attribute("ref");
            match reference.as_deref() {
                Some(value) if value.starts_with("component-") => 0,
                Some(INPUT_REF) => 1 + count_input_refs(child),
                _ => count_input_refs(child),
            }
        })
        .sum()
}

/// First descendant matching `predicate`, skipping nested component wrappers.
pub fn find_own(element: &Element, predicate: &dyn Fn(&Element) -> bool) -> Option<Element> {
    for child in element.children() {
        if child
            .attribute("ref")
            .is_some_and(|reference| reference.starts_with("component-"))
        {
            continue;
        }
        if predicate(&child) {
            return Some(child);
        }
        if let Some(found) = find_own(&child, predicate) {
            return Some(found);
        }
    }
    None
}

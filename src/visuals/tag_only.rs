use std::any::Any;

use serde_json::Value;

use crate::dom::CustomElement;

/// Structural tags with no data of their own; they exist so engine markup
/// embedding them upgrades cleanly.
pub const TAG_ONLY_TAGS: [&str; 7] = [
    "fb-label",
    "fb-icon",
    "fb-table",
    "fb-stepper",
    "fb-card",
    "fb-accordion",
    "fb-tabs",
];

#[derive(Debug, Default)]
pub struct TagOnlyElement;

impl CustomElement for TagOnlyElement {
    fn value(&self) -> Option<Value> {
        None
    }

    fn set_value(&self, _value: Value) {}

    fn disconnected(&self) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}

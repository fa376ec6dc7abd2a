//! Minimal visual implementations, one behaviour per field category.
//!
//! A behaviour is stateless: the value it edits lives in the adapter's
//! [`Control`](crate::bridge::Control), so one behaviour serves every visual of
//! its category.
use std::rc::Rc;

use crossterm::event::KeyEvent;
use serde_json::Value;

use crate::domain::{FieldCategory, FieldSchema};

mod button;
mod checkbox;
mod choice;
mod container;
mod convert;
mod date;
mod error;
mod file;
mod number;
mod tag_only;
mod text;

pub use button::ButtonVisual;
pub use checkbox::CheckboxVisual;
pub use choice::{SelectBoxesVisual, SelectVisual};
pub use container::ContainerVisual;
pub use date::{DateMode, DateVisual};
pub use error::ValueError;
pub use file::{FileStatus, FileVisual, UploadState};
pub use number::NumberVisual;
pub use tag_only::{TAG_ONLY_TAGS, TagOnlyElement};
pub use text::{TagsVisual, TextVisual};

pub trait VisualBehavior {
    /// Canonical form of one value as this visual holds it.
    fn normalize(&self, schema: &FieldSchema, value: &Value) -> Result<Value, ValueError>;

    /// Normalize a whole field value, item by item for multi-value fields.
    fn normalize_value(&self, schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        match value {
            Value::Array(items) if schema.multiple => items
                .iter()
                .map(|item| self.normalize(schema, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => self.normalize(schema, other),
        }
    }

    /// Value as pushed into engine data.
    fn to_engine(&self, _schema: &FieldSchema, value: Value) -> Value {
        value
    }

    /// Apply a key press; returns the edited value when the key was consumed.
    fn handle_key(&self, _schema: &FieldSchema, _value: &Value, _key: &KeyEvent) -> Option<Value> {
        None
    }

    fn display_value(&self, schema: &FieldSchema, value: &Value) -> String;
}

/// Behaviour for a bridged category; `None` for layout-only categories that
/// keep the engine's native rendering.
pub fn behavior_for(category: FieldCategory) -> Option<Rc<dyn VisualBehavior>> {
    let behavior: Rc<dyn VisualBehavior> = match category {
        FieldCategory::TextField
        | FieldCategory::TextArea
        | FieldCategory::Email
        | FieldCategory::Url
        | FieldCategory::PhoneNumber
        | FieldCategory::Password
        | FieldCategory::Signature => Rc::new(TextVisual::new(category == FieldCategory::Password)),
        FieldCategory::Tags => Rc::new(TagsVisual),
        FieldCategory::Number | FieldCategory::Currency => Rc::new(NumberVisual),
        FieldCategory::Checkbox => Rc::new(CheckboxVisual),
        FieldCategory::Select | FieldCategory::Radio => Rc::new(SelectVisual),
        FieldCategory::SelectBoxes => Rc::new(SelectBoxesVisual),
        FieldCategory::DateTime => Rc::new(DateVisual::new(DateMode::DateTime)),
        FieldCategory::Day => Rc::new(DateVisual::new(DateMode::Date)),
        FieldCategory::Time => Rc::new(DateVisual::new(DateMode::Time)),
        FieldCategory::Button => Rc::new(ButtonVisual),
        FieldCategory::File => Rc::new(FileVisual),
        FieldCategory::DataGrid
        | FieldCategory::EditGrid
        | FieldCategory::Container
        | FieldCategory::Wizard
        | FieldCategory::Pdf
        | FieldCategory::Builder => Rc::new(ContainerVisual),
        FieldCategory::Content
        | FieldCategory::HtmlElement
        | FieldCategory::Panel
        | FieldCategory::FieldSet
        | FieldCategory::Columns
        | FieldCategory::Table
        | FieldCategory::Tabs => return None,
    };
    Some(behavior)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn layout_categories_stay_native() {
        assert!(behavior_for(FieldCategory::Panel).is_none());
        assert!(behavior_for(FieldCategory::Columns).is_none());
        assert!(behavior_for(FieldCategory::Wizard).is_some());
    }

    #[test]
    fn multi_value_fields_normalize_item_by_item() {
        let mut schema = FieldSchema::new("number", "scores");
        schema.multiple = true;
        let behavior = behavior_for(FieldCategory::Number).expect("number visual");
        assert_eq!(
            behavior.normalize_value(&schema, &json!(["1", 2.5])).expect("numbers"),
            json!([1, 2.5])
        );
    }

    /// `normalize` then `normalize` again is a fixed point for every category.
    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            (FieldCategory::TextField, json!(42)),
            (FieldCategory::Number, json!("7.50")),
            (FieldCategory::Checkbox, json!("on")),
            (FieldCategory::DateTime, json!("2024-03-05 14:30")),
            (FieldCategory::Day, json!("05/03/2024")),
            (FieldCategory::Time, json!("9:05")),
            (FieldCategory::Tags, json!("a, b ,c")),
            (FieldCategory::File, json!({"name": "cv.pdf", "size": 10})),
        ];
        for (category, sample) in samples {
            let schema = FieldSchema::new(category.type_name(), "f");
            let behavior = behavior_for(category).expect("bridged");
            let once = behavior.normalize_value(&schema, &sample).expect("normalize");
            let twice = behavior.normalize_value(&schema, &once).expect("normalize again");
            assert_eq!(once, twice, "{category}");
        }
    }
}

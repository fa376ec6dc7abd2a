use crossterm::event::{KeyCode, KeyEvent};
use serde_json::Value;

use super::{ValueError, VisualBehavior};
use crate::domain::FieldSchema;

/// Push button; its value records whether it has been pressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ButtonVisual;

impl VisualBehavior for ButtonVisual {
    fn normalize(&self, _schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        Ok(Value::Bool(match value {
            Value::Bool(flag) => *flag,
            Value::Null => false,
            Value::String(text) => !text.is_empty(),
            _ => true,
        }))
    }

    fn handle_key(&self, _schema: &FieldSchema, _value: &Value, key: &KeyEvent) -> Option<Value> {
        matches!(key.code, KeyCode::Enter | KeyCode::Char(' ')).then_some(Value::Bool(true))
    }

    fn display_value(&self, schema: &FieldSchema, _value: &Value) -> String {
        format!("<{}>", schema.label.as_deref().unwrap_or("Submit"))
    }
}

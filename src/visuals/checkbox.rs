use crossterm::event::{KeyCode, KeyEvent};
use serde_json::Value;

use super::convert::value_kind;
use super::{ValueError, VisualBehavior};
use crate::domain::FieldSchema;

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckboxVisual;

impl VisualBehavior for CheckboxVisual {
    fn normalize(&self, _schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        let flag = match value {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Number(num) => num.as_f64().is_some_and(|num| num != 0.0),
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "" | "false" | "off" | "no" | "0" => false,
                "true" | "on" | "yes" | "1" => true,
                _ => return Err(ValueError::InvalidBoolean(text.clone())),
            },
            other => {
                return Err(ValueError::Unsupported {
                    expected: "boolean",
                    found: value_kind(other),
                });
            }
        };
        Ok(Value::Bool(flag))
    }

    fn handle_key(&self, _schema: &FieldSchema, value: &Value, key: &KeyEvent) -> Option<Value> {
        match key.code {
            KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Left | KeyCode::Right => {
                Some(Value::Bool(!value.as_bool().unwrap_or(false)))
            }
            _ => None,
        }
    }

    fn display_value(&self, _schema: &FieldSchema, value: &Value) -> String {
        if value.as_bool().unwrap_or(false) {
            "[x]".to_string()
        } else {
            "[ ]".to_string()
        }
    }
}

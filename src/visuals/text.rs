use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::Value;

use super::convert::{value_kind, value_to_string};
use super::{ValueError, VisualBehavior};
use crate::domain::FieldSchema;

/// Plain text entry, masked for passwords.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextVisual {
    masked: bool,
}

impl TextVisual {
    pub fn new(masked: bool) -> Self {
        Self { masked }
    }
}

/// Shared line editing: append, backspace, clear.
pub(super) fn handle_text_edit(buffer: &mut String, key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char(ch) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                return false;
            }
            buffer.push(ch);
            true
        }
        KeyCode::Backspace => buffer.pop().is_some(),
        KeyCode::Delete => {
            let had_text = !buffer.is_empty();
            buffer.clear();
            had_text
        }
        _ => false,
    }
}

impl VisualBehavior for TextVisual {
    fn normalize(&self, _schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        match value {
            Value::Null => Ok(Value::String(String::new())),
            Value::String(_) => Ok(value.clone()),
            Value::Number(_) | Value::Bool(_) => Ok(Value::String(value_to_string(value))),
            other => Err(ValueError::Unsupported {
                expected: "text",
                found: value_kind(other),
            }),
        }
    }

    fn handle_key(&self, _schema: &FieldSchema, value: &Value, key: &KeyEvent) -> Option<Value> {
        let mut buffer = value_to_string(value);
        handle_text_edit(&mut buffer, key).then_some(Value::String(buffer))
    }

    fn display_value(&self, _schema: &FieldSchema, value: &Value) -> String {
        let text = value_to_string(value);
        if self.masked {
            "*".repeat(text.chars().count())
        } else {
            text
        }
    }
}

/// Comma separated tags held as an array of strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagsVisual;

fn split_tags(text: &str) -> Vec<Value> {
    text.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(|tag| Value::String(tag.to_string()))
        .collect()
}

impl VisualBehavior for TagsVisual {
    fn normalize(&self, _schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        match value {
            Value::Null => Ok(Value::Array(Vec::new())),
            Value::String(text) => Ok(Value::Array(split_tags(text))),
            Value::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| Value::String(value_to_string(item).trim().to_string()))
                    .collect(),
            )),
            other => Err(ValueError::Unsupported {
                expected: "tags",
                found: value_kind(other),
            }),
        }
    }

    // Tags are a list already; multi-value wrapping does not apply.
    fn normalize_value(&self, schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        self.normalize(schema, value)
    }

    fn to_engine(&self, _schema: &FieldSchema, value: Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .filter(|item| item.as_str().is_none_or(|tag| !tag.is_empty()))
                    .collect(),
            ),
            other => other,
        }
    }

    fn handle_key(&self, _schema: &FieldSchema, value: &Value, key: &KeyEvent) -> Option<Value> {
        let mut buffer = match value {
            Value::Array(items) => items.iter().map(value_to_string).collect::<Vec<_>>().join(","),
            other => value_to_string(other),
        };
        if !handle_text_edit(&mut buffer, key) {
            return None;
        }
        // A trailing comma starts a new, still empty tag.
        let mut tags = split_tags(&buffer);
        if buffer.ends_with(',') {
            tags.push(Value::String(String::new()));
        }
        Some(Value::Array(tags))
    }

    fn display_value(&self, _schema: &FieldSchema, value: &Value) -> String {
        value_to_string(value)
    }
}

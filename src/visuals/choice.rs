use crossterm::event::{KeyCode, KeyEvent};
use serde_json::{Map, Value};

use super::convert::{value_kind, value_to_string};
use super::{ValueError, VisualBehavior};
use crate::domain::{FieldSchema, SelectOption};

/// Single choice among the schema's `values` (select and radio).
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectVisual;

/// Option whose value matches `value`, also when only the text form matches.
fn find_option<'a>(options: &'a [SelectOption], value: &Value) -> Option<&'a SelectOption> {
    options.iter().find(|option| &option.value == value).or_else(|| {
        let text = value_to_string(value);
        options
            .iter()
            .find(|option| value_to_string(&option.value) == text)
    })
}

impl VisualBehavior for SelectVisual {
    fn normalize(&self, schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        match value {
            Value::Null => Ok(Value::String(String::new())),
            Value::String(text) if text.is_empty() => Ok(value.clone()),
            Value::Array(_) | Value::Object(_) => Err(ValueError::Unsupported {
                expected: "option value",
                found: value_kind(value),
            }),
            // Values outside the option list pass through; remote lists may load later.
            other => Ok(find_option(&schema.values, other)
                .map(|option| option.value.clone())
                .unwrap_or_else(|| other.clone())),
        }
    }

    fn handle_key(&self, schema: &FieldSchema, value: &Value, key: &KeyEvent) -> Option<Value> {
        let options = &schema.values;
        if options.is_empty() {
            return None;
        }
        let current = options.iter().position(|option| &option.value == value);
        let next = match (key.code, current) {
            (KeyCode::Down | KeyCode::Right, None) => 0,
            (KeyCode::Down | KeyCode::Right, Some(index)) => (index + 1) % options.len(),
            (KeyCode::Up | KeyCode::Left, None | Some(0)) => options.len() - 1,
            (KeyCode::Up | KeyCode::Left, Some(index)) => index - 1,
            (KeyCode::Delete | KeyCode::Backspace, Some(_)) => {
                return Some(Value::String(String::new()));
            }
            _ => return None,
        };
        Some(options[next].value.clone())
    }

    fn display_value(&self, schema: &FieldSchema, value: &Value) -> String {
        match find_option(&schema.values, value) {
            Some(option) => option.label.clone(),
            None => value_to_string(value),
        }
    }
}

/// Several independent checkboxes stored as `{option: bool}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectBoxesVisual;

impl VisualBehavior for SelectBoxesVisual {
    fn normalize(&self, schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        let selected: Vec<String> = match value {
            Value::Null => Vec::new(),
            Value::Object(map) => map
                .iter()
                .filter(|(_, flag)| flag.as_bool().unwrap_or(false))
                .map(|(name, _)| name.clone())
                .collect(),
            Value::Array(items) => items.iter().map(value_to_string).collect(),
            Value::String(text) if text.is_empty() => Vec::new(),
            Value::String(text) => vec![text.clone()],
            other => {
                return Err(ValueError::Unsupported {
                    expected: "selection map",
                    found: value_kind(other),
                });
            }
        };
        let mut map = Map::new();
        for option in &schema.values {
            let name = value_to_string(&option.value);
            let flag = selected.contains(&name);
            map.insert(name, Value::Bool(flag));
        }
        // Keys the schema does not list survive only when selected.
        for name in selected {
            map.entry(name).or_insert(Value::Bool(true));
        }
        Ok(Value::Object(map))
    }

    fn normalize_value(&self, schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        self.normalize(schema, value)
    }

    fn handle_key(&self, schema: &FieldSchema, value: &Value, key: &KeyEvent) -> Option<Value> {
        let KeyCode::Char(digit) = key.code else {
            return None;
        };
        let position = digit.to_digit(10)?.checked_sub(1)? as usize;
        let option = schema.values.get(position)?;
        let mut map = match self.normalize(schema, value) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let name = value_to_string(&option.value);
        let flag = map.get(&name).and_then(Value::as_bool).unwrap_or(false);
        map.insert(name, Value::Bool(!flag));
        Some(Value::Object(map))
    }

    fn display_value(&self, schema: &FieldSchema, value: &Value) -> String {
        let Value::Object(map) = value else {
            return String::new();
        };
        schema
            .values
            .iter()
            .map(|option| {
                let checked = map
                    .get(&value_to_string(&option.value))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                format!("[{}] {}", if checked { 'x' } else { ' ' }, option.label)
            })
            .collect::<Vec<_>>()
            .join("  ")
    }
}

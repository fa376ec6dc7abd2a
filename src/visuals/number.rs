use crossterm::event::{KeyCode, KeyEvent};
use serde_json::{Number, Value};

use super::convert::{value_kind, value_to_string};
use super::text::handle_text_edit;
use super::{ValueError, VisualBehavior};
use crate::domain::FieldSchema;

/// Numbers and currency amounts; integral values are kept as integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberVisual;

fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Value::from(number as i64)
    } else {
        Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl VisualBehavior for NumberVisual {
    fn normalize(&self, _schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Number(num) => Ok(num.as_f64().map(number_value).unwrap_or(Value::Null)),
            Value::String(text) => {
                let trimmed = text.trim().replace(',', "");
                if trimmed.is_empty() {
                    return Ok(Value::Null);
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|number| number.is_finite())
                    .map(number_value)
                    .ok_or_else(|| ValueError::InvalidNumber(text.clone()))
            }
            other => Err(ValueError::Unsupported {
                expected: "number",
                found: value_kind(other),
            }),
        }
    }

    fn handle_key(&self, schema: &FieldSchema, value: &Value, key: &KeyEvent) -> Option<Value> {
        let step = schema.extra.get("step").and_then(Value::as_f64).unwrap_or(1.0);
        let current = value.as_f64();
        match key.code {
            KeyCode::Up => return Some(number_value(current.unwrap_or(0.0) + step)),
            KeyCode::Down => return Some(number_value(current.unwrap_or(0.0) - step)),
            KeyCode::Char(ch) if !(ch.is_ascii_digit() || matches!(ch, '.' | '-')) => return None,
            _ => {}
        }
        let mut buffer = value_to_string(value);
        if !handle_text_edit(&mut buffer, key) {
            return None;
        }
        // Typed input stays text so partial entries like "-" or "1." survive.
        if buffer.is_empty() {
            Some(Value::Null)
        } else {
            Some(Value::String(buffer))
        }
    }

    fn to_engine(&self, schema: &FieldSchema, value: Value) -> Value {
        self.normalize_value(schema, &value).unwrap_or(Value::Null)
    }

    fn display_value(&self, schema: &FieldSchema, value: &Value) -> String {
        let text = value_to_string(value);
        match schema.extra.get("currency").and_then(Value::as_str) {
            Some(currency) if !text.is_empty() => format!("{currency} {text}"),
            _ => text,
        }
    }
}

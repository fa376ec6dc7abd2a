use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat};
use crossterm::event::KeyEvent;
use serde_json::Value;

use super::convert::{value_kind, value_to_string};
use super::text::handle_text_edit;
use super::{ValueError, VisualBehavior};
use crate::domain::FieldSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateMode {
    DateTime,
    Date,
    Time,
}

/// Date, day and time pickers; values are held as canonical ISO-8601 text.
#[derive(Debug, Clone, Copy)]
pub struct DateVisual {
    mode: DateMode,
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d.%m.%Y"];
const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
const TIME_FORMATS: [&str; 3] = ["%H:%M:%S%.f", "%H:%M", "%I:%M %p"];

impl DateVisual {
    pub fn new(mode: DateMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> DateMode {
        self.mode
    }

    fn canonical(&self, text: &str) -> Result<String, ValueError> {
        let text = text.trim();
        match self.mode {
            DateMode::DateTime => parse_date_time(text),
            DateMode::Date => parse_date(text)
                .map(|date| date.format("%Y-%m-%d").to_string())
                .ok_or_else(|| ValueError::InvalidDate(text.to_string())),
            DateMode::Time => TIME_FORMATS
                .iter()
                .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
                .map(|time| time.format("%H:%M:%S").to_string())
                .ok_or_else(|| ValueError::InvalidTime(text.to_string())),
        }
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| parse_naive_date_time(text).map(|stamp| stamp.date()))
}

fn parse_naive_date_time(text: &str) -> Option<NaiveDateTime> {
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

/// Zoned stamps keep their offset (`Z` for UTC); naive ones stay naive.
fn parse_date_time(text: &str) -> Result<String, ValueError> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Ok(stamp.to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    if let Some(stamp) = parse_naive_date_time(text) {
        return Ok(stamp.format("%Y-%m-%dT%H:%M:%S").to_string());
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|stamp| stamp.format("%Y-%m-%dT%H:%M:%S").to_string())
        .ok_or_else(|| ValueError::InvalidDate(text.to_string()))
}

impl VisualBehavior for DateVisual {
    fn normalize(&self, _schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        match value {
            Value::Null => Ok(Value::String(String::new())),
            Value::String(text) if text.trim().is_empty() => Ok(Value::String(String::new())),
            Value::String(text) => self.canonical(text).map(Value::String),
            other => Err(ValueError::Unsupported {
                expected: "date text",
                found: value_kind(other),
            }),
        }
    }

    // Half-typed dates reach the engine as typed; validation reports them.
    fn to_engine(&self, schema: &FieldSchema, value: Value) -> Value {
        self.normalize_value(schema, &value).unwrap_or(value)
    }

    fn handle_key(&self, _schema: &FieldSchema, value: &Value, key: &KeyEvent) -> Option<Value> {
        let mut buffer = value_to_string(value);
        handle_text_edit(&mut buffer, key).then_some(Value::String(buffer))
    }

    fn display_value(&self, schema: &FieldSchema, value: &Value) -> String {
        let text = value_to_string(value);
        let Some(format) = schema.extra.get("format").and_then(Value::as_str) else {
            return text;
        };
        let rendered = match self.mode {
            DateMode::DateTime => DateTime::parse_from_rfc3339(&text)
                .map(|stamp| stamp.naive_local())
                .ok()
                .or_else(|| parse_naive_date_time(&text))
                .map(|stamp| stamp.format(format).to_string()),
            DateMode::Date => parse_date(&text).map(|date| date.format(format).to_string()),
            DateMode::Time => NaiveTime::parse_from_str(&text, "%H:%M:%S")
                .ok()
                .map(|time| time.format(format).to_string()),
        };
        rendered.unwrap_or(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> FieldSchema {
        FieldSchema::new("datetime", "when")
    }

    #[test]
    fn date_times_normalize_to_iso() {
        let visual = DateVisual::new(DateMode::DateTime);
        assert_eq!(
            visual.normalize(&schema(), &json!("2024-03-05 14:30")),
            Ok(json!("2024-03-05T14:30:00"))
        );
        assert_eq!(
            visual.normalize(&schema(), &json!("2024-03-05T14:30:00+00:00")),
            Ok(json!("2024-03-05T14:30:00Z"))
        );
        assert_eq!(
            visual.normalize(&schema(), &json!("05/03/2024")),
            Ok(json!("2024-03-05T00:00:00"))
        );
    }

    #[test]
    fn malformed_dates_are_reported() {
        let visual = DateVisual::new(DateMode::Date);
        assert_eq!(
            visual.normalize(&schema(), &json!("31/02/2024")),
            Err(ValueError::InvalidDate("31/02/2024".to_string()))
        );
        assert_eq!(
            DateVisual::new(DateMode::DateTime).to_engine(&schema(), json!("2024-0")),
            json!("2024-0")
        );
    }

    #[test]
    fn times_gain_seconds() {
        let visual = DateVisual::new(DateMode::Time);
        assert_eq!(visual.normalize(&schema(), &json!("9:05")), Ok(json!("09:05:00")));
        assert_eq!(visual.normalize(&schema(), &json!("02:15 PM")), Ok(json!("14:15:00")));
    }

    #[test]
    fn display_honours_a_schema_format() {
        let mut schema = schema();
        schema.extra.insert("format".to_string(), json!("%d %b %Y"));
        let visual = DateVisual::new(DateMode::Date);
        assert_eq!(visual.display_value(&schema, &json!("2024-03-05")), "05 Mar 2024");
    }
}

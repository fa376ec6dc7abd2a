use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::domain::ValidationRules;

/// Cached value, enabled state and active error rules of one field.
///
/// The engine owns the canonical data; a control only mirrors it for the
/// visual that holds it.
#[derive(Debug, Clone, Default)]
pub struct Control {
    value: Value,
    disabled: bool,
    errors: IndexMap<String, String>,
    rules: ValidationRules,
    pattern: Option<Regex>,
}

impl Control {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns whether the value changed.
    pub fn set_value(&mut self, value: Value) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        true
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Messages keyed by the rule that raised them, in raise order.
    pub fn errors(&self) -> &IndexMap<String, String> {
        &self.errors
    }

    pub fn has_error(&self, rule: &str) -> bool {
        self.errors.contains_key(rule)
    }

    pub fn set_error(&mut self, rule: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(rule.into(), message.into());
    }

    pub fn retain_errors(&mut self, keep: impl Fn(&str) -> bool) {
        self.errors.retain(|rule, _| keep(rule));
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Install local validators; an invalid pattern is ignored with a warning.
    pub fn set_rules(&mut self, rules: ValidationRules) {
        self.pattern = rules.pattern.as_deref().and_then(|pattern| {
            Regex::new(&format!("^(?:{pattern})$"))
                .inspect_err(|err| tracing::warn!(pattern, %err, "ignoring invalid pattern"))
                .ok()
        });
        self.rules = rules;
    }

    /// Re-run the local validators against the current value.
    pub fn validate(&mut self) -> bool {
        self.errors.clear();
        let rules = &self.rules;
        let empty = match &self.value {
            Value::Null => true,
            Value::String(text) => text.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        };
        if empty {
            if rules.required {
                self.errors
                    .insert("required".to_string(), "This field is required".to_string());
            }
            return self.errors.is_empty();
        }
        if let Value::String(text) = &self.value {
            let length = text.chars().count() as u64;
            if let Some(min) = rules.min_length.filter(|min| length < *min) {
                self.errors
                    .insert("minLength".to_string(), format!("Use at least {min} characters"));
            }
            if let Some(max) = rules.max_length.filter(|max| length > *max) {
                self.errors
                    .insert("maxLength".to_string(), format!("Use at most {max} characters"));
            }
            if let Some(pattern) = &self.pattern
                && !pattern.is_match(text)
            {
                self.errors
                    .insert("pattern".to_string(), "Value does not match the pattern".to_string());
            }
        }
        if let Some(number) = self.value.as_f64() {
            if let Some(min) = rules.min.filter(|min| number < *min) {
                self.errors
                    .insert("minimum".to_string(), format!("Must be at least {min}"));
            }
            if let Some(max) = rules.max.filter(|max| number > *max) {
                self.errors
                    .insert("maximum".to_string(), format!("Must be at most {max}"));
            }
        }
        self.errors.is_empty()
    }
}

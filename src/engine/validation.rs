use anyhow::{Context, Result};
use jsonschema::Validator;
use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::{FieldCategory, FieldSchema};

/// Where an error applies and which rule produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorContext {
    pub key: String,
    pub path: String,
    pub validator: String,
    pub index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub message: String,
    pub context: ErrorContext,
    /// Raised outside the field's own rules (cross-field processors).
    pub processor: bool,
}

/// Compiled per-field rules: `required` and masks are checked directly,
/// everything else goes through a JSON Schema validator.
pub(crate) struct FieldRules {
    required: bool,
    validator: Option<Validator>,
    mask: Option<Regex>,
    custom_message: Option<String>,
}

impl FieldRules {
    pub(crate) fn compile(schema: &FieldSchema, category: FieldCategory) -> Result<Option<Self>> {
        if !category.is_input() {
            return Ok(None);
        }
        let rules = &schema.validate;
        let mask = schema
            .input_mask
            .as_deref()
            .map(mask_regex)
            .transpose()
            .with_context(|| format!("invalid input mask on '{}'", schema.key))?;
        let rule_schema = rule_schema(schema, category);
        let validator = match rule_schema {
            Some(rule_schema) => Some(
                jsonschema::validator_for(&rule_schema)
                    .map_err(|err| anyhow::anyhow!("{err}"))
                    .with_context(|| format!("invalid validation rules on '{}'", schema.key))?,
            ),
            None => None,
        };
        if !rules.required && validator.is_none() && mask.is_none() {
            return Ok(None);
        }
        Ok(Some(Self {
            required: rules.required,
            validator,
            mask,
            custom_message: rules.custom_message.clone(),
        }))
    }

    pub(crate) fn check(
        &self,
        schema: &FieldSchema,
        category: FieldCategory,
        path: &str,
        value: &Value,
    ) -> Vec<FieldError> {
        let label = schema.label.clone().unwrap_or_else(|| schema.key.clone());
        let mut errors = Vec::new();
        if is_empty_value(value, category) {
            if self.required {
                errors.push(self.error(schema, path, "required", None, format!("{label} is required")));
            }
            return errors;
        }
        if let (Some(mask), Some(text)) = (&self.mask, value.as_str())
            && !mask.is_match(text)
        {
            errors.push(self.error(
                schema,
                path,
                "mask",
                None,
                format!("{label} does not match the mask"),
            ));
        }
        if let Some(validator) = &self.validator {
            for error in validator.iter_errors(value) {
                let schema_path = error.schema_path.to_string();
                let rule = schema_path.rsplit('/').next().unwrap_or_default().to_string();
                let index = error
                    .instance_path
                    .to_string()
                    .trim_start_matches('/')
                    .split('/')
                    .next()
                    .and_then(|segment| segment.parse::<usize>().ok());
                errors.push(self.error(schema, path, &rule, index, format!("{label}: {error}")));
            }
        }
        errors
    }

    fn error(
        &self,
        schema: &FieldSchema,
        path: &str,
        validator: &str,
        index: Option<usize>,
        fallback: String,
    ) -> FieldError {
        FieldError {
            message: self.custom_message.clone().unwrap_or(fallback),
            context: ErrorContext {
                key: schema.key.clone(),
                path: path.to_string(),
                validator: validator.to_string(),
                index,
            },
            processor: false,
        }
    }
}

fn rule_schema(schema: &FieldSchema, category: FieldCategory) -> Option<Value> {
    let rules = &schema.validate;
    let mut map = Map::new();
    match category {
        FieldCategory::Number | FieldCategory::Currency => {
            if let Some(min) = rules.min {
                map.insert("minimum".to_string(), Value::from(min));
            }
            if let Some(max) = rules.max {
                map.insert("maximum".to_string(), Value::from(max));
            }
            if !map.is_empty() {
                map.insert("type".to_string(), Value::String("number".to_string()));
            }
        }
        _ => {
            if let Some(pattern) = &rules.pattern {
                map.insert("pattern".to_string(), Value::String(format!("^(?:{pattern})$")));
            }
            if let Some(min_length) = rules.min_length {
                map.insert("minLength".to_string(), Value::from(min_length));
            }
            if let Some(max_length) = rules.max_length {
                map.insert("maxLength".to_string(), Value::from(max_length));
            }
        }
    }
    if map.is_empty() {
        return None;
    }
    let item = Value::Object(map);
    if schema.multiple {
        let mut wrapper = Map::new();
        wrapper.insert("items".to_string(), item);
        Some(Value::Object(wrapper))
    } else {
        Some(item)
    }
}

/// Translate an input mask (`9` digit, `a` letter, `*` either) into a regex.
pub(crate) fn mask_regex(mask: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::from("^");
    for ch in mask.chars() {
        match ch {
            '9' => pattern.push_str("[0-9]"),
            'a' => pattern.push_str("[A-Za-z]"),
            '*' => pattern.push_str("[A-Za-z0-9]"),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}

pub(crate) fn is_empty_value(value: &Value, category: FieldCategory) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Bool(flag) => category == FieldCategory::Checkbox && !flag,
        Value::Object(map) => {
            category == FieldCategory::SelectBoxes
                && map.values().all(|value| value != &Value::Bool(true))
        }
        Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValidationRules;
    use serde_json::json;

    fn text_schema(rules: ValidationRules) -> FieldSchema {
        let mut schema = FieldSchema::new("textfield", "code");
        schema.label = Some("Code".to_string());
        schema.validate = rules;
        schema
    }

    #[test]
    fn required_reports_empty_values() {
        let schema = text_schema(ValidationRules {
            required: true,
            ..Default::default()
        });
        let rules = FieldRules::compile(&schema, FieldCategory::TextField)
            .expect("compile")
            .expect("rules");
        let errors = rules.check(&schema, FieldCategory::TextField, "code", &json!(""));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].context.validator, "required");
        assert_eq!(errors[0].message, "Code is required");
    }

    #[test]
    fn pattern_and_length_are_named_by_rule() {
        let schema = text_schema(ValidationRules {
            pattern: Some("[a-z]+".to_string()),
            max_length: Some(3),
            ..Default::default()
        });
        let rules = FieldRules::compile(&schema, FieldCategory::TextField)
            .expect("compile")
            .expect("rules");
        let errors = rules.check(&schema, FieldCategory::TextField, "code", &json!("ABCD"));
        let mut names: Vec<_> = errors.iter().map(|e| e.context.validator.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["maxLength", "pattern"]);
    }

    #[test]
    fn masks_translate_to_anchored_regexes() {
        let regex = mask_regex("999-aa").expect("mask");
        assert!(regex.is_match("123-ab"));
        assert!(!regex.is_match("12-abc"));
    }

    #[test]
    fn unchecked_checkbox_counts_as_empty() {
        assert!(is_empty_value(&json!(false), FieldCategory::Checkbox));
        assert!(!is_empty_value(&json!(false), FieldCategory::Radio));
        assert!(is_empty_value(&json!({"a": false}), FieldCategory::SelectBoxes));
    }

    #[test]
    fn fields_without_rules_compile_to_nothing() {
        let schema = FieldSchema::new("textfield", "free");
        assert!(
            FieldRules::compile(&schema, FieldCategory::TextField)
                .expect("compile")
                .is_none()
        );
    }
}

use serde::Deserialize;
use serde_json::{Map, Value};

use super::category::FieldCategory;

/// Display mode of a whole form definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormDisplay {
    #[default]
    Form,
    Wizard,
    Pdf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormDefinition {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub display: FormDisplay,
    #[serde(default)]
    pub components: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub min_length: Option<u64>,
    #[serde(default)]
    pub max_length: Option<u64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub custom_message: Option<String>,
}

impl ValidationRules {
    pub fn is_empty(&self) -> bool {
        *self == ValidationRules::default()
    }

    /// Rules as a JSON object, as forwarded onto visual tags.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("required".to_string(), Value::Bool(self.required));
        if let Some(pattern) = &self.pattern {
            map.insert("pattern".to_string(), Value::String(pattern.clone()));
        }
        if let Some(min_length) = self.min_length {
            map.insert("minLength".to_string(), Value::from(min_length));
        }
        if let Some(max_length) = self.max_length {
            map.insert("maxLength".to_string(), Value::from(max_length));
        }
        if let Some(min) = self.min {
            map.insert("min".to_string(), Value::from(min));
        }
        if let Some(max) = self.max {
            map.insert("max".to_string(), Value::from(max));
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: Value,
}

/// Declarative description of one form field, read-only to the bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default = "default_true")]
    pub input: bool,
    #[serde(default)]
    pub validate: ValidationRules,
    #[serde(default)]
    pub input_mask: Option<String>,
    #[serde(default)]
    pub custom_options: Map<String, Value>,
    #[serde(default)]
    pub values: Vec<SelectOption>,
    #[serde(default)]
    pub disable_multi_value_wrapping: bool,
    #[serde(default)]
    pub components: Vec<FieldSchema>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl FieldSchema {
    pub fn new(type_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            key: key.into(),
            id: String::new(),
            label: None,
            default_value: None,
            multiple: false,
            disabled: false,
            read_only: false,
            input: true,
            validate: ValidationRules::default(),
            input_mask: None,
            custom_options: Map::new(),
            values: Vec::new(),
            disable_multi_value_wrapping: false,
            components: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn category(&self) -> Option<FieldCategory> {
        FieldCategory::from_type_name(&self.type_name)
    }

    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) if !label.eq_ignore_ascii_case(&self.key) => {
                format!("{} ({})", label, self.key)
            }
            Some(label) => label.clone(),
            None => self.key.clone(),
        }
    }

    /// Schema field lookup by its JSON name, used for descriptor forwarding.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "key" => Some(Value::String(self.key.clone())),
            "label" => self.label.clone().map(Value::String),
            "multiple" => Some(Value::Bool(self.multiple)),
            "inputMask" => self.input_mask.clone().map(Value::String),
            "values" => Some(Value::Array(
                self.values
                    .iter()
                    .map(|option| {
                        let mut map = Map::new();
                        map.insert("label".to_string(), Value::String(option.label.clone()));
                        map.insert("value".to_string(), option.value.clone());
                        Value::Object(map)
                    })
                    .collect(),
            )),
            other => self.extra.get(other).cloned(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_children(mut self, children: Vec<FieldSchema>) -> Self {
        self.components = children;
        self
    }
}

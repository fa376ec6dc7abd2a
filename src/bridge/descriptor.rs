use serde_json::{Map, Value};

use crate::domain::FieldCategory;

/// What a visual implementation declares about itself when it is bridged.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualDescriptor {
    pub category: FieldCategory,
    pub tag: String,
    /// Options merged under the schema's own `customOptions`.
    pub schema_defaults: Map<String, Value>,
    /// Replaces the category's empty value.
    pub empty_value: Option<Value>,
    /// Extra schema fields forwarded onto the tag as properties.
    pub forwarded_fields: Vec<String>,
    /// Field event the visual raises when its value changed.
    pub change_event: Option<String>,
}

impl VisualDescriptor {
    pub fn new(category: FieldCategory, tag: impl Into<String>) -> Self {
        Self {
            category,
            tag: tag.into(),
            schema_defaults: Map::new(),
            empty_value: None,
            forwarded_fields: Vec::new(),
            change_event: None,
        }
    }

    /// Descriptor with the conventional `fb-<type>` tag.
    pub fn for_category(category: FieldCategory) -> Self {
        Self::new(category, default_tag(category))
    }

    pub fn with_schema_default(mut self, name: impl Into<String>, value: Value) -> Self {
        self.schema_defaults.insert(name.into(), value);
        self
    }

    pub fn with_empty_value(mut self, value: Value) -> Self {
        self.empty_value = Some(value);
        self
    }

    pub fn with_forwarded_field(mut self, name: impl Into<String>) -> Self {
        self.forwarded_fields.push(name.into());
        self
    }

    pub fn with_change_event(mut self, name: impl Into<String>) -> Self {
        self.change_event = Some(name.into());
        self
    }

    /// Schema options with descriptor defaults filling the gaps.
    pub fn custom_options(&self, schema_options: &Map<String, Value>) -> Map<String, Value> {
        let mut options = self.schema_defaults.clone();
        for (name, value) in schema_options {
            options.insert(name.clone(), value.clone());
        }
        options
    }
}

pub fn default_tag(category: FieldCategory) -> String {
    format!("fb-{}", category.type_name().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_tags_are_hyphenated_lowercase() {
        assert_eq!(default_tag(FieldCategory::PhoneNumber), "fb-phonenumber");
        assert_eq!(
            VisualDescriptor::for_category(FieldCategory::DataGrid).tag,
            "fb-datagrid"
        );
    }

    #[test]
    fn schema_options_override_descriptor_defaults() {
        let descriptor = VisualDescriptor::for_category(FieldCategory::Select)
            .with_schema_default("searchable", json!(false))
            .with_schema_default("placeholder", json!("Pick one"));
        let mut schema = Map::new();
        schema.insert("searchable".to_string(), json!(true));
        let options = descriptor.custom_options(&schema);
        assert_eq!(options["searchable"], json!(true));
        assert_eq!(options["placeholder"], json!("Pick one"));
    }
}

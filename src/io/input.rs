use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use super::DocumentFormat;

/// Parse structured data in any supported format into a `serde_json::Value`.
pub fn parse_document_str(contents: &str, format: DocumentFormat) -> Result<Value> {
    match format {
        DocumentFormat::Json => {
            serde_json::from_str::<Value>(contents).with_context(|| "failed to parse JSON document")
        }
        #[cfg(feature = "yaml")]
        DocumentFormat::Yaml => {
            serde_yaml::from_str::<Value>(contents).with_context(|| "failed to parse YAML document")
        }
        #[cfg(feature = "toml")]
        DocumentFormat::Toml => toml::from_str::<toml::Table>(contents)
            .with_context(|| "failed to parse TOML document")
            .and_then(|table| {
                serde_json::to_value(table).context("failed to convert TOML to JSON")
            }),
    }
}

/// Try `preferred` first, then every other compiled-in format.
pub fn parse_with_fallback(contents: &str, preferred: DocumentFormat) -> Result<Value> {
    let primary = match parse_document_str(contents, preferred) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    DocumentFormat::available_formats()
        .into_iter()
        .filter(|candidate| *candidate != preferred)
        .find_map(|candidate| parse_document_str(contents, candidate).ok())
        .ok_or_else(|| {
            let tried: Vec<String> = DocumentFormat::available_formats()
                .iter()
                .map(ToString::to_string)
                .collect();
            anyhow!("tried {} (first error: {primary:#})", tried.join(", "))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_json_documents() {
        let raw = "{\"components\":[]}";
        let parsed = parse_document_str(raw, DocumentFormat::Json).unwrap();
        assert_eq!(parsed["components"], json!([]));
    }

    #[test]
    fn garbage_reports_every_format_tried() {
        let err = parse_with_fallback("{not a document", DocumentFormat::Json).unwrap_err();
        assert!(err.to_string().contains("json"));
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn parse_yaml_documents() {
        let raw = "display: wizard\ncomponents: []";
        let parsed = parse_document_str(raw, DocumentFormat::Yaml).unwrap();
        assert_eq!(parsed["display"], json!("wizard"));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn parse_toml_documents() {
        let raw = "name = \"Ada\"\nterms = true";
        let parsed = parse_document_str(raw, DocumentFormat::Toml).unwrap();
        assert_eq!(parsed["terms"], Value::Bool(true));
        assert_eq!(parsed["name"], json!("Ada"));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn toml_form_definitions_keep_nested_components() {
        let raw = r#"
title = "Signup"

[[components]]
type = "textfield"
key = "name"

[components.validate]
required = true
"#;
        let parsed = parse_document_str(raw, DocumentFormat::Toml).unwrap();
        assert_eq!(parsed["title"], json!("Signup"));
        assert_eq!(parsed["components"][0]["key"], json!("name"));
        assert_eq!(parsed["components"][0]["validate"]["required"], json!(true));
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn fallback_accepts_yaml_given_as_json() {
        let parsed = parse_with_fallback("name: Ada", DocumentFormat::Json).unwrap();
        assert_eq!(parsed["name"], json!("Ada"));
    }
}

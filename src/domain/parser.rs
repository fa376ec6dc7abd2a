use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use super::schema::{FieldSchema, FormDefinition};

/// Parse a form definition document, assigning stable ids to nodes without one.
pub fn parse_form_definition(value: &Value) -> Result<FormDefinition> {
    if !value.is_object() {
        bail!("form definition must be a JSON object");
    }
    let mut definition: FormDefinition =
        serde_json::from_value(value.clone()).context("failed to read form definition")?;

    let mut ids = HashSet::new();
    collect_explicit_ids(&definition.components, &mut ids)?;
    let mut ordinal = 0usize;
    assign_ids(&mut definition.components, &mut ids, &mut ordinal);
    check_components(&definition.components, "")?;
    Ok(definition)
}

fn collect_explicit_ids(components: &[FieldSchema], ids: &mut HashSet<String>) -> Result<()> {
    for component in components {
        if !component.id.is_empty() && !ids.insert(component.id.clone()) {
            bail!("duplicate component id '{}'", component.id);
        }
        collect_explicit_ids(&component.components, ids)?;
    }
    Ok(())
}

fn assign_ids(components: &mut [FieldSchema], ids: &mut HashSet<String>, ordinal: &mut usize) {
    for component in components {
        if component.id.is_empty() {
            loop {
                let candidate = format!("c{ordinal}");
                *ordinal += 1;
                if ids.insert(candidate.clone()) {
                    component.id = candidate;
                    break;
                }
            }
        }
        assign_ids(&mut component.components, ids, ordinal);
    }
}

fn check_components(components: &[FieldSchema], scope: &str) -> Result<()> {
    let mut keys = HashSet::new();
    check_scope(components, scope, &mut keys)
}

fn check_scope(components: &[FieldSchema], scope: &str, keys: &mut HashSet<String>) -> Result<()> {
    for component in components {
        let Some(category) = component.category() else {
            // Unknown types are resolved against the catalog when the form is created.
            continue;
        };
        if category.is_input() {
            if component.key.is_empty() {
                bail!(
                    "component '{}' of type {} has no key",
                    component.id,
                    component.type_name
                );
            }
            if !keys.insert(component.key.clone()) {
                bail!("duplicate key '{}' in scope '{}'", component.key, scope_label(scope));
            }
        }
        if category.nests_data() {
            check_components(&component.components, &component.key)?;
        } else {
            check_scope(&component.components, scope, keys)?;
        }
    }
    Ok(())
}

fn scope_label(scope: &str) -> &str {
    if scope.is_empty() { "<root>" } else { scope }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FormDisplay;
    use serde_json::json;

    #[test]
    fn assigns_sequential_ids_around_explicit_ones() {
        let definition = parse_form_definition(&json!({
            "components": [
                {"type": "textfield", "key": "name"},
                {"type": "checkbox", "key": "agree", "id": "c0"},
                {"type": "number", "key": "age"}
            ]
        }))
        .expect("definition");
        let ids: Vec<_> = definition.components.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c0", "c2"]);
        assert_eq!(definition.display, FormDisplay::Form);
    }

    #[test]
    fn rejects_duplicate_keys_in_same_scope() {
        let err = parse_form_definition(&json!({
            "components": [
                {"type": "textfield", "key": "name"},
                {"type": "panel", "key": "p", "components": [
                    {"type": "textfield", "key": "name"}
                ]}
            ]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("duplicate key 'name'"));
    }

    #[test]
    fn grid_children_live_in_their_own_scope() {
        let definition = parse_form_definition(&json!({
            "display": "pdf",
            "components": [
                {"type": "textfield", "key": "name"},
                {"type": "datagrid", "key": "rows", "components": [
                    {"type": "textfield", "key": "name"}
                ]}
            ]
        }))
        .expect("definition");
        assert_eq!(definition.display, FormDisplay::Pdf);
        assert_eq!(definition.components[1].components.len(), 1);
    }

    #[test]
    fn input_without_key_is_rejected() {
        let err = parse_form_definition(&json!({
            "components": [{"type": "email"}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("has no key"));
    }
}

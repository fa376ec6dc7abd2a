use serde_json::Value;

use super::convert::value_kind;
use super::{ValueError, VisualBehavior};
use crate::domain::{FieldCategory, FieldSchema};

/// Grids, containers and self-managed sub-trees; the value is the nested data.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerVisual;

impl VisualBehavior for ContainerVisual {
    fn normalize(&self, schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        let rows = schema
            .category()
            .is_some_and(FieldCategory::is_row_container);
        match value {
            Value::Null if rows => Ok(Value::Array(Vec::new())),
            Value::Null => Ok(Value::Null),
            Value::Array(_) if rows => Ok(value.clone()),
            Value::Object(_) if !rows => Ok(value.clone()),
            other => Err(ValueError::Unsupported {
                expected: if rows { "rows" } else { "object" },
                found: value_kind(other),
            }),
        }
    }

    fn normalize_value(&self, schema: &FieldSchema, value: &Value) -> Result<Value, ValueError> {
        self.normalize(schema, value)
    }

    fn display_value(&self, schema: &FieldSchema, value: &Value) -> String {
        match value {
            Value::Array(rows) => format!("{} row(s)", rows.len()),
            Value::Object(map) => format!("{} field(s)", map.len()),
            _ => format!("{} item(s)", schema.components.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn grids_hold_rows_and_containers_hold_objects() {
        let grid = FieldSchema::new("datagrid", "rows");
        let container = FieldSchema::new("container", "address");
        assert_eq!(ContainerVisual.normalize(&grid, &Value::Null), Ok(json!([])));
        assert!(ContainerVisual.normalize(&grid, &json!({})).is_err());
        assert_eq!(
            ContainerVisual.normalize(&container, &json!({"city": "Oslo"})),
            Ok(json!({"city": "Oslo"}))
        );
        assert_eq!(ContainerVisual.display_value(&grid, &json!([{}, {}])), "2 row(s)");
    }
}

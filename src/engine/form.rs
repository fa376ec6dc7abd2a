use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

use super::catalog::ComponentCatalog;
use super::events::EngineEvent;
use super::instance::{EngineInstance, InstanceInit, SharedData};
use super::options::EngineOptions;
use super::path::DataPath;
use super::render;
use super::validation::{FieldError, FieldRules};
use crate::dom::{Element, Markup, UiHost};
use crate::domain::{FieldSchema, FormDefinition, FormDisplay};

struct FormNode {
    instance: Rc<EngineInstance>,
    children: Vec<FormNode>,
}

/// The reference form engine: builds and drives the instance tree.
pub struct Form {
    definition: FormDefinition,
    catalog: ComponentCatalog,
    options: Rc<EngineOptions>,
    data: SharedData,
    nodes: Vec<FormNode>,
    element: Option<Element>,
}

impl Form {
    pub fn create(
        definition: FormDefinition,
        catalog: &ComponentCatalog,
        options: EngineOptions,
    ) -> Result<Self> {
        let mut form = Self {
            definition,
            catalog: catalog.clone(),
            options: Rc::new(options),
            data: Rc::new(RefCell::new(Value::Object(Map::new()))),
            nodes: Vec::new(),
            element: None,
        };
        form.rebuild()?;
        Ok(form)
    }

    pub fn definition(&self) -> &FormDefinition {
        &self.definition
    }

    pub fn display(&self) -> FormDisplay {
        self.definition.display
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn element(&self) -> Option<Element> {
        self.element.clone()
    }

    /// Replace every instance with a fresh one built from the current data.
    pub fn rebuild(&mut self) -> Result<()> {
        let components = self.definition.components.clone();
        self.nodes = self.build_nodes(&components, &DataPath::root(), None, None, "")?;
        self.element = None;
        Ok(())
    }

    fn build_nodes(
        &self,
        schemas: &[FieldSchema],
        base: &DataPath,
        parent: Option<&Rc<EngineInstance>>,
        row: Option<usize>,
        qualifier: &str,
    ) -> Result<Vec<FormNode>> {
        let mut nodes = Vec::with_capacity(schemas.len());
        for schema in schemas {
            let class = self.catalog.get(&schema.type_name).with_context(|| {
                format!(
                    "unknown component type '{}' for '{}'",
                    schema.type_name, schema.key
                )
            })?;
            let category = class.category();
            let path = if category.is_input() {
                base.child_key(&schema.key)
            } else {
                base.clone()
            };
            let rules = FieldRules::compile(schema, category)?;
            let instance = EngineInstance::new(InstanceInit {
                node_id: format!("{}{}", schema.id, qualifier),
                schema: Rc::new(schema.clone()),
                class,
                path: path.clone(),
                row_index: row,
                parent: parent.map(Rc::downgrade),
                data: Rc::clone(&self.data),
                options: Rc::clone(&self.options),
                display: self.definition.display,
                rules,
            });
            self.apply_default(&instance);

            let children = if category.is_row_container() {
                let rows = row_len(instance.data_value().as_ref());
                instance.set_row_count(rows);
                let mut children = Vec::new();
                for index in 0..rows {
                    children.extend(self.build_nodes(
                        &schema.components,
                        &path.child_index(index),
                        Some(&instance),
                        Some(index),
                        &format!("{qualifier}[{index}]"),
                    )?);
                }
                children
            } else if category.nests_data() {
                self.build_nodes(&schema.components, &path, Some(&instance), None, qualifier)?
            } else {
                self.build_nodes(&schema.components, base, Some(&instance), None, qualifier)?
            };
            nodes.push(FormNode { instance, children });
        }
        Ok(nodes)
    }

    /// Engine-side default application for fields without data.
    fn apply_default(&self, instance: &EngineInstance) {
        if !instance.category().is_input() || instance.data_value().is_some() {
            return;
        }
        if instance.category().is_row_container() {
            let rows = match instance.default_value() {
                Value::Array(items) if !items.is_empty() => Value::Array(items),
                _ => Value::Array(vec![Value::Object(Map::new())]),
            };
            instance.set_value(rows);
        } else if instance.schema().default_value.is_some() {
            instance.set_value(instance.default_value());
        }
    }

    pub fn instances(&self) -> Vec<Rc<EngineInstance>> {
        fn walk(nodes: &[FormNode], acc: &mut Vec<Rc<EngineInstance>>) {
            for node in nodes {
                acc.push(Rc::clone(&node.instance));
                walk(&node.children, acc);
            }
        }
        let mut acc = Vec::new();
        walk(&self.nodes, &mut acc);
        acc
    }

    /// Look up by data path (`grid[1].name`) first, then by bare key.
    pub fn instance(&self, path_or_key: &str) -> Option<Rc<EngineInstance>> {
        let instances = self.instances();
        instances
            .iter()
            .find(|instance| {
                instance.category().is_input() && instance.path().to_string() == path_or_key
            })
            .or_else(|| instances.iter().find(|instance| instance.key() == path_or_key))
            .cloned()
    }

    pub fn instance_by_node(&self, node_id: &str) -> Option<Rc<EngineInstance>> {
        self.instances()
            .into_iter()
            .find(|instance| instance.node_id() == node_id)
    }

    pub fn render(&self) -> Markup {
        fn render_node(node: &FormNode) -> Markup {
            let children = node.children.iter().map(render_node).collect();
            node.instance.class().render(&node.instance, children)
        }
        let mut root = render::tag("div", &[("class", "formio-form"), ("ref", "form")]);
        for node in &self.nodes {
            root.push_child(render_node(node));
        }
        root
    }

    /// Attach every instance to its container inside the mounted `element`.
    pub fn attach(&mut self, element: &Element, host: &UiHost) {
        fn attach_node(node: &FormNode, scope: &Element, host: &UiHost) {
            let reference = render::component_ref(node.instance.node_id());
            let container = scope.find_by_attribute("ref", &reference);
            match &container {
                Some(container) => node.instance.class().attach(&node.instance, container, host),
                None => tracing::warn!(
                    node = node.instance.node_id(),
                    "component container missing from mounted markup"
                ),
            }
            let child_scope = container.unwrap_or_else(|| scope.clone());
            for child in &node.children {
                attach_node(child, &child_scope, host);
            }
        }
        for node in &self.nodes {
            attach_node(node, element, host);
        }
        self.element = Some(element.clone());
    }

    /// Replace the submission data; returns whether grid row counts changed,
    /// in which case the caller must rebuild and redraw.
    pub fn set_submission(&self, data: Value) -> bool {
        let instances = self.instances();
        for instance in &instances {
            instance.emit(&EngineEvent::BeforeSetSubmission);
        }
        *self.data.borrow_mut() = match data {
            Value::Object(map) => Value::Object(map),
            other => {
                tracing::warn!(kind = value_kind(&other), "submission data must be an object");
                Value::Object(Map::new())
            }
        };
        for instance in &instances {
            if instance.category().is_input() {
                instance.trigger_change(false);
            }
        }
        self.rows_changed()
    }

    pub fn submission(&self) -> Value {
        self.data.borrow().clone()
    }

    fn rows_changed(&self) -> bool {
        self.instances().iter().any(|instance| {
            instance.category().is_row_container()
                && row_len(instance.data_value().as_ref()) != instance.row_count()
        })
    }

    pub fn validate(&self) -> Vec<FieldError> {
        self.instances()
            .iter()
            .filter(|instance| instance.category().is_input() && instance.is_visible())
            .flat_map(|instance| {
                let mut errors = instance.validate();
                errors.extend(instance.errors().into_iter().filter(|error| error.processor));
                errors
            })
            .collect()
    }

    pub fn broadcast(&self, event: &EngineEvent) {
        for instance in self.instances() {
            instance.emit(event);
        }
    }

    pub fn submit(&self) -> Result<Value, Vec<FieldError>> {
        self.broadcast(&EngineEvent::Submit);
        let errors = self.validate();
        if errors.is_empty() {
            self.broadcast(&EngineEvent::SubmitDone);
            Ok(self.submission())
        } else {
            self.broadcast(&EngineEvent::SubmitError);
            Err(errors)
        }
    }

    pub fn cancel(&self) {
        self.broadcast(&EngineEvent::Cancel);
    }

    /// Append an empty row to a grid; the caller rebuilds afterwards.
    pub fn add_row(&self, grid: &str) -> Result<usize> {
        let instance = self.grid(grid)?;
        let mut rows = match instance.data_value() {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        rows.push(Value::Object(Map::new()));
        let count = rows.len();
        instance.update_value(Value::Array(rows), true);
        instance.trigger_change(true);
        Ok(count)
    }

    pub fn remove_row(&self, grid: &str, index: usize) -> Result<usize> {
        let instance = self.grid(grid)?;
        let mut rows = match instance.data_value() {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        if index >= rows.len() {
            bail!("row {index} out of range for '{grid}' ({} rows)", rows.len());
        }
        rows.remove(index);
        let count = rows.len();
        instance.update_value(Value::Array(rows), true);
        instance.trigger_change(true);
        Ok(count)
    }

    fn grid(&self, grid: &str) -> Result<Rc<EngineInstance>> {
        let instance = self
            .instance(grid)
            .with_context(|| format!("no component '{grid}'"))?;
        if !instance.category().is_row_container() {
            bail!("component '{grid}' is not a grid");
        }
        Ok(instance)
    }
}

fn row_len(value: Option<&Value>) -> usize {
    value.and_then(Value::as_array).map(Vec::len).unwrap_or(0)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_form_definition;
    use crate::engine::EventKind;
    use serde_json::json;
    use std::cell::Cell;

    fn form(definition: Value) -> Form {
        let definition = parse_form_definition(&definition).expect("definition");
        Form::create(definition, &ComponentCatalog::with_natives(), EngineOptions::default())
            .expect("form")
    }

    fn grid_form() -> Form {
        form(json!({
            "components": [
                {"type": "textfield", "key": "title", "defaultValue": "untitled"},
                {"type": "datagrid", "key": "rows", "components": [
                    {"type": "panel", "key": "box", "components": [
                        {"type": "textfield", "key": "name"}
                    ]}
                ]}
            ]
        }))
    }

    #[test]
    fn applies_schema_defaults_and_seeds_one_grid_row() {
        let form = grid_form();
        assert_eq!(form.submission(), json!({"title": "untitled", "rows": [{}]}));
        let name = form.instance("rows[0].name").expect("row field");
        assert_eq!(name.node_id(), "c3[0]");
        assert_eq!(name.row_position(), Some(0));
        assert_eq!(form.instance("title").expect("title").row_position(), None);
    }

    #[test]
    fn rows_follow_submission_after_rebuild() {
        let mut form = grid_form();
        let changed = form.set_submission(json!({"rows": [{"name": "a"}, {"name": "b"}]}));
        assert!(changed);
        form.rebuild().expect("rebuild");
        let second = form.instance("rows[1].name").expect("second row");
        assert_eq!(second.row_position(), Some(1));
        assert_eq!(second.data_value(), Some(json!("b")));
    }

    #[test]
    fn unknown_types_fail_form_creation() {
        let definition = parse_form_definition(&json!({
            "components": [{"type": "hologram", "key": "x"}]
        }))
        .expect("definition");
        let err = Form::create(definition, &ComponentCatalog::with_natives(), EngineOptions::default())
            .err()
            .expect("error");
        assert!(err.to_string().contains("unknown component type 'hologram'"));
    }

    #[test]
    fn submit_reports_required_errors_and_lifecycle() {
        let form = form(json!({
            "components": [
                {"type": "textfield", "key": "name", "validate": {"required": true}},
                {"type": "button", "key": "submit", "input": true}
            ]
        }));
        let button = form.instance("submit").expect("button");
        let failures = Rc::new(Cell::new(0));
        let counter = Rc::clone(&failures);
        button
            .on(EventKind::SubmitError, move |_| counter.set(counter.get() + 1))
            .detach();
        let errors = form.submit().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].context.key, "name");
        assert_eq!(failures.get(), 1);

        form.instance("name").expect("name").set_value(json!("Ada"));
        assert_eq!(form.submit().expect("valid")["name"], json!("Ada"));
    }

    #[test]
    fn set_submission_announces_before_replacing_data() {
        let form = grid_form();
        let title = form.instance("title").expect("title");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        title
            .on(EventKind::BeforeSetSubmission, {
                let sink = Rc::clone(&sink);
                let title = Rc::clone(&title);
                move |_| sink.borrow_mut().push(format!("before:{}", title.data_value_or_empty()))
            })
            .detach();
        title
            .on(EventKind::Change, move |event| {
                if let EngineEvent::Change { value, modified } = event {
                    sink.borrow_mut().push(format!("change:{value}:{modified}"));
                }
            })
            .detach();
        form.set_submission(json!({"title": "fresh"}));
        assert_eq!(
            *seen.borrow(),
            vec!["before:\"untitled\"", "change:\"fresh\":false"]
        );
    }

    #[test]
    fn render_and_attach_count_native_inputs() {
        let mut form = form(json!({
            "components": [
                {"type": "textfield", "key": "name", "label": "Name"},
                {"type": "panel", "key": "p", "components": [
                    {"type": "checkbox", "key": "agree"}
                ]}
            ]
        }));
        let host = UiHost::new();
        let element = host.mount(&form.render(), crate::dom::MountMode::Compiled);
        form.attach(&element, &host);
        let name = form.instance("name").expect("name");
        let panel = form.instance("p").expect("panel");
        assert_eq!(name.input_refs(), 1);
        assert_eq!(panel.input_refs(), 0);
        assert_eq!(name.attach_passes(), 1);
        assert!(form.render().to_html().contains("<label for=\"c0-name\">Name</label>"));
    }

    #[test]
    fn add_and_remove_rows() {
        let form = grid_form();
        assert_eq!(form.add_row("rows").expect("add"), 2);
        assert_eq!(form.remove_row("rows", 0).expect("remove"), 1);
        assert!(form.remove_row("rows", 5).is_err());
        assert!(form.add_row("title").is_err());
    }
}

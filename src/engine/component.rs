use std::rc::Rc;

use serde_json::Value;

use super::instance::EngineInstance;
use super::render::{self, INPUT_REF};
use super::validation::mask_regex;
use crate::dom::{Element, Markup, UiHost};
use crate::domain::FieldCategory;

/// A component class installed in the catalog under one type name.
pub trait ComponentClass {
    fn category(&self) -> FieldCategory;

    fn type_name(&self) -> &str {
        self.category().type_name()
    }

    /// Whether rendering is delegated to a visual tag.
    fn is_bridged(&self) -> bool {
        false
    }

    fn empty_value(&self, instance: &EngineInstance) -> Value {
        instance.category().empty_value()
    }

    fn render(&self, instance: &EngineInstance, children: Vec<Markup>) -> Markup;

    /// Wire behaviour onto the mounted `element` (the instance's container).
    fn attach(&self, instance: &Rc<EngineInstance>, element: &Element, host: &UiHost);
}

/// The engine's own behaviour for a category.
#[derive(Debug, Clone, Copy)]
pub struct NativeComponent {
    category: FieldCategory,
}

impl NativeComponent {
    pub fn new(category: FieldCategory) -> Self {
        Self { category }
    }

    /// Wrapper, label, the given input, then child markup.
    pub fn render_with_input(
        &self,
        instance: &EngineInstance,
        input: Option<Markup>,
        children: Vec<Markup>,
    ) -> Markup {
        let mut markup = render::wrapper(instance);
        if self.category != FieldCategory::Button
            && let Some(label) = render::label(instance)
        {
            markup.push_child(label);
        }
        if let Some(input) = input {
            markup.push_child(input);
        }
        markup.with_children(children)
    }

    pub fn native_input(&self, instance: &EngineInstance) -> Option<Markup> {
        let name = format!("data[{}]", instance.key());
        let id = render::input_id(instance);
        let input = |input_type: &str| {
            render::tag(
                "input",
                &[
                    ("ref", INPUT_REF),
                    ("type", input_type),
                    ("name", name.as_str()),
                    ("id", id.as_str()),
                ],
            )
        };
        let markup = match self.category {
            FieldCategory::TextField | FieldCategory::Tags | FieldCategory::Day => input("text"),
            FieldCategory::Number | FieldCategory::Currency => input("number"),
            FieldCategory::Password => input("password"),
            FieldCategory::Email => input("email"),
            FieldCategory::Url => input("url"),
            FieldCategory::PhoneNumber => input("tel"),
            FieldCategory::Checkbox => input("checkbox"),
            FieldCategory::Radio | FieldCategory::SelectBoxes => input("radio"),
            FieldCategory::DateTime => input("datetime-local"),
            FieldCategory::Time => input("time"),
            FieldCategory::File => input("file"),
            FieldCategory::Signature => input("hidden"),
            FieldCategory::TextArea => render::tag(
                "textarea",
                &[("ref", INPUT_REF), ("name", name.as_str()), ("id", id.as_str())],
            ),
            FieldCategory::Select => render::tag(
                "select",
                &[("ref", INPUT_REF), ("name", name.as_str()), ("id", id.as_str())],
            )
            .with_children(instance.schema().values.iter().map(|option| {
                let value = match &option.value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                render::tag("option", &[("value", value.as_str())])
                    .with_child(Markup::text(option.label.clone()))
            })),
            FieldCategory::Button => {
                let text = instance
                    .schema()
                    .label
                    .clone()
                    .unwrap_or_else(|| "Submit".to_string());
                render::tag("button", &[("ref", "button"), ("name", name.as_str())])
                    .with_child(Markup::text(text))
            }
            FieldCategory::Content | FieldCategory::HtmlElement => {
                let html = instance
                    .schema()
                    .extra
                    .get("html")
                    .or_else(|| instance.schema().extra.get("content"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                render::tag("div", &[("ref", "html")]).with_child(Markup::text(html))
            }
            _ => return None,
        };
        Some(markup)
    }

    /// Non-visual wiring shared by every class: input refs, masks, bookkeeping.
    pub fn attach_base(&self, instance: &EngineInstance, element: &Element) {
        instance.set_element(element);
        instance.set_input_refs(render::count_input_refs(element));
        let mask = match instance.schema().input_mask.as_deref() {
            Some(mask) => match mask_regex(mask) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    tracing::warn!(key = instance.key(), %err, "ignoring invalid input mask");
                    None
                }
            },
            None => None,
        };
        instance.set_mask(mask);
        instance.record_attach_pass();
        tracing::trace!(
            node = instance.node_id(),
            refs = instance.input_refs(),
            "base attach"
        );
    }
}

impl ComponentClass for NativeComponent {
    fn category(&self) -> FieldCategory {
        self.category
    }

    fn render(&self, instance: &EngineInstance, children: Vec<Markup>) -> Markup {
        self.render_with_input(instance, self.native_input(instance), children)
    }

    fn attach(&self, instance: &Rc<EngineInstance>, element: &Element, _host: &UiHost) {
        self.attach_base(instance, element);
    }
}

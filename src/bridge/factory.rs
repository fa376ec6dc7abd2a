use std::rc::Rc;

use serde_json::Value;

use super::binding::{BindingKey, FIELD_ATTR};
use super::bus::{BusMessage, EventBus, Topic};
use super::descriptor::VisualDescriptor;
use super::strategy::{AttachStrategy, strategy_for};
use crate::dom::{Element, Markup, UiHost};
use crate::domain::{FieldCategory, FormDisplay};
use crate::engine::render::{self, INPUT_REF};
use crate::engine::{ComponentClass, EngineEvent, EngineInstance, NativeComponent};

/// Engine component class whose input is a custom visual tag.
///
/// Built from the engine's native class for the same category: the native
/// wrapper and label are kept, the native input is swapped for the tag, and
/// attach pairs the tag's visual with the engine instance over the bus.
pub struct BridgeComponent {
    descriptor: Rc<VisualDescriptor>,
    base: NativeComponent,
    strategy: &'static dyn AttachStrategy,
    bus: EventBus,
}

impl BridgeComponent {
    pub fn new(descriptor: Rc<VisualDescriptor>, bus: EventBus) -> Self {
        let category = descriptor.category;
        Self {
            descriptor,
            base: NativeComponent::new(category),
            strategy: strategy_for(category),
            bus,
        }
    }

    pub fn descriptor(&self) -> &VisualDescriptor {
        &self.descriptor
    }

    pub(crate) fn base(&self) -> &NativeComponent {
        &self.base
    }

    pub(crate) fn render_tag(&self, instance: &EngineInstance, input_ref: bool) -> Markup {
        let key = BindingKey::for_instance(instance);
        let mut markup = Markup::element(self.descriptor.tag.as_str()).with_attr("id", key.id());
        if let Some(field) = key.field() {
            markup = markup.with_attr(FIELD_ATTR, field);
        }
        if input_ref {
            markup = markup.with_attr("ref", INPUT_REF);
        }
        markup.with_attr("name", format!("data[{}]", instance.key()))
    }

    /// Shared attach for every input-like class. Returns the tag the visual
    /// lives on, or `None` when the field is left inert.
    pub(crate) fn attach_generic(
        &self,
        instance: &Rc<EngineInstance>,
        container: &Element,
        host: &UiHost,
    ) -> Option<Element> {
        self.base.attach_base(instance, container);
        let tag = self.locate_tag(instance, container, host)?;
        self.announce(instance, &tag);
        self.forward(instance, &tag);
        self.listen(instance, &tag);
        self.restore(instance, &tag);
        host.request_refresh();
        Some(tag)
    }

    /// The instance's own tag; a static tag left by raw injection is replaced
    /// by a host-created one and base attach runs once more.
    fn locate_tag(
        &self,
        instance: &EngineInstance,
        container: &Element,
        host: &UiHost,
    ) -> Option<Element> {
        let tag_name = self.descriptor.tag.as_str();
        let Some(tag) = render::find_own(container, &|element| element.tag() == tag_name) else {
            tracing::error!(
                key = instance.key(),
                tag = tag_name,
                node = instance.node_id(),
                "visual tag missing from rendered markup; field stays inert"
            );
            return None;
        };
        if tag.is_upgraded() {
            return Some(tag);
        }
        let replacement = host.create_element(tag_name);
        if !replacement.is_upgraded() {
            tracing::error!(
                key = instance.key(),
                tag = tag_name,
                "tag is not defined on the host; field stays inert"
            );
            return None;
        }
        for (name, value) in tag.attributes() {
            replacement.set_attribute(&name, value);
        }
        if !tag.replace_with(&replacement) {
            tracing::warn!(key = instance.key(), tag = tag_name, "static tag has no parent");
            return None;
        }
        tracing::debug!(key = instance.key(), tag = tag_name, "replaced static tag with a live one");
        self.base.attach_base(instance, container);
        Some(replacement)
    }

    pub(crate) fn announce(&self, instance: &Rc<EngineInstance>, tag: &Element) {
        let key = BindingKey::for_instance(instance);
        key.stamp(tag);
        let delivered = self
            .bus
            .emit(&Topic::bind(key.clone()), BusMessage::Bind(Rc::clone(instance)));
        if delivered == 0 {
            tracing::debug!(%key, "no visual listening; instance stays engine-only");
        }
    }

    pub(crate) fn forward(&self, instance: &EngineInstance, tag: &Element) {
        let schema = instance.schema();
        let options = self.descriptor.custom_options(&schema.custom_options);
        tag.set_property("customOptions", Value::Object(options));
        tag.set_property("validate", schema.validate.to_value());
        for name in &self.descriptor.forwarded_fields {
            if let Some(value) = schema.field(name) {
                tag.set_property(name, value);
            }
        }
    }

    fn listen(&self, instance: &Rc<EngineInstance>, tag: &Element) {
        tag.clear_field_event_listeners();
        let weak = Rc::downgrade(instance);
        let element = tag.downgrade();
        let change_event = self.descriptor.change_event.clone();
        tag.add_field_event_listener(move |event| {
            let Some(instance) = weak.upgrade() else {
                return;
            };
            if change_event.as_deref() == Some(event.name.as_str()) {
                instance.update_value(event.data.clone(), true);
                instance.trigger_change(true);
                return;
            }
            instance.emit(&EngineEvent::Custom {
                name: event.name.clone(),
                data: event.data.clone(),
            });
            if let Some(value) = element.upgrade().and_then(|tag| tag.value()) {
                instance.update_value(value, true);
            }
        });
    }

    fn restore(&self, instance: &EngineInstance, tag: &Element) {
        let empty = match tag.value() {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => text.is_empty(),
            Some(_) => false,
        };
        if empty && !instance.schema().disable_multi_value_wrapping {
            instance.restore_value(tag);
        }
    }
}

impl ComponentClass for BridgeComponent {
    fn category(&self) -> FieldCategory {
        self.descriptor.category
    }

    fn is_bridged(&self) -> bool {
        true
    }

    fn empty_value(&self, instance: &EngineInstance) -> Value {
        self.descriptor
            .empty_value
            .clone()
            .unwrap_or_else(|| instance.category().empty_value())
    }

    fn render(&self, instance: &EngineInstance, children: Vec<Markup>) -> Markup {
        self.strategy.render(self, instance, children)
    }

    fn attach(&self, instance: &Rc<EngineInstance>, element: &Element, host: &UiHost) {
        tracing::trace!(
            key = instance.key(),
            tag = self.descriptor.tag.as_str(),
            pdf = instance.display() == FormDisplay::Pdf,
            "bridged attach"
        );
        self.strategy.attach(self, instance, element, host);
    }
}

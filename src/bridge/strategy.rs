use std::rc::Rc;

use super::factory::BridgeComponent;
use crate::dom::{Element, Markup, UiHost};
use crate::domain::FieldCategory;
use crate::engine::{EngineInstance, EventKind, ListenerGuard};

/// Attribute a bridged button's tag carries to mirror the submit lifecycle.
pub const SUBMIT_STATE_ATTR: &str = "submit-state";

/// Per-category rendering and attach behaviour of a bridged class.
pub(crate) trait AttachStrategy {
    fn render(&self, bridge: &BridgeComponent, instance: &EngineInstance, children: Vec<Markup>) -> Markup;

    fn attach(&self, bridge: &BridgeComponent, instance: &Rc<EngineInstance>, container: &Element, host: &UiHost);
}

pub(crate) struct GenericAttach;
pub(crate) struct ButtonAttach;
pub(crate) struct ContainerAttach;

pub(crate) fn strategy_for(category: FieldCategory) -> &'static dyn AttachStrategy {
    match category {
        FieldCategory::Button => &ButtonAttach,
        FieldCategory::Wizard | FieldCategory::Pdf | FieldCategory::Builder => &ContainerAttach,
        _ => &GenericAttach,
    }
}

impl AttachStrategy for GenericAttach {
    fn render(&self, bridge: &BridgeComponent, instance: &EngineInstance, children: Vec<Markup>) -> Markup {
        let has_input = bridge.base().native_input(instance).is_some();
        let tag = bridge.render_tag(instance, has_input);
        bridge.base().render_with_input(instance, Some(tag), children)
    }

    fn attach(&self, bridge: &BridgeComponent, instance: &Rc<EngineInstance>, container: &Element, host: &UiHost) {
        bridge.attach_generic(instance, container, host);
    }
}

impl AttachStrategy for ButtonAttach {
    fn render(&self, bridge: &BridgeComponent, instance: &EngineInstance, children: Vec<Markup>) -> Markup {
        GenericAttach.render(bridge, instance, children)
    }

    fn attach(&self, bridge: &BridgeComponent, instance: &Rc<EngineInstance>, container: &Element, host: &UiHost) {
        let Some(tag) = bridge.attach_generic(instance, container, host) else {
            return;
        };
        let element = tag.downgrade();
        let guards: Vec<ListenerGuard> = [
            (EventKind::Submit, "submitting"),
            (EventKind::SubmitDone, "done"),
            (EventKind::SubmitError, "error"),
            (EventKind::Cancel, "cancelled"),
            (EventKind::Change, "idle"),
        ]
        .into_iter()
        .map(|(kind, state)| {
            let element = element.clone();
            instance.on(kind, move |_| {
                if let Some(tag) = element.upgrade() {
                    tag.set_attribute(SUBMIT_STATE_ATTR, state);
                }
            })
        })
        .collect();
        instance.replace_wiring("submit-state", guards);
    }
}

/// Wizard, pdf and builder: the tag wraps the engine's own markup instead of
/// replacing an input, and the generic input wiring is skipped.
impl AttachStrategy for ContainerAttach {
    fn render(&self, bridge: &BridgeComponent, instance: &EngineInstance, children: Vec<Markup>) -> Markup {
        bridge.base().render_with_input(instance, None, children)
    }

    fn attach(&self, bridge: &BridgeComponent, instance: &Rc<EngineInstance>, container: &Element, host: &UiHost) {
        bridge.base().attach_base(instance, container);
        let tag_name = bridge.descriptor().tag.as_str();
        let existing = container
            .children()
            .into_iter()
            .find(|child| child.tag() == tag_name);
        let tag = match existing {
            Some(tag) => tag,
            None => {
                let tag = host.create_element(tag_name);
                for child in container.children() {
                    container.remove_child(&child);
                    tag.append_child(&child);
                }
                container.append_child(&tag);
                tag
            }
        };
        bridge.announce(instance, &tag);
        bridge.forward(instance, &tag);
        host.request_refresh();
    }
}


use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use super::BridgeContext;
use super::adapter::VisualComponent;
use super::descriptor::VisualDescriptor;
use super::error::RegistrationError;
use super::factory::BridgeComponent;
use crate::dom::{CustomElement, Element, ElementConstructor, UiHost};
use crate::domain::FieldCategory;
use crate::engine::ComponentCatalog;
use crate::visuals::{TAG_ONLY_TAGS, TagOnlyElement, VisualBehavior, behavior_for};

/// One bridged category: what the visual declares and how it edits values.
#[derive(Clone)]
pub struct VisualRegistration {
    pub descriptor: Rc<VisualDescriptor>,
    pub behavior: Rc<dyn VisualBehavior>,
}

/// What one [`RegistrationService::install`] call added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub classes: Vec<String>,
    pub tags: Vec<String>,
}

impl InstallReport {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.tags.is_empty()
    }
}

/// Installs bridged component classes into an engine catalog and defines the
/// matching custom tags on a host.
pub struct RegistrationService {
    context: BridgeContext,
    registrations: IndexMap<FieldCategory, VisualRegistration>,
}

fn default_descriptor(category: FieldCategory) -> VisualDescriptor {
    let descriptor = VisualDescriptor::for_category(category);
    match category {
        FieldCategory::Select | FieldCategory::Radio | FieldCategory::SelectBoxes => {
            descriptor.with_forwarded_field("values")
        }
        FieldCategory::Checkbox => descriptor.with_change_event("checkedChange"),
        FieldCategory::Currency => {
            descriptor.with_schema_default("currency", Value::String("USD".to_string()))
        }
        FieldCategory::DateTime | FieldCategory::Day | FieldCategory::Time => {
            descriptor.with_forwarded_field("format")
        }
        FieldCategory::Tags => descriptor.with_forwarded_field("delimeter"),
        _ => descriptor,
    }
}

impl RegistrationService {
    /// Service preloaded with the built-in visual for every bridged category.
    pub fn new(context: BridgeContext) -> Self {
        let registrations = FieldCategory::ALL
            .into_iter()
            .filter_map(|category| {
                let behavior = behavior_for(category)?;
                let registration = VisualRegistration {
                    descriptor: Rc::new(default_descriptor(category)),
                    behavior,
                };
                Some((category, registration))
            })
            .collect();
        Self {
            context,
            registrations,
        }
    }

    pub fn empty(context: BridgeContext) -> Self {
        Self {
            context,
            registrations: IndexMap::new(),
        }
    }

    pub fn context(&self) -> &BridgeContext {
        &self.context
    }

    /// Add or replace the registration for the descriptor's category.
    pub fn with_registration(
        mut self,
        descriptor: VisualDescriptor,
        behavior: Rc<dyn VisualBehavior>,
    ) -> Self {
        self.registrations.insert(
            descriptor.category,
            VisualRegistration {
                descriptor: Rc::new(descriptor),
                behavior,
            },
        );
        self
    }

    pub fn registrations(&self) -> impl Iterator<Item = &VisualRegistration> {
        self.registrations.values()
    }

    pub fn registration(&self, category: FieldCategory) -> Option<&VisualRegistration> {
        self.registrations.get(&category)
    }

    /// Replace the catalog's classes with bridged ones and define every tag.
    /// Safe to call repeatedly: tags already defined and classes already
    /// bridged are left alone.
    pub fn install(
        &self,
        catalog: &mut ComponentCatalog,
        host: &UiHost,
    ) -> Result<InstallReport, RegistrationError> {
        let mut report = InstallReport::default();
        for registration in self.registrations.values() {
            let descriptor = &registration.descriptor;
            if !host.is_defined(&descriptor.tag) {
                host.define(&descriptor.tag, self.constructor(registration))?;
                report.tags.push(descriptor.tag.clone());
            }
            let type_name = descriptor.category.type_name();
            let bridged = catalog
                .get(type_name)
                .is_some_and(|class| class.is_bridged());
            if !bridged {
                let class = BridgeComponent::new(Rc::clone(descriptor), self.context.bus.clone());
                catalog.install(type_name, Rc::new(class));
                report.classes.push(type_name.to_string());
            }
        }
        for tag in TAG_ONLY_TAGS {
            if !host.is_defined(tag) {
                let constructor: ElementConstructor =
                    Rc::new(|_: &Element, _: &UiHost| -> Rc<dyn CustomElement> { Rc::new(TagOnlyElement) });
                host.define(tag, constructor)?;
                report.tags.push(tag.to_string());
            }
        }
        if report.is_empty() {
            tracing::debug!("visual bridge already installed");
        } else {
            tracing::info!(
                classes = report.classes.len(),
                tags = report.tags.len(),
                "visual bridge installed"
            );
        }
        Ok(report)
    }

    /// Check that every registered tag is defined and every class bridged.
    pub fn verify(
        &self,
        catalog: &ComponentCatalog,
        host: &UiHost,
    ) -> Result<(), RegistrationError> {
        for registration in self.registrations.values() {
            let descriptor = &registration.descriptor;
            if !host.is_defined(&descriptor.tag) {
                return Err(RegistrationError::MissingTag(descriptor.tag.clone()));
            }
            let type_name = descriptor.category.type_name();
            if !catalog
                .get(type_name)
                .is_some_and(|class| class.is_bridged())
            {
                return Err(RegistrationError::NotBridged(type_name.to_string()));
            }
        }
        Ok(())
    }

    fn constructor(&self, registration: &VisualRegistration) -> ElementConstructor {
        let descriptor = Rc::clone(&registration.descriptor);
        let behavior = Rc::clone(&registration.behavior);
        let context = self.context.clone();
        Rc::new(move |element: &Element, host: &UiHost| -> Rc<dyn CustomElement> {
            VisualComponent::new(
                element,
                host,
                Rc::clone(&descriptor),
                Rc::clone(&behavior),
                context.clone(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HostError;

    #[test]
    fn install_bridges_inputs_and_leaves_layout_native() {
        let mut catalog = ComponentCatalog::with_natives();
        let host = UiHost::new();
        let service = RegistrationService::new(BridgeContext::new());
        let report = service.install(&mut catalog, &host).expect("install");

        assert!(report.classes.contains(&"textfield".to_string()));
        assert!(host.is_defined("fb-textfield"));
        assert!(host.is_defined("fb-stepper"));
        let textfield = catalog.get("textfield").expect("textfield");
        assert!(textfield.is_bridged());
        let panel = catalog.get("panel").expect("panel");
        assert!(!panel.is_bridged());
        service.verify(&catalog, &host).expect("verified");
    }

    #[test]
    fn second_install_adds_nothing() {
        let mut catalog = ComponentCatalog::with_natives();
        let host = UiHost::new();
        let service = RegistrationService::new(BridgeContext::new());
        service.install(&mut catalog, &host).expect("first install");
        let again = service.install(&mut catalog, &host).expect("second install");
        assert!(again.is_empty());
    }

    #[test]
    fn verify_reports_native_classes() {
        let catalog = ComponentCatalog::with_natives();
        let host = UiHost::new();
        let service = RegistrationService::new(BridgeContext::new());
        let err = service.verify(&catalog, &host).expect_err("nothing installed");
        assert_eq!(err, RegistrationError::MissingTag("fb-textfield".to_string()));
    }

    #[test]
    fn host_errors_surface_from_install() {
        let mut catalog = ComponentCatalog::with_natives();
        let host = UiHost::new();
        let service = RegistrationService::empty(BridgeContext::new()).with_registration(
            VisualDescriptor::new(FieldCategory::TextField, "notag"),
            behavior_for(FieldCategory::TextField).expect("text visual"),
        );
        let err = service.install(&mut catalog, &host).expect_err("invalid tag");
        assert_eq!(
            err,
            RegistrationError::Host(HostError::InvalidTagName("notag".to_string()))
        );
    }
}

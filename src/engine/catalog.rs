use std::rc::Rc;

use indexmap::IndexMap;
use thiserror::Error;

use super::component::{ComponentClass, NativeComponent};
use crate::domain::FieldCategory;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("component type '{0}' is already registered")]
    Duplicate(String),
}

/// Type name → component class, in registration order.
#[derive(Clone, Default)]
pub struct ComponentCatalog {
    classes: IndexMap<String, Rc<dyn ComponentClass>>,
}

impl ComponentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the engine's native class for every category.
    pub fn with_natives() -> Self {
        let mut catalog = Self::new();
        for category in FieldCategory::ALL {
            catalog.install(category.type_name(), Rc::new(NativeComponent::new(category)));
        }
        catalog
    }

    pub fn register(
        &mut self,
        type_name: &str,
        class: Rc<dyn ComponentClass>,
    ) -> Result<(), CatalogError> {
        if self.classes.contains_key(type_name) {
            return Err(CatalogError::Duplicate(type_name.to_string()));
        }
        self.classes.insert(type_name.to_string(), class);
        Ok(())
    }

    /// Insert or replace, returning the displaced class.
    pub fn install(
        &mut self,
        type_name: &str,
        class: Rc<dyn ComponentClass>,
    ) -> Option<Rc<dyn ComponentClass>> {
        self.classes.insert(type_name.to_string(), class)
    }

    /// Exact match first, then the category's canonical name.
    pub fn get(&self, type_name: &str) -> Option<Rc<dyn ComponentClass>> {
        self.classes.get(type_name).cloned().or_else(|| {
            FieldCategory::from_type_name(type_name)
                .and_then(|category| self.classes.get(category.type_name()).cloned())
        })
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.classes.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }
}

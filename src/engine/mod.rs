//! Reference form engine: component catalog, instance tree and lifecycle.
mod catalog;
mod component;
mod events;
mod form;
mod instance;
mod options;
mod path;
pub mod render;
mod validation;

pub use catalog::{CatalogError, ComponentCatalog};
pub use component::{ComponentClass, NativeComponent};
pub use events::{Emitter, EngineEvent, EventKind, ListenerGuard};
pub use form::Form;
pub use instance::{EngineInstance, InstanceId};
pub use options::EngineOptions;
pub use path::{DataPath, PathSegment};
pub use validation::{ErrorContext, FieldError};

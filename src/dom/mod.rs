//! Reference UI host: a minimal document with declarable custom tags.
mod element;
mod host;
mod markup;

pub use element::{CustomElement, Element, ElementConstructor, FieldEvent, WeakElement};
pub use host::{FRAMEWORK_VERSION, HostError, MountMode, UiHost, WeakUiHost};
pub use markup::Markup;

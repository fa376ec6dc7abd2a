#![deny(rust_2018_idioms)]
//! Lifecycle bridge pairing form-engine component instances with
//! independently mounted visual components.

pub mod app;
pub mod bridge;
pub mod dom;
pub mod domain;
pub mod engine;
pub mod io;
pub mod visuals;

pub use app::{FormSession, SessionOptions};
pub use bridge::{BridgeContext, RegistrationError, RegistrationService, VisualComponent};
pub use io::{
    DocumentFormat, OutputDestination, OutputOptions, emit, emit_text, parse_document_str,
    parse_with_fallback,
};

pub mod prelude {
    pub use super::{FormSession, SessionOptions};
    pub use crate::dom::MountMode;
    pub use crate::domain::FormDisplay;
}

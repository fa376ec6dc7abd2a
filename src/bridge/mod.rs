//! The bridge between engine component instances and visual tags.
//!
//! Engine side: [`BridgeComponent`] classes replace the engine's native
//! classes and announce every attached instance on the [`EventBus`].
//! Visual side: each upgraded tag runs a [`VisualComponent`] that binds to the
//! announced instance and mirrors its value, errors and read-only state.
mod adapter;
mod binding;
mod bus;
mod control;
mod descriptor;
mod error;
mod factory;
mod registration;
mod strategy;

pub use adapter::VisualComponent;
pub use binding::{BindingKey, BindingTable, Pairing, VisualId};
pub use bus::{BusMessage, EventBus, Subscription, Topic, TopicKind};
pub use control::Control;
pub use descriptor::{VisualDescriptor, default_tag};
pub use error::RegistrationError;
pub use factory::BridgeComponent;
pub use registration::{InstallReport, RegistrationService, VisualRegistration};
pub use strategy::SUBMIT_STATE_ATTR;

/// State shared by every bridged class and visual of one form session.
#[derive(Clone, Default)]
pub struct BridgeContext {
    pub bus: EventBus,
    pub bindings: BindingTable,
}

impl BridgeContext {
    pub fn new() -> Self {
        Self::default()
    }
}

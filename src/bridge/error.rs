use thiserror::Error;

use crate::dom::HostError;
use crate::engine::CatalogError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("custom tag <{0}> is not defined on the host")]
    MissingTag(String),
    #[error("component type '{0}' is not bridged")]
    NotBridged(String),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

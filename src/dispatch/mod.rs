//! Routing of messages to the factory registered for their destination type.
//!
//! [`Dispatcher`] owns the type-to-factory map and [`ClientCache`] is the
//! per-factory store of reusable transport clients.
pub mod cache;
pub mod registry;
#[cfg(feature = "test-utils")]
pub mod test_utils;

use crate::core::DestinationType;
use thiserror::Error;

pub use cache::ClientCache;
pub use registry::Dispatcher;

/// Configuration and programming errors raised by the dispatch layer.
///
/// Remote and transport failures are not errors here; they come back as a
/// failed [`crate::core::DestinationResponse`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("cannot build {destination_type} client: {reason}")]
    ClientConstruction {
        destination_type: DestinationType,
        reason: String,
    },

    #[error("no factory registered for destination type {0}")]
    UnregisteredDestinationType(DestinationType),

    #[error("a factory is already registered for destination type {0}")]
    DuplicateRegistration(DestinationType),

    #[error("factory for {handles} messages cannot be registered as {registered_as}")]
    FactoryTypeMismatch {
        registered_as: DestinationType,
        handles: DestinationType,
    },

    #[error("factory for {expected} messages received a {actual} message")]
    MessageTypeMismatch {
        expected: DestinationType,
        actual: DestinationType,
    },

    #[error("destination type {0} is not allowed by configuration")]
    DestinationTypeNotAllowed(DestinationType),
}

impl DispatchError {
    pub fn client_construction(destination_type: DestinationType, reason: impl Into<String>) -> Self {
        DispatchError::ClientConstruction {
            destination_type,
            reason: reason.into(),
        }
    }
}

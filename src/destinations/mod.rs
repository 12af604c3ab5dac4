//! Channel factories shipped with destctl.
//!
//! Each factory owns a [`crate::dispatch::ClientCache`] of transport clients
//! and implements [`crate::core::DestinationFactory`] for one destination type.
pub mod chat;
pub mod custom;
pub mod email;
pub mod http;
pub mod webhook;

pub use chat::ChatFactory;
pub use custom::CustomFactory;
pub use email::{EmailFactory, RelayClient};
pub use http::{HttpClient, HttpSettings};
pub use webhook::WebhookFactory;

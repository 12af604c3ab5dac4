/// destctl - a pluggable notification dispatch layer
///
/// Routes messages for webhook, chat, email and custom HTTP destinations to
/// the factory registered for their type, and returns a normalized response.
pub mod cli;
pub mod config;
pub mod core;
pub mod destinations;
pub mod dispatch;
pub mod formatting;
pub mod internal_metrics;
pub mod services;

// Re-export core types for convenience
pub use crate::core::*;
pub use dispatch::{DispatchError, Dispatcher};

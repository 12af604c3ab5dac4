//! Encapsulation for setting up the dispatcher and its factories.

use crate::{
    config::Config,
    core::DestinationType,
    destinations::{ChatFactory, CustomFactory, EmailFactory, HttpSettings, WebhookFactory},
    dispatch::{DispatchError, Dispatcher},
};
use std::sync::Arc;
use tracing::info;

/// Builds a dispatcher with every built-in factory registered.
///
/// Factories share the HTTP settings and the client cache policy from the
/// configuration; each keeps its own cache.
pub fn build_dispatcher(config: &Config) -> Result<Arc<Dispatcher>, DispatchError> {
    let dispatcher = Dispatcher::new(&config.dispatch);
    let settings = HttpSettings::from(&config.http);

    dispatcher.register(
        DestinationType::Webhook,
        Arc::new(WebhookFactory::new(settings.clone(), &config.cache)),
    )?;
    dispatcher.register(
        DestinationType::Chat,
        Arc::new(ChatFactory::new(settings.clone(), &config.cache)),
    )?;
    dispatcher.register(
        DestinationType::Email,
        Arc::new(EmailFactory::new(
            settings.clone(),
            &config.cache,
            config.email.credentials.clone(),
        )),
    )?;
    dispatcher.register(
        DestinationType::Custom,
        Arc::new(CustomFactory::new(settings, &config.cache)),
    )?;

    info!(
        available = ?dispatcher.available_types(),
        "Dispatcher ready."
    );
    Ok(Arc::new(dispatcher))
}

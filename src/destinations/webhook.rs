//! Generic JSON webhook destination.

use crate::config::ClientCacheConfig;
use crate::core::{DestinationFactory, DestinationResponse, DestinationType, WebhookMessage};
use crate::destinations::http::{
    client_key, deliver, header_map, parse_endpoint, with_timeout, HttpClient, HttpSettings,
};
use crate::dispatch::{ClientCache, DispatchError};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use std::sync::Arc;
use tracing::instrument;

/// POSTs the message body as JSON to the message URL.
pub struct WebhookFactory {
    settings: HttpSettings,
    clients: ClientCache<HttpClient>,
}

impl WebhookFactory {
    pub fn new(settings: HttpSettings, cache: &ClientCacheConfig) -> Self {
        Self {
            settings,
            clients: ClientCache::new(DestinationType::Webhook, cache),
        }
    }

    pub fn client_cache(&self) -> &ClientCache<HttpClient> {
        &self.clients
    }
}

#[async_trait]
impl DestinationFactory for WebhookFactory {
    type Message = WebhookMessage;
    type Client = HttpClient;

    async fn get_client(&self, message: &WebhookMessage) -> Result<Arc<HttpClient>, DispatchError> {
        let url = parse_endpoint(DestinationType::Webhook, &message.url)?;
        self.clients
            .get_or_build(&client_key(&url), || {
                HttpClient::build(DestinationType::Webhook, &self.settings)
            })
            .await
    }

    #[instrument(skip_all, fields(url = %message.url))]
    async fn publish(&self, message: &WebhookMessage) -> Result<DestinationResponse, DispatchError> {
        let url = parse_endpoint(DestinationType::Webhook, &message.url)?;
        let headers = header_map(DestinationType::Webhook, &message.headers)?;

        deliver(
            &self.clients,
            &client_key(&url),
            || HttpClient::build(DestinationType::Webhook, &self.settings),
            |client| {
                let request = client
                    .request(Method::POST, url.clone())
                    .header(CONTENT_TYPE, "application/json")
                    .headers(headers.clone())
                    .body(message.body.clone());
                with_timeout(request, message.timeout_ms.map(std::time::Duration::from_millis)).send()
            },
        )
        .await
    }
}

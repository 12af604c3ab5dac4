//! Email destination delivered through an HTTP mail relay.
//!
//! Clients are keyed by relay origin and credential reference, so two
//! messages using different credentials against the same relay never share
//! a client.

use crate::config::{ClientCacheConfig, EmailCredential};
use crate::core::{DestinationFactory, DestinationResponse, DestinationType, EmailMessage};
use crate::destinations::http::{
    client_key, deliver, parse_endpoint, with_timeout, HttpClient, HttpSettings,
};
use crate::dispatch::{ClientCache, DispatchError};
use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;

/// An HTTP client plus the credential it authenticates with.
#[derive(Debug)]
pub struct RelayClient {
    pub http: HttpClient,
    pub credential: Option<EmailCredential>,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    body: &'a str,
}

pub struct EmailFactory {
    settings: HttpSettings,
    credentials: HashMap<String, EmailCredential>,
    clients: ClientCache<RelayClient>,
}

/// Everything needed to reach the relay for one message.
struct RelayAddress {
    endpoint: Url,
    key: String,
    credential: Option<EmailCredential>,
}

impl EmailFactory {
    pub fn new(
        settings: HttpSettings,
        cache: &ClientCacheConfig,
        credentials: HashMap<String, EmailCredential>,
    ) -> Self {
        Self {
            settings,
            credentials,
            clients: ClientCache::new(DestinationType::Email, cache),
        }
    }

    pub fn client_cache(&self) -> &ClientCache<RelayClient> {
        &self.clients
    }

    fn resolve(&self, message: &EmailMessage) -> Result<RelayAddress, DispatchError> {
        let endpoint = parse_endpoint(DestinationType::Email, &message.relay_url)?;

        if !is_address(&message.from) {
            return Err(DispatchError::client_construction(
                DestinationType::Email,
                format!("invalid sender address '{}'", message.from),
            ));
        }
        if message.recipients.is_empty() {
            return Err(DispatchError::client_construction(
                DestinationType::Email,
                "message has no recipients",
            ));
        }
        if let Some(bad) = message.recipients.iter().find(|r| !is_address(r)) {
            return Err(DispatchError::client_construction(
                DestinationType::Email,
                format!("invalid recipient address '{}'", bad),
            ));
        }

        let credential = match &message.credential_ref {
            Some(name) => Some(self.credentials.get(name).cloned().ok_or_else(|| {
                DispatchError::client_construction(
                    DestinationType::Email,
                    format!("unknown credential reference '{}'", name),
                )
            })?),
            None => None,
        };

        let key = format!(
            "{}|{}",
            client_key(&endpoint),
            message.credential_ref.as_deref().unwrap_or("")
        );
        Ok(RelayAddress {
            endpoint,
            key,
            credential,
        })
    }

    fn build_client(&self, address: &RelayAddress) -> Result<RelayClient, DispatchError> {
        Ok(RelayClient {
            http: HttpClient::build(DestinationType::Email, &self.settings)?,
            credential: address.credential.clone(),
        })
    }
}

fn is_address(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

#[async_trait]
impl DestinationFactory for EmailFactory {
    type Message = EmailMessage;
    type Client = RelayClient;

    async fn get_client(&self, message: &EmailMessage) -> Result<Arc<RelayClient>, DispatchError> {
        let address = self.resolve(message)?;
        self.clients
            .get_or_build(&address.key, || self.build_client(&address))
            .await
    }

    #[instrument(skip_all, fields(recipients = message.recipients.len()))]
    async fn publish(&self, message: &EmailMessage) -> Result<DestinationResponse, DispatchError> {
        let address = self.resolve(message)?;
        let payload = RelayPayload {
            from: &message.from,
            to: &message.recipients,
            subject: &message.subject,
            body: &message.body,
        };

        deliver(
            &self.clients,
            &address.key,
            || self.build_client(&address),
            |client| {
                let mut request = client
                    .http
                    .request(Method::POST, address.endpoint.clone())
                    .json(&payload);
                if let Some(credential) = &client.credential {
                    request = request.basic_auth(&credential.username, Some(&credential.password));
                }
                with_timeout(request, message.timeout_ms.map(Duration::from_millis)).send()
            },
        )
        .await
    }
}

//! Custom HTTP endpoint destination.
//!
//! The caller picks the method, headers and query parameters; the body is sent
//! as-is.

use crate::config::ClientCacheConfig;
use crate::core::{CustomMessage, DestinationFactory, DestinationResponse, DestinationType, HttpMethod};
use crate::destinations::http::{
    client_key, deliver, header_map, parse_endpoint, with_timeout, HttpClient, HttpSettings,
};
use crate::dispatch::{ClientCache, DispatchError};
use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;

pub struct CustomFactory {
    settings: HttpSettings,
    clients: ClientCache<HttpClient>,
}

impl CustomFactory {
    pub fn new(settings: HttpSettings, cache: &ClientCacheConfig) -> Self {
        Self {
            settings,
            clients: ClientCache::new(DestinationType::Custom, cache),
        }
    }

    pub fn client_cache(&self) -> &ClientCache<HttpClient> {
        &self.clients
    }
}

/// Resolves the endpoint of a custom message, query parameters included.
pub fn endpoint(message: &CustomMessage) -> Result<Url, DispatchError> {
    let mut url = match (&message.url, &message.host) {
        (Some(url), _) => parse_endpoint(DestinationType::Custom, url)?,
        (None, Some(host)) => {
            let scheme = message.scheme.as_deref().unwrap_or("https");
            // IPv6 literals need brackets once a port or path follows.
            let host = if host.contains(':') && !host.starts_with('[') {
                format!("[{}]", host)
            } else {
                host.clone()
            };
            let port = message.port.map(|p| format!(":{}", p)).unwrap_or_default();
            let path = message.path.as_deref().unwrap_or("");
            let separator = if path.is_empty() || path.starts_with('/') { "" } else { "/" };
            parse_endpoint(
                DestinationType::Custom,
                &format!("{}://{}{}{}{}", scheme, host, port, separator, path),
            )?
        }
        (None, None) => {
            return Err(DispatchError::client_construction(
                DestinationType::Custom,
                "message has neither a url nor a host",
            ))
        }
    };

    if !message.query_params.is_empty() {
        url.query_pairs_mut().extend_pairs(&message.query_params);
    }
    Ok(url)
}

fn reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
    }
}

#[async_trait]
impl DestinationFactory for CustomFactory {
    type Message = CustomMessage;
    type Client = HttpClient;

    async fn get_client(&self, message: &CustomMessage) -> Result<Arc<HttpClient>, DispatchError> {
        let url = endpoint(message)?;
        self.clients
            .get_or_build(&client_key(&url), || {
                HttpClient::build(DestinationType::Custom, &self.settings)
            })
            .await
    }

    #[instrument(skip_all, fields(method = ?message.method))]
    async fn publish(&self, message: &CustomMessage) -> Result<DestinationResponse, DispatchError> {
        let url = endpoint(message)?;
        let headers = header_map(DestinationType::Custom, &message.headers)?;
        let method = reqwest_method(message.method);

        deliver(
            &self.clients,
            &client_key(&url),
            || HttpClient::build(DestinationType::Custom, &self.settings),
            |client| {
                let request = client
                    .request(method.clone(), url.clone())
                    .headers(headers.clone())
                    .body(message.body.clone());
                with_timeout(request, message.timeout_ms.map(Duration::from_millis)).send()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_parts() {
        let message = CustomMessage {
            scheme: Some("http".to_string()),
            host: Some("alerts.internal".to_string()),
            port: Some(8080),
            path: Some("hooks/ops".to_string()),
            query_params: [("team".to_string(), "sre".to_string())].into_iter().collect(),
            ..CustomMessage::default()
        };

        let url = endpoint(&message).unwrap();

        assert_eq!(url.as_str(), "http://alerts.internal:8080/hooks/ops?team=sre");
    }

    #[test]
    fn test_endpoint_brackets_ipv6_hosts() {
        let message = CustomMessage {
            scheme: Some("http".to_string()),
            host: Some("::1".to_string()),
            port: Some(8080),
            path: Some("/hook".to_string()),
            ..CustomMessage::default()
        };
        let bracketed = CustomMessage {
            host: Some("[fe80::1]".to_string()),
            port: None,
            ..message.clone()
        };

        assert_eq!(endpoint(&message).unwrap().as_str(), "http://[::1]:8080/hook");
        assert_eq!(endpoint(&bracketed).unwrap().as_str(), "http://[fe80::1]/hook");
    }

    #[test]
    fn test_endpoint_defaults_to_https() {
        let message = CustomMessage {
            host: Some("alerts.example.com".to_string()),
            path: Some("/notify".to_string()),
            ..CustomMessage::default()
        };

        assert_eq!(endpoint(&message).unwrap().as_str(), "https://alerts.example.com/notify");
    }

    #[test]
    fn test_query_params_are_appended_to_full_url() {
        let message = CustomMessage {
            url: Some("https://alerts.example.com/notify?source=monitor".to_string()),
            query_params: [("severity".to_string(), "high".to_string())].into_iter().collect(),
            ..CustomMessage::default()
        };

        assert_eq!(
            endpoint(&message).unwrap().as_str(),
            "https://alerts.example.com/notify?source=monitor&severity=high"
        );
    }

    #[test]
    fn test_missing_address_is_a_construction_error() {
        let err = endpoint(&CustomMessage::default()).unwrap_err();
        assert!(matches!(err, DispatchError::ClientConstruction { .. }));
    }
}

//! Chat incoming-webhook destination (Slack, Chime).

use crate::config::ClientCacheConfig;
use crate::core::{ChatMessage, DestinationFactory, DestinationResponse, DestinationType};
use crate::destinations::http::{
    client_key, deliver, parse_endpoint, with_timeout, HttpClient, HttpSettings,
};
use crate::dispatch::{ClientCache, DispatchError};
use crate::formatting::formatter_for;
use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Posts chat messages to Slack or Chime incoming webhooks.
pub struct ChatFactory {
    settings: HttpSettings,
    clients: ClientCache<HttpClient>,
}

impl ChatFactory {
    /// Creates a new `ChatFactory`.
    pub fn new(settings: HttpSettings, cache: &ClientCacheConfig) -> Self {
        Self {
            settings,
            clients: ClientCache::new(DestinationType::Chat, cache),
        }
    }

    pub fn client_cache(&self) -> &ClientCache<HttpClient> {
        &self.clients
    }
}

#[async_trait]
impl DestinationFactory for ChatFactory {
    type Message = ChatMessage;
    type Client = HttpClient;

    async fn get_client(&self, message: &ChatMessage) -> Result<Arc<HttpClient>, DispatchError> {
        let url = parse_endpoint(DestinationType::Chat, &message.url)?;
        self.clients
            .get_or_build(&client_key(&url), || {
                HttpClient::build(DestinationType::Chat, &self.settings)
            })
            .await
    }

    /// Formats the text for the message's platform and posts it to the webhook.
    #[instrument(skip_all, fields(platform = ?message.platform))]
    async fn publish(&self, message: &ChatMessage) -> Result<DestinationResponse, DispatchError> {
        let url = parse_endpoint(DestinationType::Chat, &message.url)?;
        let payload = formatter_for(message.platform).format(&message.text);

        let response = deliver(
            &self.clients,
            &client_key(&url),
            || HttpClient::build(DestinationType::Chat, &self.settings),
            |client| {
                let request = client.request(Method::POST, url.clone()).json(&payload);
                with_timeout(request, message.timeout_ms.map(Duration::from_millis)).send()
            },
        )
        .await?;

        if response.is_success() {
            info!("Successfully posted message to chat webhook.");
        }
        Ok(response)
    }
}

#[cfg(test)]
mod chat_factory_tests {
    use super::*;
    use crate::core::{ChatPlatform, DeliveryStatus};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn factory() -> ChatFactory {
        ChatFactory::new(HttpSettings::default(), &ClientCacheConfig::default())
    }

    #[tokio::test]
    async fn test_slack_message_is_posted_as_text() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook"))
            .and(body_json(json!({ "text": "db-1 is down" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let message = ChatMessage::new(
            ChatPlatform::Slack,
            format!("{}/webhook", server.uri()),
            "db-1 is down",
        );

        // Act
        let response = factory().publish(&message).await.unwrap();

        // Assert
        assert!(response.is_success());
        assert_eq!(response.status_code, Some(200));
        assert_eq!(response.message, "ok");
    }

    #[tokio::test]
    async fn test_chime_message_is_posted_as_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({ "Content": "db-1 is down" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let message = ChatMessage::new(ChatPlatform::Chime, server.uri(), "db-1 is down");

        let response = factory().publish(&message).await.unwrap();

        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "30")
                    .set_body_string("rate_limited"),
            )
            .mount(&server)
            .await;

        let message = ChatMessage::new(ChatPlatform::Slack, server.uri(), "hello");

        let response = factory().publish(&message).await.unwrap();

        assert_eq!(response.status, DeliveryStatus::Rejected);
        assert_eq!(response.status_code, Some(429));
        assert_eq!(response.retry_after, Some(Duration::from_secs(30)));
        assert_eq!(response.message, "rate_limited");
    }

    #[tokio::test]
    async fn test_request_timeout_is_reported_as_timed_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let mut message = ChatMessage::new(ChatPlatform::Slack, server.uri(), "hello");
        message.timeout_ms = Some(300);

        let response = factory().publish(&message).await.unwrap();

        assert_eq!(response.status, DeliveryStatus::TimedOut);
        assert_eq!(response.status_code, None);
    }

    #[tokio::test]
    async fn test_invalid_url_is_a_construction_error() {
        let message = ChatMessage::new(ChatPlatform::Slack, "hooks.slack.com/no-scheme", "hello");

        let err = factory().publish(&message).await.unwrap_err();

        assert!(matches!(
            err,
            DispatchError::ClientConstruction {
                destination_type: DestinationType::Chat,
                ..
            }
        ));
    }
}

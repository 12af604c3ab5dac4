#![allow(dead_code)]
pub mod test_utils;

use destctl::config::{ClientCacheConfig, DispatchConfig};
use destctl::core::{DestinationResponse, EmailMessage, Message, WebhookMessage};
use destctl::dispatch::test_utils::FakeFactory;
use destctl::dispatch::Dispatcher;
use std::sync::Arc;
use std::time::Duration;

/// A dispatcher with the given default timeout and no allow-list.
pub fn dispatcher_with_timeout(timeout: Duration) -> Dispatcher {
    Dispatcher::new(&DispatchConfig {
        default_timeout_ms: timeout.as_millis() as u64,
        allowed_types: None,
    })
}

/// A fake webhook factory that always answers with `code`.
pub fn fake_webhook(code: u16) -> Arc<FakeFactory<WebhookMessage>> {
    Arc::new(FakeFactory::responding(DestinationResponse::delivered(code, "ok")))
}

/// A fake email factory that always answers with `code`.
pub fn fake_email(code: u16) -> Arc<FakeFactory<EmailMessage>> {
    Arc::new(FakeFactory::responding(DestinationResponse::delivered(code, "queued")))
}

pub fn webhook_message(url: &str) -> Message {
    WebhookMessage::new(url, r#"{"alert":"cpu"}"#).into()
}

pub fn email_message(relay_url: &str) -> Message {
    Message::Email(EmailMessage {
        relay_url: relay_url.to_string(),
        credential_ref: None,
        from: "alerts@example.com".to_string(),
        recipients: vec!["oncall@example.com".to_string()],
        subject: "cpu high".to_string(),
        body: "cpu above 95% for 5 minutes".to_string(),
        timeout_ms: None,
    })
}

/// Cache policy used by HTTP tests: enabled, no expiry.
pub fn cache_config() -> ClientCacheConfig {
    ClientCacheConfig {
        ttl_seconds: None,
        ..ClientCacheConfig::default()
    }
}

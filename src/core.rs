//! Core domain types and service traits for destination dispatch
//!
//! This module defines the message and response models shared by every
//! channel, and the trait contract that governs how a channel factory builds
//! transport clients and publishes messages.

use crate::dispatch::DispatchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identifies the kind of channel a message is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationType {
    /// A generic JSON webhook.
    Webhook,
    /// A chat service incoming webhook (Slack, Chime).
    Chat,
    /// An email relay.
    Email,
    /// A custom HTTP endpoint with caller-controlled method, headers and query.
    Custom,
}

impl DestinationType {
    /// Every destination type, in declaration order.
    pub const ALL: [DestinationType; 4] = [
        DestinationType::Webhook,
        DestinationType::Chat,
        DestinationType::Email,
        DestinationType::Custom,
    ];

    /// The stable, lowercase name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationType::Webhook => "webhook",
            DestinationType::Chat => "chat",
            DestinationType::Email => "email",
            DestinationType::Custom => "custom",
        }
    }
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Messages
// =============================================================================

/// A notification addressed to exactly one destination type.
///
/// Messages are immutable once built. Dispatch borrows them; no factory keeps
/// a message beyond the publish call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Webhook(WebhookMessage),
    Chat(ChatMessage),
    Email(EmailMessage),
    Custom(CustomMessage),
}

impl Message {
    /// The destination type this message must be routed to.
    pub fn destination_type(&self) -> DestinationType {
        match self {
            Message::Webhook(_) => DestinationType::Webhook,
            Message::Chat(_) => DestinationType::Chat,
            Message::Email(_) => DestinationType::Email,
            Message::Custom(_) => DestinationType::Custom,
        }
    }

    /// The caller-imposed publish timeout, if the message carries one.
    pub fn timeout(&self) -> Option<Duration> {
        let timeout_ms = match self {
            Message::Webhook(m) => m.timeout_ms,
            Message::Chat(m) => m.timeout_ms,
            Message::Email(m) => m.timeout_ms,
            Message::Custom(m) => m.timeout_ms,
        };
        timeout_ms.map(Duration::from_millis)
    }
}

/// A JSON payload POSTed to a webhook URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookMessage {
    pub url: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl WebhookMessage {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            headers: BTreeMap::new(),
            timeout_ms: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }
}

/// The chat service behind an incoming webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatPlatform {
    Slack,
    Chime,
}

/// A plain-text message posted to a chat incoming webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub platform: ChatPlatform,
    pub url: String,
    pub text: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ChatMessage {
    pub fn new(platform: ChatPlatform, url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            platform,
            url: url.into(),
            text: text.into(),
            timeout_ms: None,
        }
    }
}

/// HTTP verbs accepted by custom destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Post,
    Put,
    Patch,
}

/// A request to an arbitrary HTTP endpoint.
///
/// The endpoint is either a full `url`, or assembled from `scheme`, `host`,
/// `port` and `path`. `query_params` are appended in either case.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CustomMessage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub query_params: BTreeMap<String, String>,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// An email handed to an HTTP mail relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub relay_url: String,
    /// Name of a credential configured on the email factory.
    #[serde(default)]
    pub credential_ref: Option<String>,
    pub from: String,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Binds a message struct to the destination type that carries it.
pub trait ChannelMessage: Send + Sync + 'static {
    /// The destination type whose [`Message`] variant wraps this struct.
    const DESTINATION_TYPE: DestinationType;

    /// Extracts this struct from a [`Message`], or `None` for any other variant.
    fn from_message(message: &Message) -> Option<&Self>;

    /// A short description of where the message goes, for logs.
    fn target(&self) -> Cow<'_, str>;
}

macro_rules! channel_message {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Message {
            fn from(message: $ty) -> Self {
                Message::$variant(message)
            }
        }

        impl ChannelMessage for $ty {
            const DESTINATION_TYPE: DestinationType = DestinationType::$variant;

            fn from_message(message: &Message) -> Option<&Self> {
                match message {
                    Message::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn target(&self) -> Cow<'_, str> {
                self.describe_target()
            }
        }
    };
}

channel_message!(WebhookMessage, Webhook);
channel_message!(ChatMessage, Chat);
channel_message!(EmailMessage, Email);
channel_message!(CustomMessage, Custom);

impl WebhookMessage {
    fn describe_target(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.url)
    }
}

impl ChatMessage {
    fn describe_target(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.url)
    }
}

impl EmailMessage {
    fn describe_target(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.relay_url)
    }
}

impl CustomMessage {
    fn describe_target(&self) -> Cow<'_, str> {
        match (&self.url, &self.host) {
            (Some(url), _) => Cow::Borrowed(url),
            (None, Some(host)) => Cow::Owned(format!(
                "{}://{}{}",
                self.scheme.as_deref().unwrap_or("https"),
                host,
                self.path.as_deref().unwrap_or("")
            )),
            (None, None) => Cow::Borrowed(""),
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Outcome class of a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// The remote end accepted the message.
    Delivered,
    /// The remote end answered with a non-success status.
    Rejected,
    /// The publish did not finish within its timeout.
    TimedOut,
    /// No answer could be obtained (connection refused, reset, DNS failure).
    Unreachable,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Rejected => "rejected",
            DeliveryStatus::TimedOut => "timed_out",
            DeliveryStatus::Unreachable => "unreachable",
        }
    }
}

/// Normalized result of one publish call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationResponse {
    pub status: DeliveryStatus,
    /// Status code reported by the transport, when it produced one.
    pub status_code: Option<u16>,
    /// Response body or a description of the failure.
    pub message: String,
    /// How long the remote asked us to wait before trying again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<Duration>,
}

impl DestinationResponse {
    pub fn delivered(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::Delivered,
            status_code: Some(status_code),
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn rejected(
        status_code: u16,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        Self {
            status: DeliveryStatus::Rejected,
            status_code: Some(status_code),
            message: message.into(),
            retry_after,
        }
    }

    pub fn timed_out(message: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::TimedOut,
            status_code: None,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::Unreachable,
            status_code: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// True only when the remote end accepted the message.
    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Builds transport clients for one destination type and publishes through them.
///
/// Implementations report configuration mistakes (bad addressing, unknown
/// credentials) as a [`DispatchError`] and every remote or transport outcome
/// as a [`DestinationResponse`].
#[async_trait]
pub trait DestinationFactory: Send + Sync + 'static {
    /// The message struct this factory accepts.
    type Message: ChannelMessage;
    /// The transport handle this factory builds and caches.
    type Client: Send + Sync + 'static;

    /// Returns a ready-to-use client for the message's target
    ///
    /// # Returns
    /// * `Ok(client)`, reused from the factory's cache when the addressing key was seen before
    /// * `Err(DispatchError::ClientConstruction)` when the message cannot be addressed
    async fn get_client(&self, message: &Self::Message) -> Result<Arc<Self::Client>, DispatchError>;

    /// Sends the message and normalizes the outcome
    ///
    /// # Returns
    /// * `Ok(DestinationResponse)` for every outcome the transport produced, success or not
    /// * `Err` only for configuration errors detected before any I/O
    async fn publish(&self, message: &Self::Message) -> Result<DestinationResponse, DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_parses_from_tagged_json() {
        let raw = r#"{
            "type": "custom",
            "host": "hooks.example.com",
            "port": 8443,
            "path": "/notify",
            "method": "PUT",
            "query_params": { "token": "abc" },
            "timeout_ms": 2500
        }"#;

        let message: Message = serde_json::from_str(raw).unwrap();

        assert_eq!(message.destination_type(), DestinationType::Custom);
        assert_eq!(message.timeout(), Some(Duration::from_millis(2500)));
        let Message::Custom(custom) = &message else {
            panic!("expected a custom message");
        };
        assert_eq!(custom.method, HttpMethod::Put);
        assert_eq!(custom.query_params.get("token").map(String::as_str), Some("abc"));
        assert_eq!(custom.target(), "https://hooks.example.com/notify");
    }

    #[test]
    fn test_from_message_only_matches_own_variant() {
        let message: Message = WebhookMessage::new("https://x", "{}").into();

        assert!(WebhookMessage::from_message(&message).is_some());
        assert!(ChatMessage::from_message(&message).is_none());
        assert!(EmailMessage::from_message(&message).is_none());
        assert!(CustomMessage::from_message(&message).is_none());
    }

    #[test]
    fn test_only_delivered_is_success() {
        assert!(DestinationResponse::delivered(200, "ok").is_success());
        assert!(!DestinationResponse::rejected(500, "boom", None).is_success());
        assert!(!DestinationResponse::timed_out("slow").is_success());
        assert!(!DestinationResponse::unreachable("refused").is_success());
    }

    #[test]
    fn test_destination_type_serializes_snake_case() {
        let json = serde_json::to_string(&DestinationType::ALL).unwrap();
        assert_eq!(json, r#"["webhook","chat","email","custom"]"#);
    }
}

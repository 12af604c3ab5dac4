// src/formatting.rs

use crate::core::ChatPlatform;
use serde_json::{json, Value};

/// A trait for turning message text into a chat webhook payload.
pub trait ChatFormatter: Send + Sync {
    fn format(&self, text: &str) -> Value;
}

/// Slack incoming webhooks take the text under `text`.
pub struct SlackFormatter;

impl ChatFormatter for SlackFormatter {
    fn format(&self, text: &str) -> Value {
        json!({ "text": text })
    }
}

/// Chime webhooks take the text under `Content`.
pub struct ChimeFormatter;

impl ChatFormatter for ChimeFormatter {
    fn format(&self, text: &str) -> Value {
        json!({ "Content": text })
    }
}

/// Returns the formatter for a chat platform.
pub fn formatter_for(platform: ChatPlatform) -> &'static dyn ChatFormatter {
    match platform {
        ChatPlatform::Slack => &SlackFormatter,
        ChatPlatform::Chime => &ChimeFormatter,
    }
}

// File: modguard-common/src/models/chat.rs

use serde::{Deserialize, Serialize};

/// One incoming chat message, as handed over by the chat transport.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageEvent {
    /// Raw login, case-insensitive.
    pub username: String,
    pub text: String,
    /// Unix milliseconds. Transports that omit it get the receive time filled in.
    #[serde(default)]
    pub timestamp_ms: i64,
    /// Moderator / channel owner. Bypasses every filter.
    #[serde(default)]
    pub is_privileged: bool,
    #[serde(default)]
    pub channel: String,
}

impl ChatMessageEvent {
    pub fn new(username: &str, text: &str, timestamp_ms: i64) -> Self {
        Self {
            username: username.to_string(),
            text: text.to_string(),
            timestamp_ms,
            is_privileged: false,
            channel: String::new(),
        }
    }

    pub fn in_channel(mut self, channel: &str) -> Self {
        self.channel = channel.to_string();
        self
    }

    pub fn privileged(mut self) -> Self {
        self.is_privileged = true;
        self
    }

    /// Lower-cased login without a leading `@`.
    pub fn normalized_username(&self) -> String {
        normalize_username(&self.username)
    }
}

/// Trim, drop one leading `@`, lower-case.
pub fn normalize_username(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('@')
        .unwrap_or(trimmed)
        .to_lowercase()
}

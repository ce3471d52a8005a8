//! Filter configuration.
//!
//! Loading is forgiving: a bad numeric value falls back to its default with a
//! warning instead of failing the whole file. A policy section that is absent
//! or `null` switches that policy off.

use std::collections::HashSet;
use std::path::Path;
use serde_json::{Map, Value};
use tracing::warn;
use modguard_common::models::normalize_username;
use crate::Error;
use crate::moderation::allowlist::Allowlist;

pub const DEFAULT_SPAM_WINDOW_MS: u64 = 7_000;
pub const DEFAULT_SPAM_MIN_MESSAGES: u64 = 5;
pub const DEFAULT_MAX_CHARS: u64 = 400;
pub const DEFAULT_STRIKE_RESET_MS: u64 = 600_000;
pub const DEFAULT_TIMEOUT_FIRST_SEC: u64 = 30;
pub const DEFAULT_TIMEOUT_REPEAT_SEC: u64 = 60;
pub const DEFAULT_LINK_TIMEOUT_FIRST_SEC: u64 = 1;
pub const DEFAULT_LINK_TIMEOUT_REPEAT_SEC: u64 = 5;

/// Placeholder replaced by `@<username>` in reply templates.
pub const AT_USER_PLACEHOLDER: &str = "{atUser}";

const KNOWN_KEYS: &[&str] = &["spam", "length", "link", "allowlist", "exemptions", "bots"];

/// First-offense vs repeat-offense timeouts plus strike decay.
pub trait EscalationPolicy {
    fn strike_reset_ms(&self) -> u64;
    fn timeout_first_sec(&self) -> u64;
    fn timeout_repeat_sec(&self) -> u64;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpamConfig {
    pub enabled: bool,
    pub window_ms: u64,
    pub min_messages: u64,
    pub strike_reset_ms: u64,
    pub timeout_first_sec: u64,
    pub timeout_repeat_sec: u64,
    pub reason: String,
    pub message_first: String,
    pub message_repeat: String,
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: DEFAULT_SPAM_WINDOW_MS,
            min_messages: DEFAULT_SPAM_MIN_MESSAGES,
            strike_reset_ms: DEFAULT_STRIKE_RESET_MS,
            timeout_first_sec: DEFAULT_TIMEOUT_FIRST_SEC,
            timeout_repeat_sec: DEFAULT_TIMEOUT_REPEAT_SEC,
            reason: "Spamming messages".to_string(),
            message_first: "{atUser} slow down, you're sending messages too fast.".to_string(),
            message_repeat: "{atUser} still spamming, that's a longer timeout.".to_string(),
        }
    }
}

impl SpamConfig {
    fn from_section(section: &Map<String, Value>) -> Self {
        let d = Self::default();
        Self {
            enabled: read_bool(section, "spam", "enabled", d.enabled),
            window_ms: read_u64(section, "spam", "windowMs", d.window_ms),
            min_messages: read_u64(section, "spam", "minMessages", d.min_messages),
            strike_reset_ms: read_u64(section, "spam", "strikeResetMs", d.strike_reset_ms),
            timeout_first_sec: read_u64(section, "spam", "timeoutFirstSec", d.timeout_first_sec),
            timeout_repeat_sec: read_u64(section, "spam", "timeoutRepeatSec", d.timeout_repeat_sec),
            reason: read_string(section, "spam", "reason", d.reason),
            message_first: read_string(section, "spam", "messageFirst", d.message_first),
            message_repeat: read_string(section, "spam", "messageRepeat", d.message_repeat),
        }
    }
}

impl EscalationPolicy for SpamConfig {
    fn strike_reset_ms(&self) -> u64 { self.strike_reset_ms }
    fn timeout_first_sec(&self) -> u64 { self.timeout_first_sec }
    fn timeout_repeat_sec(&self) -> u64 { self.timeout_repeat_sec }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthConfig {
    pub enabled: bool,
    pub max_chars: u64,
    pub strike_reset_ms: u64,
    pub timeout_first_sec: u64,
    pub timeout_repeat_sec: u64,
    pub reason: String,
    pub message: String,
}

impl Default for LengthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chars: DEFAULT_MAX_CHARS,
            strike_reset_ms: DEFAULT_STRIKE_RESET_MS,
            timeout_first_sec: DEFAULT_TIMEOUT_FIRST_SEC,
            timeout_repeat_sec: DEFAULT_TIMEOUT_REPEAT_SEC,
            reason: "Message too long".to_string(),
            message: "{atUser} please keep your messages shorter.".to_string(),
        }
    }
}

impl LengthConfig {
    fn from_section(section: &Map<String, Value>) -> Self {
        let d = Self::default();
        Self {
            enabled: read_bool(section, "length", "enabled", d.enabled),
            max_chars: read_u64(section, "length", "maxChars", d.max_chars),
            strike_reset_ms: read_u64(section, "length", "strikeResetMs", d.strike_reset_ms),
            timeout_first_sec: read_u64(section, "length", "timeoutFirstSec", d.timeout_first_sec),
            timeout_repeat_sec: read_u64(section, "length", "timeoutRepeatSec", d.timeout_repeat_sec),
            reason: read_string(section, "length", "reason", d.reason),
            message: read_string(section, "length", "message", d.message),
        }
    }
}

impl EscalationPolicy for LengthConfig {
    fn strike_reset_ms(&self) -> u64 { self.strike_reset_ms }
    fn timeout_first_sec(&self) -> u64 { self.timeout_first_sec }
    fn timeout_repeat_sec(&self) -> u64 { self.timeout_repeat_sec }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub enabled: bool,
    pub strike_reset_ms: u64,
    pub timeout_first_sec: u64,
    pub timeout_repeat_sec: u64,
    pub reason: String,
    pub message: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strike_reset_ms: DEFAULT_STRIKE_RESET_MS,
            timeout_first_sec: DEFAULT_LINK_TIMEOUT_FIRST_SEC,
            timeout_repeat_sec: DEFAULT_LINK_TIMEOUT_REPEAT_SEC,
            reason: "Posting unauthorized links".to_string(),
            message: "{atUser} links aren't allowed here, ask a moderator for a !permit.".to_string(),
        }
    }
}

impl LinkConfig {
    fn from_section(section: &Map<String, Value>) -> Self {
        let d = Self::default();
        Self {
            enabled: read_bool(section, "link", "enabled", d.enabled),
            strike_reset_ms: read_u64(section, "link", "strikeResetMs", d.strike_reset_ms),
            timeout_first_sec: read_u64(section, "link", "timeoutFirstSec", d.timeout_first_sec),
            timeout_repeat_sec: read_u64(section, "link", "timeoutRepeatSec", d.timeout_repeat_sec),
            reason: read_string(section, "link", "reason", d.reason),
            message: read_string(section, "link", "message", d.message),
        }
    }
}

impl EscalationPolicy for LinkConfig {
    fn strike_reset_ms(&self) -> u64 { self.strike_reset_ms }
    fn timeout_first_sec(&self) -> u64 { self.timeout_first_sec }
    fn timeout_repeat_sec(&self) -> u64 { self.timeout_repeat_sec }
}

/// Everything the filter pipeline reads per message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSettings {
    pub spam: Option<SpamConfig>,
    pub length: Option<LengthConfig>,
    pub link: Option<LinkConfig>,
    pub allowlist: Allowlist,
    /// Normalized usernames that always bypass the filters.
    pub exemptions: HashSet<String>,
    /// Normalized usernames that are never evaluated.
    pub bots: HashSet<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            spam: Some(SpamConfig::default()),
            length: Some(LengthConfig::default()),
            link: Some(LinkConfig::default()),
            allowlist: Allowlist::default(),
            exemptions: HashSet::new(),
            bots: HashSet::new(),
        }
    }
}

enum Section<'a> {
    Absent,
    Object(&'a Map<String, Value>),
    Malformed,
}

fn section<'a>(root: &'a Map<String, Value>, key: &str) -> Section<'a> {
    match root.get(key) {
        None | Some(Value::Null) => Section::Absent,
        Some(Value::Object(map)) => Section::Object(map),
        Some(other) => {
            warn!("FilterSettings: '{}' should be an object, got {}; using defaults", key, other);
            Section::Malformed
        }
    }
}

impl FilterSettings {
    /// Builds settings from a parsed JSON document.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        let root = value
            .as_object()
            .ok_or_else(|| Error::Config("filter settings must be a JSON object".to_string()))?;

        for key in root.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                warn!("FilterSettings: ignoring unknown key '{}'", key);
            }
        }

        let empty = Map::new();
        let spam = match section(root, "spam") {
            Section::Absent => None,
            Section::Object(map) => Some(SpamConfig::from_section(map)),
            Section::Malformed => Some(SpamConfig::from_section(&empty)),
        };
        let length = match section(root, "length") {
            Section::Absent => None,
            Section::Object(map) => Some(LengthConfig::from_section(map)),
            Section::Malformed => Some(LengthConfig::from_section(&empty)),
        };
        let link = match section(root, "link") {
            Section::Absent => None,
            Section::Object(map) => Some(LinkConfig::from_section(map)),
            Section::Malformed => Some(LinkConfig::from_section(&empty)),
        };

        let allowlist = Allowlist::compile(read_string_list(root, "allowlist").as_slice());
        let exemptions = read_string_list(root, "exemptions")
            .iter()
            .map(|u| normalize_username(u))
            .filter(|u| !u.is_empty())
            .collect();
        let bots = read_string_list(root, "bots")
            .iter()
            .map(|u| normalize_username(u))
            .filter(|u| !u.is_empty())
            .collect();

        Ok(Self { spam, length, link, allowlist, exemptions, bots })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Longest strike decay across the configured policies.
    pub fn max_strike_reset_ms(&self) -> u64 {
        [
            self.spam.as_ref().map(|c| c.strike_reset_ms),
            self.length.as_ref().map(|c| c.strike_reset_ms),
            self.link.as_ref().map(|c| c.strike_reset_ms),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(0)
    }
}

/// Replaces `{atUser}` with `@display_name`.
pub fn render_template(template: &str, display_name: &str) -> String {
    template.replace(AT_USER_PLACEHOLDER, &format!("@{}", display_name))
}

fn coerce_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn read_u64(section: &Map<String, Value>, policy: &str, key: &str, default: u64) -> u64 {
    match section.get(key) {
        None | Some(Value::Null) => default,
        Some(value) => coerce_u64(value).unwrap_or_else(|| {
            warn!("FilterSettings: {}.{} = {} is not a valid number, using {}", policy, key, value, default);
            default
        }),
    }
}

fn read_bool(section: &Map<String, Value>, policy: &str, key: &str, default: bool) -> bool {
    match section.get(key) {
        None | Some(Value::Null) => default,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
        Some(value) => {
            warn!("FilterSettings: {}.{} = {} is not a boolean, using {}", policy, key, value, default);
            default
        }
    }
}

fn read_string(section: &Map<String, Value>, policy: &str, key: &str, default: String) -> String {
    match section.get(key) {
        None | Some(Value::Null) => default,
        Some(Value::String(s)) => s.clone(),
        Some(value) => {
            warn!("FilterSettings: {}.{} = {} is not a string, using default", policy, key, value);
            default
        }
    }
}

fn read_string_list(root: &Map<String, Value>, key: &str) -> Vec<String> {
    match root.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                other => {
                    warn!("FilterSettings: skipping non-string {} entry {}", key, other);
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!("FilterSettings: '{}' should be a list, got {}", key, other);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let settings = FilterSettings::default();
        let spam = settings.spam.unwrap();
        assert_eq!(spam.window_ms, 7_000);
        assert_eq!(spam.min_messages, 5);
        assert_eq!(settings.length.unwrap().max_chars, 400);
        assert!(settings.allowlist.is_empty());
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        let settings = FilterSettings::from_value(&json!({
            "spam": { "windowMs": "oops", "minMessages": "8", "timeoutFirstSec": -3 },
            "length": { "maxChars": 250.0 }
        }))
        .unwrap();

        let spam = settings.spam.unwrap();
        assert_eq!(spam.window_ms, DEFAULT_SPAM_WINDOW_MS);
        assert_eq!(spam.min_messages, 8);
        assert_eq!(spam.timeout_first_sec, DEFAULT_TIMEOUT_FIRST_SEC);
        assert_eq!(settings.length.unwrap().max_chars, 250);
    }

    #[test]
    fn test_absent_sections_disable_policies() {
        let settings = FilterSettings::from_value(&json!({
            "link": {},
            "captcha": { "enabled": true }
        }))
        .unwrap();
        assert!(settings.spam.is_none());
        assert!(settings.length.is_none());
        assert_eq!(settings.link, Some(LinkConfig::default()));
    }

    #[test]
    fn test_malformed_section_uses_defaults() {
        let settings = FilterSettings::from_value(&json!({ "spam": 12 })).unwrap();
        assert_eq!(settings.spam, Some(SpamConfig::default()));
    }

    #[test]
    fn test_lists_are_normalized() {
        let settings = FilterSettings::from_value(&json!({
            "allowlist": ["example.com", 5, "https://clips.example.tv/x"],
            "exemptions": ["@TrustedUser"],
            "bots": ["Nightbot", ""]
        }))
        .unwrap();
        assert_eq!(settings.allowlist.len(), 2);
        assert!(settings.exemptions.contains("trusteduser"));
        assert_eq!(settings.bots.len(), 1);
        assert!(settings.bots.contains("nightbot"));
    }

    #[test]
    fn test_top_level_must_be_object() {
        assert!(FilterSettings::from_value(&json!([1, 2])).is_err());
        assert!(FilterSettings::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_render_template() {
        assert_eq!(render_template("{atUser} hi {atUser}", "Alice"), "@Alice hi @Alice");
        assert_eq!(render_template("no placeholder", "Alice"), "no placeholder");
    }
}

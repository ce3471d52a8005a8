//! Moderator chat commands.
//!
//! Usage:
//!   !permit <user> [seconds]      let <user> skip every filter for a while (default 60s)
//!   !unpermit <user>              take the permit back
//!   !spamfilter.on | .off         same for lengthfilter / linkfilter
//!
//! Only privileged authors are listened to. Anything else falls through to the
//! filter pipeline untouched.

use std::sync::Arc;
use tracing::{debug, info};
use modguard_common::models::{normalize_username, ChatMessageEvent, PolicyKind};
use crate::moderation::FilterPipeline;

pub const COMMAND_PREFIX: char = '!';
pub const DEFAULT_PERMIT_SECONDS: u64 = 60;

/// A parsed moderator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModCommand {
    Permit { user: String, seconds: Option<u64> },
    Unpermit { user: String },
    Toggle { policy: PolicyKind, enabled: bool },
}

impl ModCommand {
    /// `Ok(None)` when the text is not one of ours, `Err` when it is but the
    /// arguments are off (the string is the usage line to send back).
    pub fn parse(text: &str) -> Result<Option<Self>, String> {
        let Some(rest) = text.trim().strip_prefix(COMMAND_PREFIX) else {
            return Ok(None);
        };
        let mut parts = rest.split_whitespace();
        let Some(name) = parts.next() else {
            return Ok(None);
        };
        let name = name.to_ascii_lowercase();

        match name.as_str() {
            "permit" => {
                let user = parts.next().map(normalize_username).filter(|u| !u.is_empty());
                let Some(user) = user else {
                    return Err("Usage: !permit <user> [seconds]".to_string());
                };
                let seconds = match parts.next() {
                    Some(raw) => match raw.parse::<u64>() {
                        Ok(n) if n > 0 => Some(n),
                        _ => return Err("Usage: !permit <user> [seconds]".to_string()),
                    },
                    None => None,
                };
                Ok(Some(Self::Permit { user, seconds }))
            }
            "unpermit" => {
                let user = parts.next().map(normalize_username).filter(|u| !u.is_empty());
                match user {
                    Some(user) => Ok(Some(Self::Unpermit { user })),
                    None => Err("Usage: !unpermit <user>".to_string()),
                }
            }
            other => Ok(parse_toggle(other)),
        }
    }
}

fn parse_toggle(name: &str) -> Option<ModCommand> {
    let (filter, state) = name.split_once('.')?;
    let policy = match filter {
        "spamfilter" => PolicyKind::Spam,
        "lengthfilter" => PolicyKind::Length,
        "linkfilter" => PolicyKind::Link,
        _ => return None,
    };
    let enabled = match state {
        "on" => true,
        "off" => false,
        _ => return None,
    };
    Some(ModCommand::Toggle { policy, enabled })
}

/// Applies moderator commands to a pipeline.
pub struct ModCommandHandler {
    pipeline: Arc<FilterPipeline>,
    default_permit_seconds: u64,
}

impl ModCommandHandler {
    pub fn new(pipeline: Arc<FilterPipeline>) -> Self {
        Self { pipeline, default_permit_seconds: DEFAULT_PERMIT_SECONDS }
    }

    pub fn with_default_permit_seconds(mut self, seconds: u64) -> Self {
        self.default_permit_seconds = seconds.max(1);
        self
    }

    /// Runs the command in `event`, if any, and returns the chat reply.
    pub fn handle(&self, event: &ChatMessageEvent) -> Option<String> {
        if !event.is_privileged {
            return None;
        }
        let command = match ModCommand::parse(&event.text) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => return None,
            Err(usage) => {
                debug!("ModCommandHandler: bad command from '{}': {}", event.username, event.text);
                return Some(usage);
            }
        };
        info!("ModCommandHandler: '{}' ran {:?}", event.username, command);

        let reply = match command {
            ModCommand::Permit { user, seconds } => {
                let seconds = seconds.unwrap_or(self.default_permit_seconds);
                self.pipeline
                    .exemptions()
                    .grant(&user, seconds.saturating_mul(1_000), event.timestamp_ms);
                format!("@{} is exempt from the chat filters for {} seconds.", user, seconds)
            }
            ModCommand::Unpermit { user } => {
                if self.pipeline.exemptions().revoke(&user) {
                    format!("@{}'s permit was revoked.", user)
                } else {
                    format!("@{} has no active permit.", user)
                }
            }
            ModCommand::Toggle { policy, enabled } => {
                self.pipeline.set_policy_enabled(policy, enabled);
                format!("{} filter is now {}.", policy, if enabled { "on" } else { "off" })
            }
        };
        Some(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::FilterSettings;

    fn handler() -> (Arc<FilterPipeline>, ModCommandHandler) {
        let pipeline = Arc::new(FilterPipeline::new(FilterSettings::default()));
        (pipeline.clone(), ModCommandHandler::new(pipeline))
    }

    #[test]
    fn test_parse() {
        assert_eq!(ModCommand::parse("hello"), Ok(None));
        assert_eq!(ModCommand::parse("!uptime"), Ok(None));
        assert_eq!(
            ModCommand::parse("!permit @Alice 30"),
            Ok(Some(ModCommand::Permit { user: "alice".into(), seconds: Some(30) }))
        );
        assert_eq!(
            ModCommand::parse("!PERMIT bob"),
            Ok(Some(ModCommand::Permit { user: "bob".into(), seconds: None }))
        );
        assert_eq!(
            ModCommand::parse("!linkfilter.off"),
            Ok(Some(ModCommand::Toggle { policy: PolicyKind::Link, enabled: false }))
        );
        assert!(ModCommand::parse("!permit").is_err());
        assert!(ModCommand::parse("!permit bob soon").is_err());
        assert_eq!(ModCommand::parse("!linkfilter.maybe"), Ok(None));
    }

    #[test]
    fn test_non_privileged_is_ignored() {
        let (pipeline, handler) = handler();
        let evt = ChatMessageEvent::new("viewer", "!permit viewer", 0);
        assert_eq!(handler.handle(&evt), None);
        assert!(pipeline.exemptions().is_empty());
    }

    #[test]
    fn test_permit_and_unpermit() {
        let (pipeline, handler) = handler();
        let reply = handler.handle(&ChatMessageEvent::new("mod", "!permit Alice", 1_000).privileged());
        assert_eq!(reply.as_deref(), Some("@alice is exempt from the chat filters for 60 seconds."));
        assert_eq!(pipeline.exemptions().expires_at("alice"), Some(61_000));

        let reply = handler.handle(&ChatMessageEvent::new("mod", "!unpermit alice", 2_000).privileged());
        assert_eq!(reply.as_deref(), Some("@alice's permit was revoked."));
        assert!(!pipeline.exemptions().is_exempt("alice", 2_000));
    }

    #[test]
    fn test_toggle() {
        let (pipeline, handler) = handler();
        let reply = handler.handle(&ChatMessageEvent::new("mod", "!spamfilter.off", 0).privileged());
        assert_eq!(reply.as_deref(), Some("spam filter is now off."));
        assert!(!pipeline.is_policy_enabled(PolicyKind::Spam));
    }
}

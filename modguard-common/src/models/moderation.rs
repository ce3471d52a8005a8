// File: modguard-common/src/models/moderation.rs

use serde::{Deserialize, Serialize};
use crate::models::policy::PolicyKind;

/// A single policy breach. Produced fresh per evaluation, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub policy: PolicyKind,
    pub username: String,
    pub channel: String,
    pub timeout_seconds: u64,
    pub reason: String,
    pub reply_text: String,
}

impl Violation {
    /// The concrete action handed to the moderation executor.
    pub fn to_action(&self) -> ModerationAction {
        ModerationAction {
            target_user: self.username.clone(),
            channel: self.channel.clone(),
            policy: self.policy,
            timeout_seconds: self.timeout_seconds,
            reason: self.reason.clone(),
            reply_text: self.reply_text.clone(),
        }
    }
}

/// What the moderation-action collaborator receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationAction {
    pub target_user: String,
    pub channel: String,
    pub policy: PolicyKind,
    pub timeout_seconds: u64,
    /// Audit-log text.
    pub reason: String,
    /// Chat-visible message with `{atUser}` already substituted.
    pub reply_text: String,
}

/// How an executor call ended. Either way the action is considered settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    Failed(String),
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied)
    }
}

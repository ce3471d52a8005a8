use tracing::info;
use modguard_common::models::{normalize_username, PolicyKind, Violation};
use crate::moderation::build_violation;
use crate::moderation::settings::LengthConfig;
use crate::moderation::strikes::StrikeLedger;

/// Flags messages longer than `max_chars` Unicode scalar values.
///
/// Every over-long message is punishable on its own; there is no cooling.
#[derive(Debug, Clone)]
pub struct LengthGuard {
    ledger: StrikeLedger,
}

impl LengthGuard {
    pub fn new(ledger: StrikeLedger) -> Self {
        Self { ledger }
    }

    pub fn evaluate(
        &self,
        username: &str,
        channel: &str,
        message: &str,
        now: i64,
        cfg: &LengthConfig,
    ) -> Option<Violation> {
        let length = message.chars().count() as u64;
        if length <= cfg.max_chars {
            return None;
        }

        let user = normalize_username(username);
        let is_repeat = self.ledger.record_strike(PolicyKind::Length, &user, now, cfg.strike_reset_ms);
        let timeout = StrikeLedger::timeout_for(is_repeat, cfg);
        info!(
            "LengthGuard: '{}' sent {} chars (max {}, repeat={}), {}s timeout",
            user, length, cfg.max_chars, is_repeat, timeout
        );

        Some(build_violation(PolicyKind::Length, username, channel, timeout, &cfg.reason, &cfg.message))
    }
}

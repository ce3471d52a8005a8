use tracing::{debug, info};
use modguard_common::models::{normalize_username, PolicyKind, Violation};
use crate::moderation::allowlist::Allowlist;
use crate::moderation::build_violation;
use crate::moderation::link_tokens::extract_link_tokens;
use crate::moderation::settings::LinkConfig;
use crate::moderation::strikes::StrikeLedger;

/// Flags messages carrying any link the allowlist does not cover.
#[derive(Debug, Clone)]
pub struct LinkGuard {
    ledger: StrikeLedger,
}

impl LinkGuard {
    pub fn new(ledger: StrikeLedger) -> Self {
        Self { ledger }
    }

    pub fn evaluate(
        &self,
        username: &str,
        channel: &str,
        message: &str,
        allowlist: &Allowlist,
        now: i64,
        cfg: &LinkConfig,
    ) -> Option<Violation> {
        let tokens = extract_link_tokens(message);
        if tokens.is_empty() {
            return None;
        }

        let denied: Vec<&str> = tokens
            .iter()
            .filter(|t| !allowlist.is_allowed(&t.candidate))
            .map(|t| t.raw.as_str())
            .collect();
        if denied.is_empty() {
            debug!("LinkGuard: {} link(s) from '{}' all allowlisted", tokens.len(), username);
            return None;
        }

        let user = normalize_username(username);
        let is_repeat = self.ledger.record_strike(PolicyKind::Link, &user, now, cfg.strike_reset_ms);
        let timeout = StrikeLedger::timeout_for(is_repeat, cfg);
        info!(
            "LinkGuard: '{}' posted unauthorized link(s) {:?} (repeat={}), {}s timeout",
            user, denied, is_repeat, timeout
        );

        Some(build_violation(PolicyKind::Link, username, channel, timeout, &cfg.reason, &cfg.message))
    }
}

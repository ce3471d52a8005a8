// File: src/moderation/strikes.rs

use std::sync::Arc;
use modguard_common::models::PolicyKind;
use crate::moderation::settings::EscalationPolicy;
use crate::moderation::state_store::{as_ms, PolicyStateStore, UserPolicyState};

impl UserPolicyState {
    /// Counts a strike against this record.
    ///
    /// Strikes decay to zero once more than `strike_reset_ms` has passed since
    /// the previous one. Returns whether this is a repeat offense, i.e. whether
    /// any strike was still standing before this one.
    pub fn record_strike(&mut self, now: i64, strike_reset_ms: u64) -> bool {
        if let Some(last) = self.last_strike_at {
            if now.saturating_sub(last) > as_ms(strike_reset_ms) {
                self.strikes = 0;
            }
        }
        let is_repeat = self.strikes > 0;
        self.strikes = self.strikes.saturating_add(1);
        self.last_strike_at = Some(now);
        self.last_seen_at = self.last_seen_at.max(now);
        is_repeat
    }
}

/// Strike bookkeeping shared by every policy.
#[derive(Debug, Clone)]
pub struct StrikeLedger {
    store: Arc<PolicyStateStore>,
}

impl StrikeLedger {
    pub fn new(store: Arc<PolicyStateStore>) -> Self {
        Self { store }
    }

    pub fn record_strike(&self, kind: PolicyKind, user: &str, now: i64, strike_reset_ms: u64) -> bool {
        self.store
            .with_state(kind, user, |state| state.record_strike(now, strike_reset_ms))
    }

    /// Standing strikes, without applying decay.
    pub fn strikes(&self, kind: PolicyKind, user: &str) -> u32 {
        self.store.peek(kind, user, |state| state.strikes).unwrap_or(0)
    }

    /// Binary escalation: first offense or repeat offense, nothing beyond.
    pub fn timeout_for<C: EscalationPolicy + ?Sized>(is_repeat_offense: bool, cfg: &C) -> u64 {
        if is_repeat_offense {
            cfg.timeout_repeat_sec()
        } else {
            cfg.timeout_first_sec()
        }
    }
}
